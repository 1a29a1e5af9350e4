//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  http::{HeaderValue, StatusCode, header},
  response::{IntoResponse, Response},
};
use medledger_core::otp::OtpRejection;
use serde_json::json;
use thiserror::Error;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("unauthorized")]
  Unauthorized,

  #[error("forbidden")]
  Forbidden,

  #[error("not found: {0}")]
  NotFound(String),

  #[error("otp rejected: {0}")]
  OtpRejected(OtpRejection),

  #[error("bad request: {0}")]
  BadRequest(String),

  #[error("chain integrity violation at index {at_index}")]
  ChainIntegrity { at_index: usize },

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl ApiError {
  /// Wrap a store-level failure.
  pub fn store(e: impl std::error::Error + Send + Sync + 'static) -> Self {
    ApiError::Store(Box::new(e))
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    match self {
      ApiError::Unauthorized => {
        let mut res = (
          StatusCode::UNAUTHORIZED,
          Json(json!({ "error": "unauthorized" })),
        )
          .into_response();
        res.headers_mut().insert(
          header::WWW_AUTHENTICATE,
          HeaderValue::from_static("Bearer realm=\"medledger\""),
        );
        res
      }
      ApiError::Forbidden => {
        (StatusCode::FORBIDDEN, Json(json!({ "error": "forbidden" })))
          .into_response()
      }
      ApiError::NotFound(msg) => {
        (StatusCode::NOT_FOUND, Json(json!({ "error": msg })))
          .into_response()
      }
      ApiError::OtpRejected(reason) => (
        StatusCode::BAD_REQUEST,
        Json(json!({
          "error":  "otp rejected",
          "reason": reason.to_string(),
        })),
      )
        .into_response(),
      ApiError::BadRequest(msg) => {
        (StatusCode::BAD_REQUEST, Json(json!({ "error": msg })))
          .into_response()
      }
      ApiError::ChainIntegrity { at_index } => (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({
          "error":    "chain integrity violation",
          "at_index": at_index,
        })),
      )
        .into_response(),
      ApiError::Store(e) => (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": e.to_string() })),
      )
        .into_response(),
    }
  }
}
