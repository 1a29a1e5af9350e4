//! Bearer grant-token extractor.

use axum::{extract::FromRequestParts, http::request::Parts};
use chrono::Utc;
use medledger_core::{access::Identity, store::SecurityStore};

use crate::{AppState, error::ApiError};

/// The authenticated caller. Present in a handler's arguments means the
/// request carried a well-formed, correctly-tagged, unexpired grant token.
pub struct Caller(pub Identity);

impl<S> FromRequestParts<AppState<S>> for Caller
where
  S: SecurityStore + Clone + 'static,
{
  type Rejection = ApiError;

  async fn from_request_parts(
    parts: &mut Parts,
    state: &AppState<S>,
  ) -> Result<Self, Self::Rejection> {
    let header = parts
      .headers
      .get(axum::http::header::AUTHORIZATION)
      .and_then(|v| v.to_str().ok())
      .ok_or(ApiError::Unauthorized)?;

    let token = header
      .strip_prefix("Bearer ")
      .ok_or(ApiError::Unauthorized)?;

    let grant = state
      .signer
      .verify(token, Utc::now())
      .map_err(|_| ApiError::Unauthorized)?;

    Ok(Caller(Identity::from_grant(&grant)))
  }
}
