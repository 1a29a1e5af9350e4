//! Handlers for the consent gate.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/api/consent/request` | Staff only; issues a consent OTP to the patient |
//! | `POST` | `/api/consent/confirm` | Staff only; exchanges the code for a scoped token |
//! | `GET`  | `/api/consent/:id` | Staff only; derived flow state |

use axum::{
  Json,
  extract::{Path, State},
  http::{HeaderMap, StatusCode},
  response::IntoResponse,
};
use medledger_core::{
  access,
  consent::ConsentDecision,
  store::SecurityStore,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
  AppState, auth::Caller, error::ApiError, login::TokenResponse,
  source_address,
};

// ─── Request ─────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct RequestBody {
  pub patient_id: Uuid,
}

/// `POST /api/consent/request` — issue a consent OTP to the patient's phone.
pub async fn request<S>(
  State(state): State<AppState<S>>,
  Caller(identity): Caller,
  headers: HeaderMap,
  Json(body): Json<RequestBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: SecurityStore + Clone + 'static,
{
  if !access::authorize_any_staff(&identity) {
    return Err(ApiError::Forbidden);
  }

  let patient = state
    .store
    .get_patient(body.patient_id)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| {
      ApiError::NotFound(format!("patient {} not found", body.patient_id))
    })?;

  let entry = state
    .gate
    .request_access(
      &identity,
      patient.id,
      &patient.phone,
      &source_address(&headers),
    )
    .await
    .map_err(ApiError::store)?;

  Ok((StatusCode::CREATED, Json(entry)))
}

// ─── Confirm ─────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ConfirmBody {
  pub otp_id: Uuid,
  pub code:   String,
}

/// `POST /api/consent/confirm` — exchange the patient's code for a grant
/// scoped to that patient. Only the staff member who requested the OTP may
/// redeem it. Denials carry the exact rejection reason.
pub async fn confirm<S>(
  State(state): State<AppState<S>>,
  Caller(identity): Caller,
  headers: HeaderMap,
  Json(body): Json<ConfirmBody>,
) -> Result<Json<TokenResponse>, ApiError>
where
  S: SecurityStore + Clone + 'static,
{
  if !access::authorize_any_staff(&identity) {
    return Err(ApiError::Forbidden);
  }

  match state
    .gate
    .confirm_access(
      &identity,
      body.otp_id,
      &body.code,
      &source_address(&headers),
    )
    .await
    .map_err(ApiError::store)?
  {
    ConsentDecision::Granted { grant, token } => {
      Ok(Json(TokenResponse { token, grant }))
    }
    ConsentDecision::Denied { reason } => Err(ApiError::OtpRejected(reason)),
  }
}

// ─── Status ──────────────────────────────────────────────────────────────────

/// `GET /api/consent/:id` — the derived state of a consent request.
pub async fn status<S>(
  State(state): State<AppState<S>>,
  Caller(identity): Caller,
  Path(otp_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError>
where
  S: SecurityStore + Clone + 'static,
{
  if !access::authorize_any_staff(&identity) {
    return Err(ApiError::Forbidden);
  }

  let state_now = state
    .gate
    .status(otp_id)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| {
      ApiError::NotFound(format!("consent request {otp_id} not found"))
    })?;

  Ok(Json(serde_json::json!({ "state": state_now })))
}
