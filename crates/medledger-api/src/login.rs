//! Handlers for the staff phone-and-OTP login flow.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/api/auth/staff-login` | Body: `{"phone":"..."}`; 404 if no active staff |
//! | `POST` | `/api/auth/verify-login` | Body: `{"otp_id":...,"code":"..."}`; returns token |

use axum::{
  Json,
  extract::State,
  http::{HeaderMap, StatusCode},
  response::IntoResponse,
};
use chrono::Utc;
use medledger_core::{
  audit::NewAudit,
  grant::AccessGrant,
  otp::{self, NewOtp, OtpEntry, OtpPurpose, OtpRejection, OtpVerification},
  store::SecurityStore,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{AppState, error::ApiError, login_grant_ttl, source_address};

/// A signed grant token and its decoded claims.
#[derive(Debug, Serialize)]
pub struct TokenResponse {
  pub token: String,
  pub grant: AccessGrant,
}

// ─── Request OTP ─────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct StaffLoginBody {
  pub phone: String,
}

/// `POST /api/auth/staff-login` — issue a login code to a staff phone.
///
/// The code travels out-of-band; the response carries only the entry id and
/// expiry.
pub async fn staff_login<S>(
  State(state): State<AppState<S>>,
  headers: HeaderMap,
  Json(body): Json<StaffLoginBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: SecurityStore + Clone + 'static,
{
  let staff = state
    .store
    .find_staff_by_phone(&body.phone)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| {
      ApiError::NotFound("no active staff member for that phone".into())
    })?;

  let entry: OtpEntry = state
    .store
    .issue_otp(NewOtp {
      contact:            staff.phone.clone(),
      code:               otp::generate_code(),
      purpose:            OtpPurpose::StaffLogin,
      subject_patient_id: None,
      issued_by:          staff.id,
      issued_by_role:     staff.role,
    })
    .await
    .map_err(ApiError::store)?;

  state
    .store
    .record_audit(
      NewAudit::new("OTP Sent", staff.id, staff.role, source_address(&headers))
        .details(serde_json::json!({
          "contact": staff.phone,
          "purpose": OtpPurpose::StaffLogin.to_string(),
        })),
    )
    .await
    .map_err(ApiError::store)?;

  Ok((StatusCode::CREATED, Json(entry)))
}

// ─── Verify OTP ──────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct VerifyLoginBody {
  pub otp_id: Uuid,
  pub code:   String,
}

/// `POST /api/auth/verify-login` — exchange a login code for a grant token.
///
/// The grant carries the staff member's role and no patient scope; scoped
/// access still requires the consent gate.
pub async fn verify_login<S>(
  State(state): State<AppState<S>>,
  headers: HeaderMap,
  Json(body): Json<VerifyLoginBody>,
) -> Result<Json<TokenResponse>, ApiError>
where
  S: SecurityStore + Clone + 'static,
{
  let src = source_address(&headers);

  // A consent entry's id is not a login credential.
  let existing = state
    .store
    .get_otp(body.otp_id)
    .await
    .map_err(ApiError::store)?;
  if let Some(entry) = &existing
    && entry.purpose != OtpPurpose::StaffLogin
  {
    return Err(ApiError::OtpRejected(OtpRejection::NotFound));
  }

  match state
    .store
    .verify_otp(body.otp_id, &body.code)
    .await
    .map_err(ApiError::store)?
  {
    OtpVerification::Accepted(entry) => {
      let (grant, token) = state
        .signer
        .issue(
          entry.issued_by,
          entry.issued_by_role,
          None,
          login_grant_ttl(),
          Utc::now(),
        )
        .map_err(ApiError::store)?;

      state
        .store
        .record_audit(NewAudit::new(
          "Staff Login",
          entry.issued_by,
          entry.issued_by_role,
          &src,
        ))
        .await
        .map_err(ApiError::store)?;

      Ok(Json(TokenResponse { token, grant }))
    }

    OtpVerification::Rejected(reason) => {
      if let Some(entry) = existing {
        state
          .store
          .record_audit(
            NewAudit::new(
              "OTP Verification Failed",
              entry.issued_by,
              entry.issued_by_role,
              &src,
            )
            .details(serde_json::json!({
              "reason":  reason.to_string(),
              "purpose": entry.purpose.to_string(),
            })),
          )
          .await
          .map_err(ApiError::store)?;
      }
      Err(ApiError::OtpRejected(reason))
    }
  }
}
