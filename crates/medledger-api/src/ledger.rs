//! Handlers for ledger verification.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/api/ledger/:id/verify` | Patient confirms an entry about them |
//! | `GET`  | `/api/ledger/verify` | Replays the whole chain; 500 on tampering |

use axum::{
  Json,
  extract::{Path, State},
  http::HeaderMap,
  response::IntoResponse,
};
use medledger_core::{
  access::{self, Role},
  audit::NewAudit,
  ledger::{self, ChainVerdict, LedgerEntry},
  store::SecurityStore,
};
use uuid::Uuid;

use crate::{AppState, auth::Caller, error::ApiError, source_address};

/// `POST /api/ledger/:id/verify` — the patient the entry concerns confirms
/// it, flipping `verified` on the entry and its record.
pub async fn verify_entry<S>(
  State(state): State<AppState<S>>,
  Caller(identity): Caller,
  headers: HeaderMap,
  Path(entry_id): Path<Uuid>,
) -> Result<Json<LedgerEntry>, ApiError>
where
  S: SecurityStore + Clone + 'static,
{
  if !access::authorize(&identity, Role::Patient) {
    return Err(ApiError::Forbidden);
  }

  let entry = state
    .store
    .get_ledger_entry(entry_id)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| {
      ApiError::NotFound(format!("ledger entry {entry_id} not found"))
    })?;

  if !access::authorize_scoped(&identity, entry.subject_id) {
    return Err(ApiError::Forbidden);
  }

  let marked = state
    .store
    .mark_ledger_verified(entry_id)
    .await
    .map_err(ApiError::store)?;

  state
    .store
    .record_audit(
      NewAudit::new(
        "Record Verified by Patient",
        identity.id,
        identity.role,
        source_address(&headers),
      )
      .patient(marked.subject_id)
      .record(marked.payload_record_id),
    )
    .await
    .map_err(ApiError::store)?;

  Ok(Json(marked))
}

/// `GET /api/ledger/verify` — replay every entry in insertion order.
///
/// Tampering is reported, never repaired: an invalid chain is a 500 naming
/// the first bad index.
pub async fn verify_all<S>(
  State(state): State<AppState<S>>,
  Caller(_identity): Caller,
) -> Result<impl IntoResponse, ApiError>
where
  S: SecurityStore + Clone + 'static,
{
  let entries = state
    .store
    .all_ledger_entries()
    .await
    .map_err(ApiError::store)?;

  match ledger::verify_chain(&entries) {
    ChainVerdict::Valid => Ok(Json(serde_json::json!({
      "status":  "valid",
      "entries": entries.len(),
    }))),
    ChainVerdict::Invalid { at_index } => {
      Err(ApiError::ChainIntegrity { at_index })
    }
  }
}
