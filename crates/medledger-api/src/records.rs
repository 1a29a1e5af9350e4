//! Handlers for `/api/records` — the mutations the ledger attests.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/api/records` | Hospital staff with a grant scoped to the patient |
//! | `PUT`  | `/api/records/:id` | Same; resets the record's verified flag |

use axum::{
  Json,
  extract::{Path, State},
  http::{HeaderMap, StatusCode},
  response::IntoResponse,
};
use medledger_core::{
  access::{self, Role},
  audit::NewAudit,
  ledger::LedgerEntry,
  record::{MedicalRecord, MedicalRecordUpdate, NewMedicalRecord},
  store::SecurityStore,
};
use serde::Serialize;
use uuid::Uuid;

use crate::{AppState, auth::Caller, error::ApiError, source_address};

/// A stored record together with the ledger entry that attests it.
#[derive(Debug, Serialize)]
pub struct RecordWithEntry {
  pub record: MedicalRecord,
  pub entry:  LedgerEntry,
}

/// `POST /api/records`
pub async fn create<S>(
  State(state): State<AppState<S>>,
  Caller(identity): Caller,
  headers: HeaderMap,
  Json(body): Json<NewMedicalRecord>,
) -> Result<impl IntoResponse, ApiError>
where
  S: SecurityStore + Clone + 'static,
{
  if !access::authorize(&identity, Role::HospitalStaff)
    || !access::authorize_scoped(&identity, body.patient_id)
  {
    return Err(ApiError::Forbidden);
  }

  state
    .store
    .get_patient(body.patient_id)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| {
      ApiError::NotFound(format!("patient {} not found", body.patient_id))
    })?;

  let (record, entry) = state
    .store
    .add_medical_record(body)
    .await
    .map_err(ApiError::store)?;

  state
    .store
    .record_audit(
      NewAudit::new(
        "Medical Record Added",
        identity.id,
        identity.role,
        source_address(&headers),
      )
      .patient(record.patient_id)
      .record(record.id)
      .details(serde_json::json!({ "entry_hash": entry.entry_hash })),
    )
    .await
    .map_err(ApiError::store)?;

  Ok((StatusCode::CREATED, Json(RecordWithEntry { record, entry })))
}

/// `PUT /api/records/:id`
pub async fn update<S>(
  State(state): State<AppState<S>>,
  Caller(identity): Caller,
  headers: HeaderMap,
  Path(record_id): Path<Uuid>,
  Json(changes): Json<MedicalRecordUpdate>,
) -> Result<Json<RecordWithEntry>, ApiError>
where
  S: SecurityStore + Clone + 'static,
{
  if !access::authorize(&identity, Role::HospitalStaff) {
    return Err(ApiError::Forbidden);
  }

  let existing = state
    .store
    .get_medical_record(record_id)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| {
      ApiError::NotFound(format!("medical record {record_id} not found"))
    })?;

  if !access::authorize_scoped(&identity, existing.patient_id) {
    return Err(ApiError::Forbidden);
  }

  let (record, entry) = state
    .store
    .update_medical_record(record_id, changes)
    .await
    .map_err(ApiError::store)?;

  state
    .store
    .record_audit(
      NewAudit::new(
        "Medical Record Updated",
        identity.id,
        identity.role,
        source_address(&headers),
      )
      .patient(record.patient_id)
      .record(record.id)
      .details(serde_json::json!({ "entry_hash": entry.entry_hash })),
    )
    .await
    .map_err(ApiError::store)?;

  Ok(Json(RecordWithEntry { record, entry }))
}
