//! Handlers for patient registration, lookup, and per-patient reads.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/api/patients` | Open registration |
//! | `POST` | `/api/patients/search` | Staff only; body `{"chain_id":"BC-..."}` |
//! | `GET`  | `/api/patients/:id/records` | Patient-self or consent-scoped staff |
//! | `GET`  | `/api/patients/:id/ledger` | Same scoping |
//! | `GET`  | `/api/patients/:id/audit` | Same scoping; newest first, capped |
//! | `GET`  | `/api/patients/:id/insurance` | Same scoping; `null` when none filed |

use axum::{
  Json,
  extract::{Path, State},
  http::{HeaderMap, StatusCode},
  response::IntoResponse,
};
use medledger_core::{
  access::{self, Role},
  audit::{AuditEntry, NewAudit},
  insurance::InsuranceInfo,
  ledger::LedgerEntry,
  patient::{NewPatient, Patient},
  record::MedicalRecord,
  store::SecurityStore,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
  AUDIT_LIST_CAP, AppState, auth::Caller, error::ApiError, source_address,
};

// ─── Register ────────────────────────────────────────────────────────────────

/// `POST /api/patients` — register a patient. Unauthenticated: registration
/// precedes any grant. The assigned chain id is returned for out-of-band use.
pub async fn create<S>(
  State(state): State<AppState<S>>,
  headers: HeaderMap,
  Json(body): Json<NewPatient>,
) -> Result<impl IntoResponse, ApiError>
where
  S: SecurityStore + Clone + 'static,
{
  let patient = state
    .store
    .add_patient(body)
    .await
    .map_err(ApiError::store)?;

  state
    .store
    .record_audit(
      NewAudit::new(
        "Patient Registered",
        patient.id,
        Role::Patient,
        source_address(&headers),
      )
      .patient(patient.id),
    )
    .await
    .map_err(ApiError::store)?;

  Ok((StatusCode::CREATED, Json(patient)))
}

// ─── Search ──────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct SearchBody {
  pub chain_id: String,
}

/// `POST /api/patients/search` — staff lookup by public chain id.
pub async fn search<S>(
  State(state): State<AppState<S>>,
  Caller(identity): Caller,
  headers: HeaderMap,
  Json(body): Json<SearchBody>,
) -> Result<Json<Patient>, ApiError>
where
  S: SecurityStore + Clone + 'static,
{
  if !access::authorize_any_staff(&identity) {
    return Err(ApiError::Forbidden);
  }

  let patient = state
    .store
    .find_patient_by_chain_id(&body.chain_id)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| {
      ApiError::NotFound(format!("no patient with chain id {}", body.chain_id))
    })?;

  state
    .store
    .record_audit(
      NewAudit::new(
        "Patient Search",
        identity.id,
        identity.role,
        source_address(&headers),
      )
      .patient(patient.id)
      .details(serde_json::json!({ "chain_id": body.chain_id })),
    )
    .await
    .map_err(ApiError::store)?;

  Ok(Json(patient))
}

// ─── Per-patient reads ───────────────────────────────────────────────────────

/// `GET /api/patients/:id/records`
pub async fn records<S>(
  State(state): State<AppState<S>>,
  Caller(identity): Caller,
  headers: HeaderMap,
  Path(patient_id): Path<Uuid>,
) -> Result<Json<Vec<MedicalRecord>>, ApiError>
where
  S: SecurityStore + Clone + 'static,
{
  if !access::authorize_scoped(&identity, patient_id) {
    return Err(ApiError::Forbidden);
  }

  let records = state
    .store
    .list_medical_records(patient_id)
    .await
    .map_err(ApiError::store)?;

  state
    .store
    .record_audit(
      NewAudit::new(
        "Medical Records Access",
        identity.id,
        identity.role,
        source_address(&headers),
      )
      .patient(patient_id)
      .details(serde_json::json!({ "records": records.len() })),
    )
    .await
    .map_err(ApiError::store)?;

  Ok(Json(records))
}

/// `GET /api/patients/:id/insurance` — the patient's coverage summary, or
/// JSON `null` when no insurer has filed one. Either way the lookup lands in
/// the audit trail.
pub async fn insurance<S>(
  State(state): State<AppState<S>>,
  Caller(identity): Caller,
  headers: HeaderMap,
  Path(patient_id): Path<Uuid>,
) -> Result<Json<Option<InsuranceInfo>>, ApiError>
where
  S: SecurityStore + Clone + 'static,
{
  if !access::authorize_scoped(&identity, patient_id) {
    return Err(ApiError::Forbidden);
  }

  let info = state
    .store
    .get_insurance_info(patient_id)
    .await
    .map_err(ApiError::store)?;

  state
    .store
    .record_audit(
      NewAudit::new(
        "Insurance Info Access",
        identity.id,
        identity.role,
        source_address(&headers),
      )
      .patient(patient_id)
      .details(serde_json::json!({ "has_insurance": info.is_some() })),
    )
    .await
    .map_err(ApiError::store)?;

  Ok(Json(info))
}

/// `GET /api/patients/:id/ledger` — the patient's entries, insertion order.
pub async fn ledger<S>(
  State(state): State<AppState<S>>,
  Caller(identity): Caller,
  Path(patient_id): Path<Uuid>,
) -> Result<Json<Vec<LedgerEntry>>, ApiError>
where
  S: SecurityStore + Clone + 'static,
{
  if !access::authorize_scoped(&identity, patient_id) {
    return Err(ApiError::Forbidden);
  }

  let entries = state
    .store
    .list_ledger(patient_id)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(entries))
}

/// `GET /api/patients/:id/audit` — newest first, capped at
/// [`AUDIT_LIST_CAP`].
pub async fn audit<S>(
  State(state): State<AppState<S>>,
  Caller(identity): Caller,
  Path(patient_id): Path<Uuid>,
) -> Result<Json<Vec<AuditEntry>>, ApiError>
where
  S: SecurityStore + Clone + 'static,
{
  if !access::authorize_scoped(&identity, patient_id) {
    return Err(ApiError::Forbidden);
  }

  let entries = state
    .store
    .list_audit(patient_id, AUDIT_LIST_CAP)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(entries))
}
