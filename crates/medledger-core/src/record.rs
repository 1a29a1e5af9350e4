//! Medical records — the mutable entities the hash-chain ledger attests.
//!
//! A record is ordinary mutable state; every add or update also appends one
//! ledger entry over a canonical snapshot of the record at that moment.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::Result;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MedicalRecord {
  pub id:             Uuid,
  pub patient_id:     Uuid,
  pub doctor_name:    String,
  pub treatment_type: String,
  pub diagnosis:      String,
  pub medications:    Vec<String>,
  pub date:           NaiveDate,
  /// Patient-confirmed via the consent gate; reset to `false` on update.
  pub verified:       bool,
  /// Hash of the latest ledger entry attesting this record.
  pub chain_hash:     Option<String>,
  pub recorded_at:    DateTime<Utc>,
}

/// Input to [`crate::store::SecurityStore::add_medical_record`].
#[derive(Debug, Clone, Deserialize)]
pub struct NewMedicalRecord {
  pub patient_id:     Uuid,
  pub doctor_name:    String,
  pub treatment_type: String,
  pub diagnosis:      String,
  #[serde(default)]
  pub medications:    Vec<String>,
  pub date:           NaiveDate,
}

/// Partial update; `None` fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MedicalRecordUpdate {
  pub doctor_name:    Option<String>,
  pub treatment_type: Option<String>,
  pub diagnosis:      Option<String>,
  pub medications:    Option<Vec<String>>,
  pub date:           Option<NaiveDate>,
}

impl MedicalRecordUpdate {
  /// Apply onto an existing record. Any content change invalidates the
  /// previous patient confirmation.
  pub fn apply(self, record: &mut MedicalRecord) {
    if let Some(v) = self.doctor_name {
      record.doctor_name = v;
    }
    if let Some(v) = self.treatment_type {
      record.treatment_type = v;
    }
    if let Some(v) = self.diagnosis {
      record.diagnosis = v;
    }
    if let Some(v) = self.medications {
      record.medications = v;
    }
    if let Some(v) = self.date {
      record.date = v;
    }
    record.verified = false;
  }
}

// ─── Canonical payload ───────────────────────────────────────────────────────

/// The subset of record fields the ledger hash commits to. `verified` and
/// `chain_hash` are excluded — both change after the entry is written.
#[derive(Serialize)]
struct CanonicalView<'a> {
  id:             Uuid,
  patient_id:     Uuid,
  doctor_name:    &'a str,
  treatment_type: &'a str,
  diagnosis:      &'a str,
  medications:    &'a [String],
  date:           NaiveDate,
  recorded_at:    DateTime<Utc>,
}

/// Deterministic serialisation of a record's attested content.
pub fn canonical_payload(record: &MedicalRecord) -> Result<String> {
  let view = CanonicalView {
    id:             record.id,
    patient_id:     record.patient_id,
    doctor_name:    &record.doctor_name,
    treatment_type: &record.treatment_type,
    diagnosis:      &record.diagnosis,
    medications:    &record.medications,
    date:           record.date,
    recorded_at:    record.recorded_at,
  };
  Ok(serde_json::to_string(&view)?)
}

#[cfg(test)]
mod tests {
  use super::*;

  fn record() -> MedicalRecord {
    MedicalRecord {
      id:             Uuid::new_v4(),
      patient_id:     Uuid::new_v4(),
      doctor_name:    "Dr. Mehta".into(),
      treatment_type: "Consultation".into(),
      diagnosis:      "Seasonal flu".into(),
      medications:    vec!["Paracetamol".into()],
      date:           NaiveDate::from_ymd_opt(2024, 3, 15).unwrap(),
      verified:       false,
      chain_hash:     None,
      recorded_at:    Utc::now(),
    }
  }

  #[test]
  fn canonical_payload_ignores_mutable_attestation_fields() {
    let mut r = record();
    let before = canonical_payload(&r).unwrap();
    r.verified = true;
    r.chain_hash = Some("a".repeat(64));
    assert_eq!(canonical_payload(&r).unwrap(), before);
  }

  #[test]
  fn canonical_payload_changes_with_content() {
    let mut r = record();
    let before = canonical_payload(&r).unwrap();
    r.diagnosis = "Pneumonia".into();
    assert_ne!(canonical_payload(&r).unwrap(), before);
  }

  #[test]
  fn update_resets_verification() {
    let mut r = record();
    r.verified = true;
    MedicalRecordUpdate {
      diagnosis: Some("Pneumonia".into()),
      ..Default::default()
    }
    .apply(&mut r);
    assert!(!r.verified);
    assert_eq!(r.diagnosis, "Pneumonia");
    assert_eq!(r.doctor_name, "Dr. Mehta");
  }
}
