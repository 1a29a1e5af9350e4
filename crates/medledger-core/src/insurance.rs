//! Insurance coverage summaries.
//!
//! One summary per patient, filed and maintained by the insurer's back
//! office. Every upsert appends an insurance-typed ledger entry over a
//! canonical snapshot, the same way medical records are attested.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

use crate::Result;

/// Coverage standing of a policy.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CoverageStatus {
  Active,
  Inactive,
  Suspended,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InsuranceInfo {
  pub id:              Uuid,
  pub patient_id:      Uuid,
  pub provider:        String,
  pub policy_number:   String,
  /// Whole currency units.
  pub coverage_amount: u64,
  pub active_claims:   u32,
  pub last_claim_date: Option<NaiveDate>,
  pub status:          CoverageStatus,
  pub updated_at:      DateTime<Utc>,
}

/// Input to [`crate::store::SecurityStore::set_insurance_info`]. Replaces any
/// existing summary for the patient; the store keeps the row id stable.
#[derive(Debug, Clone, Deserialize)]
pub struct NewInsuranceInfo {
  pub patient_id:      Uuid,
  pub provider:        String,
  pub policy_number:   String,
  pub coverage_amount: u64,
  #[serde(default)]
  pub active_claims:   u32,
  pub last_claim_date: Option<NaiveDate>,
  pub status:          CoverageStatus,
}

// ─── Canonical payload ───────────────────────────────────────────────────────

/// Every field participates in the hash; a summary has no mutable
/// attestation columns of its own.
#[derive(Serialize)]
struct CanonicalView<'a> {
  id:              Uuid,
  patient_id:      Uuid,
  provider:        &'a str,
  policy_number:   &'a str,
  coverage_amount: u64,
  active_claims:   u32,
  last_claim_date: Option<NaiveDate>,
  status:          CoverageStatus,
  updated_at:      DateTime<Utc>,
}

/// Deterministic serialisation of a summary's attested content.
pub fn canonical_payload(info: &InsuranceInfo) -> Result<String> {
  let view = CanonicalView {
    id:              info.id,
    patient_id:      info.patient_id,
    provider:        &info.provider,
    policy_number:   &info.policy_number,
    coverage_amount: info.coverage_amount,
    active_claims:   info.active_claims,
    last_claim_date: info.last_claim_date,
    status:          info.status,
    updated_at:      info.updated_at,
  };
  Ok(serde_json::to_string(&view)?)
}

#[cfg(test)]
mod tests {
  use std::str::FromStr as _;

  use super::*;

  fn summary() -> InsuranceInfo {
    InsuranceInfo {
      id:              Uuid::new_v4(),
      patient_id:      Uuid::new_v4(),
      provider:        "Star Health".into(),
      policy_number:   "SH-99120".into(),
      coverage_amount: 500_000,
      active_claims:   0,
      last_claim_date: None,
      status:          CoverageStatus::Active,
      updated_at:      Utc::now(),
    }
  }

  #[test]
  fn canonical_payload_changes_with_content() {
    let mut info = summary();
    let before = canonical_payload(&info).unwrap();
    info.status = CoverageStatus::Suspended;
    assert_ne!(canonical_payload(&info).unwrap(), before);
  }

  #[test]
  fn status_round_trips_through_its_string_form() {
    for status in [
      CoverageStatus::Active,
      CoverageStatus::Inactive,
      CoverageStatus::Suspended,
    ] {
      assert_eq!(
        CoverageStatus::from_str(&status.to_string()).unwrap(),
        status
      );
    }
  }
}
