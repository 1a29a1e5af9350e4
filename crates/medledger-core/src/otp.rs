//! One-time codes — issuance inputs, verification outcomes, and expiry rules.
//!
//! Entries are written once and mutated exactly once (`consumed` flips on a
//! successful verification). Expiry is passive: an entry past `expires_at` is
//! invalid at read time whether or not anything ever deletes it.

use chrono::{DateTime, Duration, Utc};
use rand_core::{OsRng, RngCore as _};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

use crate::access::Role;

// ─── Purpose ─────────────────────────────────────────────────────────────────

/// What a code authorizes once verified. The purpose fixes the TTL.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Serialize,
  Deserialize,
  Display,
  EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum OtpPurpose {
  Consent,
  StaffLogin,
  RecordUpdate,
}

impl OtpPurpose {
  /// Validity window measured from issuance.
  pub fn ttl(self) -> Duration {
    match self {
      OtpPurpose::StaffLogin => Duration::minutes(5),
      OtpPurpose::Consent | OtpPurpose::RecordUpdate => Duration::minutes(10),
    }
  }
}

// ─── Entry ───────────────────────────────────────────────────────────────────

/// A persisted one-time code.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OtpEntry {
  pub id:                 Uuid,
  pub contact:            String,
  /// Never serialised into API responses; delivery is out-of-band.
  #[serde(skip_serializing)]
  pub code:               String,
  pub purpose:            OtpPurpose,
  pub issued_at:          DateTime<Utc>,
  pub expires_at:         DateTime<Utc>,
  pub consumed:           bool,
  pub subject_patient_id: Option<Uuid>,
  pub issued_by:          Uuid,
  pub issued_by_role:     Role,
}

impl OtpEntry {
  pub fn is_expired(&self, now: DateTime<Utc>) -> bool { now > self.expires_at }
}

/// Input to [`crate::store::SecurityStore::issue_otp`].
/// The id, issuance timestamp, and expiry are assigned by the store.
#[derive(Debug, Clone)]
pub struct NewOtp {
  pub contact:            String,
  pub code:               String,
  pub purpose:            OtpPurpose,
  pub subject_patient_id: Option<Uuid>,
  pub issued_by:          Uuid,
  pub issued_by_role:     Role,
}

// ─── Verification ────────────────────────────────────────────────────────────

/// Why a verification attempt was rejected. Each reason is surfaced to the
/// caller so the UI can prompt appropriately (resend vs re-enter).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum OtpRejection {
  NotFound,
  AlreadyConsumed,
  Expired,
  Mismatch,
}

/// Outcome of a check-and-consume attempt.
#[derive(Debug, Clone)]
pub enum OtpVerification {
  Accepted(OtpEntry),
  Rejected(OtpRejection),
}

impl OtpVerification {
  pub fn is_accepted(&self) -> bool { matches!(self, Self::Accepted(_)) }
}

// ─── Code generation ─────────────────────────────────────────────────────────

/// Generate a 6-digit ASCII code from OS randomness.
pub fn generate_code() -> String {
  let mut buf = [0u8; 4];
  OsRng.fill_bytes(&mut buf);
  let n = u32::from_le_bytes(buf) % 900_000 + 100_000;
  n.to_string()
}

/// Length-then-bytes comparison without an early exit on the first differing
/// byte.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
  if a.len() != b.len() {
    return false;
  }
  let mut diff = 0u8;
  for (x, y) in a.iter().zip(b.iter()) {
    diff |= x ^ y;
  }
  diff == 0
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn code_is_six_ascii_digits() {
    for _ in 0..32 {
      let code = generate_code();
      assert_eq!(code.len(), 6);
      assert!(code.bytes().all(|b| b.is_ascii_digit()));
      assert_ne!(code.as_bytes()[0], b'0');
    }
  }

  #[test]
  fn ttl_per_purpose() {
    assert_eq!(OtpPurpose::StaffLogin.ttl(), Duration::minutes(5));
    assert_eq!(OtpPurpose::Consent.ttl(), Duration::minutes(10));
    assert_eq!(OtpPurpose::RecordUpdate.ttl(), Duration::minutes(10));
  }

  #[test]
  fn constant_time_eq_basics() {
    assert!(constant_time_eq(b"483920", b"483920"));
    assert!(!constant_time_eq(b"483920", b"483921"));
    assert!(!constant_time_eq(b"483920", b"48392"));
    assert!(constant_time_eq(b"", b""));
  }
}
