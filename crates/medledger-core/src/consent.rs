//! The consent gate — OTP-mediated authorization of a staff member's access
//! to one patient's records.
//!
//! Per (staff request, patient) pair the flow is
//! `Requested -> OtpIssued -> (Verified | Expired | Rejected)`. Terminal
//! states are never persisted as an explicit field; they are derived from
//! the OTP entry's `consumed` flag and expiry at read time.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::{
  access::Identity,
  audit::NewAudit,
  grant::{AccessGrant, GrantSigner},
  otp::{self, NewOtp, OtpEntry, OtpPurpose, OtpRejection, OtpVerification},
  store::SecurityStore,
};

// ─── Derived state ───────────────────────────────────────────────────────────

/// The consent flow state implied by an OTP entry at `now`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsentState {
  OtpIssued,
  Verified,
  Expired,
}

pub fn consent_state(entry: &OtpEntry, now: DateTime<Utc>) -> ConsentState {
  if entry.consumed {
    ConsentState::Verified
  } else if entry.is_expired(now) {
    ConsentState::Expired
  } else {
    ConsentState::OtpIssued
  }
}

// ─── Decision ────────────────────────────────────────────────────────────────

/// Outcome of [`ConsentGate::confirm_access`].
#[derive(Debug, Clone)]
pub enum ConsentDecision {
  Granted { grant: AccessGrant, token: String },
  Denied { reason: OtpRejection },
}

// ─── Gate ────────────────────────────────────────────────────────────────────

/// Orchestrates OTP issuance and verification for patient consent, writing
/// an audit entry for every attempt.
///
/// The gate does not check the requester's role; route guards do that before
/// the request reaches it.
#[derive(Clone)]
pub struct ConsentGate<S> {
  store:     S,
  signer:    GrantSigner,
  grant_ttl: Duration,
}

impl<S: SecurityStore> ConsentGate<S> {
  pub fn new(store: S, signer: GrantSigner, grant_ttl: Duration) -> Self {
    Self { store, signer, grant_ttl }
  }

  /// Issue a consent OTP tied to the patient's contact and audit
  /// `"OTP Sent"`. The code travels out-of-band; delivery failure is not
  /// observable here.
  pub async fn request_access(
    &self,
    staff: &Identity,
    patient_id: Uuid,
    patient_contact: &str,
    source_address: &str,
  ) -> Result<OtpEntry, S::Error> {
    let entry = self
      .store
      .issue_otp(NewOtp {
        contact:            patient_contact.to_string(),
        code:               otp::generate_code(),
        purpose:            OtpPurpose::Consent,
        subject_patient_id: Some(patient_id),
        issued_by:          staff.id,
        issued_by_role:     staff.role,
      })
      .await?;

    self
      .store
      .record_audit(
        NewAudit::new("OTP Sent", staff.id, staff.role, source_address)
          .patient(patient_id)
          .details(serde_json::json!({
            "contact": patient_contact,
            "purpose": OtpPurpose::Consent.to_string(),
          })),
      )
      .await?;

    Ok(entry)
  }

  /// Verify a consent OTP. On success, issue a grant scoped to the patient
  /// the OTP was issued for and audit `"OTP Verified"`; on failure, audit
  /// `"OTP Verification Failed"` with the reason.
  ///
  /// Only the staff member who requested the OTP may confirm it; anyone
  /// else is denied as not-found without consuming the code. The same
  /// treatment applies to an id naming a non-consent entry or a consent
  /// entry with no patient.
  pub async fn confirm_access(
    &self,
    staff: &Identity,
    otp_id: Uuid,
    supplied_code: &str,
    source_address: &str,
  ) -> Result<ConsentDecision, S::Error> {
    if let Some(existing) = self.store.get_otp(otp_id).await?
      && (existing.purpose != OtpPurpose::Consent
        || existing.subject_patient_id.is_none()
        || existing.issued_by != staff.id)
    {
      return self
        .deny(&existing, OtpRejection::NotFound, source_address)
        .await;
    }

    match self.store.verify_otp(otp_id, supplied_code).await? {
      OtpVerification::Accepted(entry) => {
        // Checked above; verify_otp cannot change purpose or scope.
        let patient_id = entry
          .subject_patient_id
          .unwrap_or_default();

        let (grant, token) = match self.signer.issue(
          entry.issued_by,
          entry.issued_by_role,
          Some(patient_id),
          self.grant_ttl,
          Utc::now(),
        ) {
          Ok(pair) => pair,
          Err(_) => {
            return self
              .deny(&entry, OtpRejection::NotFound, source_address)
              .await;
          }
        };

        self
          .store
          .record_audit(
            NewAudit::new(
              "OTP Verified",
              entry.issued_by,
              entry.issued_by_role,
              source_address,
            )
            .patient(patient_id)
            .details(serde_json::json!({
              "purpose": entry.purpose.to_string(),
            })),
          )
          .await?;

        Ok(ConsentDecision::Granted { grant, token })
      }

      OtpVerification::Rejected(reason) => {
        // The entry may not exist; audit against it when it does.
        match self.store.get_otp(otp_id).await? {
          Some(entry) => self.deny(&entry, reason, source_address).await,
          None => Ok(ConsentDecision::Denied { reason }),
        }
      }
    }
  }

  /// The derived consent state for an issued OTP.
  pub async fn status(
    &self,
    otp_id: Uuid,
  ) -> Result<Option<ConsentState>, S::Error> {
    Ok(
      self
        .store
        .get_otp(otp_id)
        .await?
        .map(|entry| consent_state(&entry, Utc::now())),
    )
  }

  async fn deny(
    &self,
    entry: &OtpEntry,
    reason: OtpRejection,
    source_address: &str,
  ) -> Result<ConsentDecision, S::Error> {
    let mut audit = NewAudit::new(
      "OTP Verification Failed",
      entry.issued_by,
      entry.issued_by_role,
      source_address,
    )
    .details(serde_json::json!({
      "reason": reason.to_string(),
      "purpose": entry.purpose.to_string(),
    }));
    if let Some(pid) = entry.subject_patient_id {
      audit = audit.patient(pid);
    }
    self.store.record_audit(audit).await?;

    Ok(ConsentDecision::Denied { reason })
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::access::Role;

  fn entry(consumed: bool, expired: bool) -> OtpEntry {
    let now = Utc::now();
    OtpEntry {
      id: Uuid::new_v4(),
      contact: "+91 98765 43210".into(),
      code: "123456".into(),
      purpose: OtpPurpose::Consent,
      issued_at: now - Duration::minutes(11),
      expires_at: if expired {
        now - Duration::minutes(1)
      } else {
        now + Duration::minutes(9)
      },
      consumed,
      subject_patient_id: Some(Uuid::new_v4()),
      issued_by: Uuid::new_v4(),
      issued_by_role: Role::HospitalStaff,
    }
  }

  #[test]
  fn state_is_derived_from_flags() {
    let now = Utc::now();
    assert_eq!(consent_state(&entry(false, false), now), ConsentState::OtpIssued);
    assert_eq!(consent_state(&entry(true, false), now), ConsentState::Verified);
    assert_eq!(consent_state(&entry(false, true), now), ConsentState::Expired);
    // Consumed wins over expired: verification happened inside the window.
    assert_eq!(consent_state(&entry(true, true), now), ConsentState::Verified);
  }
}
