//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are RFC 3339 strings, UUIDs hyphenated lowercase strings,
//! enums their snake_case strum form, and structured fields compact JSON.
//! Booleans are stored as 0/1 integers.

use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use medledger_core::{
  access::Role,
  audit::AuditEntry,
  insurance::{CoverageStatus, InsuranceInfo},
  ledger::{EntryType, LedgerEntry},
  otp::{OtpEntry, OtpPurpose},
  patient::Patient,
  record::MedicalRecord,
  staff::StaffMember,
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

pub fn decode_uuid_opt(s: Option<&str>) -> Result<Option<Uuid>> {
  s.map(decode_uuid).transpose()
}

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::Decode(format!("timestamp {s:?}: {e}")))
}

pub fn decode_date(s: &str) -> Result<NaiveDate> {
  NaiveDate::from_str(s).map_err(|e| Error::Decode(format!("date {s:?}: {e}")))
}

// ─── Enums ───────────────────────────────────────────────────────────────────

pub fn decode_role(s: &str) -> Result<Role> {
  Role::from_str(s).map_err(|_| Error::Decode(format!("unknown role: {s:?}")))
}

pub fn decode_purpose(s: &str) -> Result<OtpPurpose> {
  OtpPurpose::from_str(s)
    .map_err(|_| Error::Decode(format!("unknown otp purpose: {s:?}")))
}

pub fn decode_entry_type(s: &str) -> Result<EntryType> {
  EntryType::from_str(s)
    .map_err(|_| Error::Decode(format!("unknown entry type: {s:?}")))
}

pub fn decode_coverage_status(s: &str) -> Result<CoverageStatus> {
  CoverageStatus::from_str(s)
    .map_err(|_| Error::Decode(format!("unknown coverage status: {s:?}")))
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw strings read directly from a `patients` row.
pub struct RawPatient {
  pub patient_id: String,
  pub chain_id:   String,
  pub name:       String,
  pub email:      String,
  pub phone:      String,
  pub created_at: String,
}

impl RawPatient {
  pub fn into_patient(self) -> Result<Patient> {
    Ok(Patient {
      id:         decode_uuid(&self.patient_id)?,
      chain_id:   self.chain_id,
      name:       self.name,
      email:      self.email,
      phone:      self.phone,
      created_at: decode_dt(&self.created_at)?,
    })
  }
}

/// Raw strings read directly from a `staff` row.
pub struct RawStaff {
  pub staff_id:   String,
  pub name:       String,
  pub phone:      String,
  pub role:       String,
  pub active:     bool,
  pub created_at: String,
}

impl RawStaff {
  pub fn into_staff(self) -> Result<StaffMember> {
    Ok(StaffMember {
      id:         decode_uuid(&self.staff_id)?,
      name:       self.name,
      phone:      self.phone,
      role:       decode_role(&self.role)?,
      active:     self.active,
      created_at: decode_dt(&self.created_at)?,
    })
  }
}

/// Raw strings read directly from an `otp_requests` row.
pub struct RawOtp {
  pub otp_id:             String,
  pub contact:            String,
  pub code:               String,
  pub purpose:            String,
  pub issued_at:          String,
  pub expires_at:         String,
  pub consumed:           bool,
  pub subject_patient_id: Option<String>,
  pub issued_by:          String,
  pub issued_by_role:     String,
}

impl RawOtp {
  pub fn into_otp(self) -> Result<OtpEntry> {
    Ok(OtpEntry {
      id:                 decode_uuid(&self.otp_id)?,
      contact:            self.contact,
      code:               self.code,
      purpose:            decode_purpose(&self.purpose)?,
      issued_at:          decode_dt(&self.issued_at)?,
      expires_at:         decode_dt(&self.expires_at)?,
      consumed:           self.consumed,
      subject_patient_id: decode_uuid_opt(self.subject_patient_id.as_deref())?,
      issued_by:          decode_uuid(&self.issued_by)?,
      issued_by_role:     decode_role(&self.issued_by_role)?,
    })
  }
}

/// Raw strings read directly from an `audit_log` row.
pub struct RawAudit {
  pub audit_id:           String,
  pub action:             String,
  pub actor_id:           String,
  pub actor_role:         String,
  pub subject_patient_id: Option<String>,
  pub related_record_id:  Option<String>,
  pub details:            String,
  pub source_address:     String,
  pub timestamp:          String,
}

impl RawAudit {
  pub fn into_audit(self) -> Result<AuditEntry> {
    Ok(AuditEntry {
      id:                 decode_uuid(&self.audit_id)?,
      action:             self.action,
      actor_id:           decode_uuid(&self.actor_id)?,
      actor_role:         decode_role(&self.actor_role)?,
      subject_patient_id: decode_uuid_opt(self.subject_patient_id.as_deref())?,
      related_record_id:  decode_uuid_opt(self.related_record_id.as_deref())?,
      details:            serde_json::from_str(&self.details)?,
      source_address:     self.source_address,
      timestamp:          decode_dt(&self.timestamp)?,
    })
  }
}

/// Raw strings read directly from a `ledger` row.
pub struct RawLedgerEntry {
  pub entry_id:          String,
  pub subject_id:        String,
  pub entry_hash:        String,
  pub previous_hash:     String,
  pub timestamp:         String,
  pub entry_type:        String,
  pub payload_record_id: String,
  pub payload:           String,
  pub verified:          bool,
}

impl RawLedgerEntry {
  pub fn into_entry(self) -> Result<LedgerEntry> {
    Ok(LedgerEntry {
      id:                decode_uuid(&self.entry_id)?,
      subject_id:        decode_uuid(&self.subject_id)?,
      entry_hash:        self.entry_hash,
      previous_hash:     self.previous_hash,
      timestamp:         decode_dt(&self.timestamp)?,
      entry_type:        decode_entry_type(&self.entry_type)?,
      payload_record_id: decode_uuid(&self.payload_record_id)?,
      payload:           self.payload,
      verified:          self.verified,
    })
  }
}

/// Raw strings read directly from an `insurance_info` row.
pub struct RawInsurance {
  pub insurance_id:    String,
  pub patient_id:      String,
  pub provider:        String,
  pub policy_number:   String,
  pub coverage_amount: u64,
  pub active_claims:   u32,
  pub last_claim_date: Option<String>,
  pub status:          String,
  pub updated_at:      String,
}

impl RawInsurance {
  pub fn into_insurance(self) -> Result<InsuranceInfo> {
    Ok(InsuranceInfo {
      id:              decode_uuid(&self.insurance_id)?,
      patient_id:      decode_uuid(&self.patient_id)?,
      provider:        self.provider,
      policy_number:   self.policy_number,
      coverage_amount: self.coverage_amount,
      active_claims:   self.active_claims,
      last_claim_date: self
        .last_claim_date
        .as_deref()
        .map(decode_date)
        .transpose()?,
      status:          decode_coverage_status(&self.status)?,
      updated_at:      decode_dt(&self.updated_at)?,
    })
  }
}

/// Raw strings read directly from a `medical_records` row.
pub struct RawRecord {
  pub record_id:      String,
  pub patient_id:     String,
  pub doctor_name:    String,
  pub treatment_type: String,
  pub diagnosis:      String,
  pub medications:    String,
  pub date:           String,
  pub verified:       bool,
  pub chain_hash:     Option<String>,
  pub recorded_at:    String,
}

impl RawRecord {
  pub fn into_record(self) -> Result<MedicalRecord> {
    Ok(MedicalRecord {
      id:             decode_uuid(&self.record_id)?,
      patient_id:     decode_uuid(&self.patient_id)?,
      doctor_name:    self.doctor_name,
      treatment_type: self.treatment_type,
      diagnosis:      self.diagnosis,
      medications:    serde_json::from_str(&self.medications)?,
      date:           decode_date(&self.date)?,
      verified:       self.verified,
      chain_hash:     self.chain_hash,
      recorded_at:    decode_dt(&self.recorded_at)?,
    })
  }
}
