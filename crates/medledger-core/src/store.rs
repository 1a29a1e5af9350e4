//! The `SecurityStore` trait.
//!
//! Implemented by storage backends (e.g. `medledger-store-sqlite`). Higher
//! layers (the consent gate, the API) depend on this abstraction, not on any
//! concrete backend.
//!
//! Ordering contract: [`SecurityStore::append_ledger`] and the record
//! mutations that call into it MUST be linearizable — the read of the chain
//! tip and the write of the new entry form one atomic step, so concurrent
//! appends observe a total order and no two entries claim the same
//! predecessor.

use std::future::Future;

use uuid::Uuid;

use crate::{
  audit::{AuditEntry, NewAudit},
  insurance::{InsuranceInfo, NewInsuranceInfo},
  ledger::{LedgerEntry, NewLedgerEntry},
  otp::{NewOtp, OtpEntry, OtpVerification},
  patient::{NewPatient, Patient},
  record::{MedicalRecord, MedicalRecordUpdate, NewMedicalRecord},
  staff::{NewStaffMember, StaffMember},
};

/// Abstraction over the persistent store shared by all components.
///
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes (e.g. tokio with `axum`).
pub trait SecurityStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Patients ──────────────────────────────────────────────────────────

  /// Register a patient; the store assigns the id and public chain id.
  fn add_patient(
    &self,
    input: NewPatient,
  ) -> impl Future<Output = Result<Patient, Self::Error>> + Send + '_;

  fn get_patient(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Patient>, Self::Error>> + Send + '_;

  /// Look a patient up by the public chain id staff use.
  fn find_patient_by_chain_id<'a>(
    &'a self,
    chain_id: &'a str,
  ) -> impl Future<Output = Result<Option<Patient>, Self::Error>> + Send + 'a;

  // ── Staff ─────────────────────────────────────────────────────────────

  fn add_staff(
    &self,
    input: NewStaffMember,
  ) -> impl Future<Output = Result<StaffMember, Self::Error>> + Send + '_;

  /// Active staff only; inactive members cannot start a login.
  fn find_staff_by_phone<'a>(
    &'a self,
    phone: &'a str,
  ) -> impl Future<Output = Result<Option<StaffMember>, Self::Error>> + Send + 'a;

  // ── OTP entries ───────────────────────────────────────────────────────

  /// Persist a code. Expiry is assigned from the purpose's TTL at the
  /// store's clock. Duplicate unconsumed entries per (contact, purpose)
  /// may coexist; verification is keyed by entry id.
  fn issue_otp(
    &self,
    input: NewOtp,
  ) -> impl Future<Output = Result<OtpEntry, Self::Error>> + Send + '_;

  fn get_otp(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<OtpEntry>, Self::Error>> + Send + '_;

  /// Atomic check-and-consume. Rejection order: not-found, already
  /// consumed, expired, mismatch. The store writes no audit entries;
  /// that responsibility belongs to the caller.
  fn verify_otp<'a>(
    &'a self,
    id: Uuid,
    supplied_code: &'a str,
  ) -> impl Future<Output = Result<OtpVerification, Self::Error>> + Send + 'a;

  // ── Audit log ─────────────────────────────────────────────────────────

  fn record_audit(
    &self,
    input: NewAudit,
  ) -> impl Future<Output = Result<AuditEntry, Self::Error>> + Send + '_;

  /// Most recent first.
  fn list_audit(
    &self,
    patient_id: Uuid,
    limit: usize,
  ) -> impl Future<Output = Result<Vec<AuditEntry>, Self::Error>> + Send + '_;

  // ── Hash-chain ledger ─────────────────────────────────────────────────

  /// Append one entry to the global chain. The previous hash is read and
  /// the new entry written in a single serialized step.
  fn append_ledger(
    &self,
    input: NewLedgerEntry,
  ) -> impl Future<Output = Result<LedgerEntry, Self::Error>> + Send + '_;

  fn get_ledger_entry(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<LedgerEntry>, Self::Error>> + Send + '_;

  /// Flip `verified` on an entry and on the record it attests.
  fn mark_ledger_verified(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<LedgerEntry, Self::Error>> + Send + '_;

  /// Entries concerning one patient, in insertion order.
  fn list_ledger(
    &self,
    patient_id: Uuid,
  ) -> impl Future<Output = Result<Vec<LedgerEntry>, Self::Error>> + Send + '_;

  /// The full chain in global insertion order, as
  /// [`crate::ledger::verify_chain`] expects it.
  fn all_ledger_entries(
    &self,
  ) -> impl Future<Output = Result<Vec<LedgerEntry>, Self::Error>> + Send + '_;

  // ── Medical records ───────────────────────────────────────────────────

  /// Insert a record and append its attesting ledger entry as one logical
  /// unit: the record write is not reported successful unless the ledger
  /// entry persisted.
  fn add_medical_record(
    &self,
    input: NewMedicalRecord,
  ) -> impl Future<Output = Result<(MedicalRecord, LedgerEntry), Self::Error>>
  + Send
  + '_;

  /// Mutate a record and append a fresh attestation, as one logical unit.
  /// Resets the record's `verified` flag.
  fn update_medical_record(
    &self,
    id: Uuid,
    changes: MedicalRecordUpdate,
  ) -> impl Future<Output = Result<(MedicalRecord, LedgerEntry), Self::Error>>
  + Send
  + '_;

  fn get_medical_record(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<MedicalRecord>, Self::Error>> + Send + '_;

  /// Most recent first.
  fn list_medical_records(
    &self,
    patient_id: Uuid,
  ) -> impl Future<Output = Result<Vec<MedicalRecord>, Self::Error>> + Send + '_;

  // ── Insurance info ────────────────────────────────────────────────────

  /// Replace the patient's coverage summary and append an attesting ledger
  /// entry, as one logical unit. The summary's row id survives upserts.
  fn set_insurance_info(
    &self,
    input: NewInsuranceInfo,
  ) -> impl Future<Output = Result<(InsuranceInfo, LedgerEntry), Self::Error>>
  + Send
  + '_;

  fn get_insurance_info(
    &self,
    patient_id: Uuid,
  ) -> impl Future<Output = Result<Option<InsuranceInfo>, Self::Error>> + Send + '_;
}
