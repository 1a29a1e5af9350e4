//! [`SqliteStore`] — the SQLite implementation of [`SecurityStore`].

use std::path::Path;

use chrono::Utc;
use rusqlite::OptionalExtension as _;
use uuid::Uuid;

use medledger_core::{
  audit::{AuditEntry, NewAudit},
  insurance::{self, InsuranceInfo, NewInsuranceInfo},
  ledger::{self, EntryType, LedgerEntry, NewLedgerEntry},
  otp::{self, NewOtp, OtpEntry, OtpRejection, OtpVerification},
  patient::{self, NewPatient, Patient},
  record::{self, MedicalRecord, MedicalRecordUpdate, NewMedicalRecord},
  staff::{NewStaffMember, StaffMember},
  store::SecurityStore,
};

use crate::{
  encode::{
    RawAudit, RawInsurance, RawLedgerEntry, RawOtp, RawPatient, RawRecord,
    RawStaff, encode_dt, encode_uuid,
  },
  schema::SCHEMA,
  Error, Result,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A medledger security store backed by a single SQLite file.
///
/// Cloning is cheap — the inner connection is reference-counted. All calls
/// execute sequentially on the connection's worker thread, which makes every
/// read-then-write closure (ledger appends in particular) atomic with
/// respect to every other store call.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store — useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Run arbitrary SQL against the store — test-only, used to simulate
  /// out-of-band tampering with persisted rows.
  #[cfg(test)]
  pub(crate) async fn execute_raw(&self, sql: String) -> Result<()> {
    self
      .conn
      .call(move |conn| {
        conn.execute_batch(&sql)?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

// ─── Row mappers ─────────────────────────────────────────────────────────────

fn row_to_patient(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawPatient> {
  Ok(RawPatient {
    patient_id: row.get(0)?,
    chain_id:   row.get(1)?,
    name:       row.get(2)?,
    email:      row.get(3)?,
    phone:      row.get(4)?,
    created_at: row.get(5)?,
  })
}

fn row_to_staff(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawStaff> {
  Ok(RawStaff {
    staff_id:   row.get(0)?,
    name:       row.get(1)?,
    phone:      row.get(2)?,
    role:       row.get(3)?,
    active:     row.get(4)?,
    created_at: row.get(5)?,
  })
}

fn row_to_otp(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawOtp> {
  Ok(RawOtp {
    otp_id:             row.get(0)?,
    contact:            row.get(1)?,
    code:               row.get(2)?,
    purpose:            row.get(3)?,
    issued_at:          row.get(4)?,
    expires_at:         row.get(5)?,
    consumed:           row.get(6)?,
    subject_patient_id: row.get(7)?,
    issued_by:          row.get(8)?,
    issued_by_role:     row.get(9)?,
  })
}

fn row_to_audit(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawAudit> {
  Ok(RawAudit {
    audit_id:           row.get(0)?,
    action:             row.get(1)?,
    actor_id:           row.get(2)?,
    actor_role:         row.get(3)?,
    subject_patient_id: row.get(4)?,
    related_record_id:  row.get(5)?,
    details:            row.get(6)?,
    source_address:     row.get(7)?,
    timestamp:          row.get(8)?,
  })
}

fn row_to_ledger(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawLedgerEntry> {
  Ok(RawLedgerEntry {
    entry_id:          row.get(0)?,
    subject_id:        row.get(1)?,
    entry_hash:        row.get(2)?,
    previous_hash:     row.get(3)?,
    timestamp:         row.get(4)?,
    entry_type:        row.get(5)?,
    payload_record_id: row.get(6)?,
    payload:           row.get(7)?,
    verified:          row.get(8)?,
  })
}

const LEDGER_COLUMNS: &str = "entry_id, subject_id, entry_hash, \
   previous_hash, timestamp, entry_type, payload_record_id, payload, verified";

fn row_to_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawRecord> {
  Ok(RawRecord {
    record_id:      row.get(0)?,
    patient_id:     row.get(1)?,
    doctor_name:    row.get(2)?,
    treatment_type: row.get(3)?,
    diagnosis:      row.get(4)?,
    medications:    row.get(5)?,
    date:           row.get(6)?,
    verified:       row.get(7)?,
    chain_hash:     row.get(8)?,
    recorded_at:    row.get(9)?,
  })
}

const RECORD_COLUMNS: &str = "record_id, patient_id, doctor_name, \
   treatment_type, diagnosis, medications, date, verified, chain_hash, \
   recorded_at";

fn row_to_insurance(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawInsurance> {
  Ok(RawInsurance {
    insurance_id:    row.get(0)?,
    patient_id:      row.get(1)?,
    provider:        row.get(2)?,
    policy_number:   row.get(3)?,
    coverage_amount: row.get(4)?,
    active_claims:   row.get(5)?,
    last_claim_date: row.get(6)?,
    status:          row.get(7)?,
    updated_at:      row.get(8)?,
  })
}

const INSURANCE_COLUMNS: &str = "insurance_id, patient_id, provider, \
   policy_number, coverage_amount, active_claims, last_claim_date, status, \
   updated_at";

// ─── Chain append (shared transactional step) ────────────────────────────────

/// Read the chain tip and insert the next entry, inside the caller's
/// transaction. This is the sole writer path to the ledger; callers run on
/// the connection's single worker thread, so appends cannot interleave.
fn insert_chain_entry(
  tx: &rusqlite::Transaction<'_>,
  subject_id: Uuid,
  entry_type: EntryType,
  payload_record_id: Uuid,
  payload: &str,
) -> rusqlite::Result<LedgerEntry> {
  let previous_hash: String = tx
    .query_row(
      "SELECT entry_hash FROM ledger ORDER BY seq DESC LIMIT 1",
      [],
      |r| r.get(0),
    )
    .optional()?
    .unwrap_or_else(|| ledger::GENESIS_HASH.to_string());

  let timestamp = Utc::now();
  let entry_hash =
    ledger::compute_entry_hash(payload, &previous_hash, timestamp);

  let entry = LedgerEntry {
    id: Uuid::new_v4(),
    subject_id,
    entry_hash,
    previous_hash,
    timestamp,
    entry_type,
    payload_record_id,
    payload: payload.to_string(),
    verified: false,
  };

  tx.execute(
    "INSERT INTO ledger (
       entry_id, subject_id, entry_hash, previous_hash, timestamp,
       entry_type, payload_record_id, payload, verified
     ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 0)",
    rusqlite::params![
      encode_uuid(entry.id),
      encode_uuid(entry.subject_id),
      entry.entry_hash,
      entry.previous_hash,
      encode_dt(entry.timestamp),
      entry.entry_type.to_string(),
      encode_uuid(entry.payload_record_id),
      entry.payload,
    ],
  )?;

  Ok(entry)
}

fn insert_record_row(
  tx: &rusqlite::Transaction<'_>,
  rec: &MedicalRecord,
) -> Result<(), tokio_rusqlite::Error> {
  let medications = serde_json::to_string(&rec.medications)
    .map_err(|e| tokio_rusqlite::Error::Other(Box::new(e)))?;
  tx.execute(
    "INSERT INTO medical_records (
       record_id, patient_id, doctor_name, treatment_type, diagnosis,
       medications, date, verified, chain_hash, recorded_at
     ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
    rusqlite::params![
      encode_uuid(rec.id),
      encode_uuid(rec.patient_id),
      rec.doctor_name,
      rec.treatment_type,
      rec.diagnosis,
      medications,
      rec.date.to_string(),
      rec.verified,
      rec.chain_hash,
      encode_dt(rec.recorded_at),
    ],
  )?;
  Ok(())
}

fn other_err(e: impl std::error::Error + Send + Sync + 'static) -> tokio_rusqlite::Error {
  tokio_rusqlite::Error::Other(Box::new(e))
}

/// Raw outcome of the atomic check-and-consume closure.
enum RawVerify {
  Rejected(OtpRejection),
  Accepted(RawOtp),
}

// ─── SecurityStore impl ──────────────────────────────────────────────────────

impl SecurityStore for SqliteStore {
  type Error = Error;

  // ── Patients ──────────────────────────────────────────────────────────────

  async fn add_patient(&self, input: NewPatient) -> Result<Patient> {
    let pat = Patient {
      id:         Uuid::new_v4(),
      chain_id:   patient::generate_chain_id(),
      name:       input.name,
      email:      input.email,
      phone:      input.phone,
      created_at: Utc::now(),
    };

    let row = pat.clone();
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO patients (patient_id, chain_id, name, email, phone, created_at)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
          rusqlite::params![
            encode_uuid(row.id),
            row.chain_id,
            row.name,
            row.email,
            row.phone,
            encode_dt(row.created_at),
          ],
        )?;
        Ok(())
      })
      .await?;

    Ok(pat)
  }

  async fn get_patient(&self, id: Uuid) -> Result<Option<Patient>> {
    let id_str = encode_uuid(id);

    let raw: Option<RawPatient> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT patient_id, chain_id, name, email, phone, created_at
               FROM patients WHERE patient_id = ?1",
              rusqlite::params![id_str],
              row_to_patient,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawPatient::into_patient).transpose()
  }

  async fn find_patient_by_chain_id(
    &self,
    chain_id: &str,
  ) -> Result<Option<Patient>> {
    let chain_id = chain_id.to_string();

    let raw: Option<RawPatient> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT patient_id, chain_id, name, email, phone, created_at
               FROM patients WHERE chain_id = ?1",
              rusqlite::params![chain_id],
              row_to_patient,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawPatient::into_patient).transpose()
  }

  // ── Staff ─────────────────────────────────────────────────────────────────

  async fn add_staff(&self, input: NewStaffMember) -> Result<StaffMember> {
    let member = StaffMember {
      id:         Uuid::new_v4(),
      name:       input.name,
      phone:      input.phone,
      role:       input.role,
      active:     true,
      created_at: Utc::now(),
    };

    let row = member.clone();
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO staff (staff_id, name, phone, role, active, created_at)
           VALUES (?1, ?2, ?3, ?4, 1, ?5)",
          rusqlite::params![
            encode_uuid(row.id),
            row.name,
            row.phone,
            row.role.to_string(),
            encode_dt(row.created_at),
          ],
        )?;
        Ok(())
      })
      .await?;

    Ok(member)
  }

  async fn find_staff_by_phone(
    &self,
    phone: &str,
  ) -> Result<Option<StaffMember>> {
    let phone = phone.to_string();

    let raw: Option<RawStaff> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT staff_id, name, phone, role, active, created_at
               FROM staff WHERE phone = ?1 AND active = 1",
              rusqlite::params![phone],
              row_to_staff,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawStaff::into_staff).transpose()
  }

  // ── OTP entries ───────────────────────────────────────────────────────────

  async fn issue_otp(&self, input: NewOtp) -> Result<OtpEntry> {
    let issued_at = Utc::now();
    let entry = OtpEntry {
      id:                 Uuid::new_v4(),
      contact:            input.contact,
      code:               input.code,
      purpose:            input.purpose,
      issued_at,
      expires_at:         issued_at + input.purpose.ttl(),
      consumed:           false,
      subject_patient_id: input.subject_patient_id,
      issued_by:          input.issued_by,
      issued_by_role:     input.issued_by_role,
    };

    let row = entry.clone();
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO otp_requests (
             otp_id, contact, code, purpose, issued_at, expires_at,
             consumed, subject_patient_id, issued_by, issued_by_role
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0, ?7, ?8, ?9)",
          rusqlite::params![
            encode_uuid(row.id),
            row.contact,
            row.code,
            row.purpose.to_string(),
            encode_dt(row.issued_at),
            encode_dt(row.expires_at),
            row.subject_patient_id.map(encode_uuid),
            encode_uuid(row.issued_by),
            row.issued_by_role.to_string(),
          ],
        )?;
        Ok(())
      })
      .await?;

    Ok(entry)
  }

  async fn get_otp(&self, id: Uuid) -> Result<Option<OtpEntry>> {
    let id_str = encode_uuid(id);

    let raw: Option<RawOtp> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT otp_id, contact, code, purpose, issued_at, expires_at,
                      consumed, subject_patient_id, issued_by, issued_by_role
               FROM otp_requests WHERE otp_id = ?1",
              rusqlite::params![id_str],
              row_to_otp,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawOtp::into_otp).transpose()
  }

  async fn verify_otp(
    &self,
    id: Uuid,
    supplied_code: &str,
  ) -> Result<OtpVerification> {
    let id_str = encode_uuid(id);
    let supplied = supplied_code.to_string();
    let now = Utc::now();

    let outcome: RawVerify = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        let raw: Option<RawOtp> = tx
          .query_row(
            "SELECT otp_id, contact, code, purpose, issued_at, expires_at,
                    consumed, subject_patient_id, issued_by, issued_by_role
             FROM otp_requests WHERE otp_id = ?1",
            rusqlite::params![id_str],
            row_to_otp,
          )
          .optional()?;

        let Some(raw) = raw else {
          return Ok(RawVerify::Rejected(OtpRejection::NotFound));
        };

        // Rejection order: consumed, expired, mismatch.
        if raw.consumed {
          return Ok(RawVerify::Rejected(OtpRejection::AlreadyConsumed));
        }

        let expires_at = chrono::DateTime::parse_from_rfc3339(&raw.expires_at)
          .map_err(other_err)?
          .with_timezone(&Utc);
        if now > expires_at {
          return Ok(RawVerify::Rejected(OtpRejection::Expired));
        }

        if !otp::constant_time_eq(raw.code.as_bytes(), supplied.as_bytes()) {
          return Ok(RawVerify::Rejected(OtpRejection::Mismatch));
        }

        tx.execute(
          "UPDATE otp_requests SET consumed = 1 WHERE otp_id = ?1",
          rusqlite::params![raw.otp_id],
        )?;
        tx.commit()?;

        Ok(RawVerify::Accepted(RawOtp { consumed: true, ..raw }))
      })
      .await?;

    match outcome {
      RawVerify::Accepted(raw) => {
        Ok(OtpVerification::Accepted(raw.into_otp()?))
      }
      RawVerify::Rejected(reason) => Ok(OtpVerification::Rejected(reason)),
    }
  }

  // ── Audit log ─────────────────────────────────────────────────────────────

  async fn record_audit(&self, input: NewAudit) -> Result<AuditEntry> {
    let entry = AuditEntry {
      id:                 Uuid::new_v4(),
      action:             input.action,
      actor_id:           input.actor_id,
      actor_role:         input.actor_role,
      subject_patient_id: input.subject_patient_id,
      related_record_id:  input.related_record_id,
      details:            input.details,
      source_address:     input.source_address,
      timestamp:          Utc::now(),
    };

    let row = entry.clone();
    let details_str = serde_json::to_string(&row.details)?;
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO audit_log (
             audit_id, action, actor_id, actor_role, subject_patient_id,
             related_record_id, details, source_address, timestamp
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
          rusqlite::params![
            encode_uuid(row.id),
            row.action,
            encode_uuid(row.actor_id),
            row.actor_role.to_string(),
            row.subject_patient_id.map(encode_uuid),
            row.related_record_id.map(encode_uuid),
            details_str,
            row.source_address,
            encode_dt(row.timestamp),
          ],
        )?;
        Ok(())
      })
      .await?;

    Ok(entry)
  }

  async fn list_audit(
    &self,
    patient_id: Uuid,
    limit: usize,
  ) -> Result<Vec<AuditEntry>> {
    let id_str = encode_uuid(patient_id);
    let limit = limit as i64;

    let raws: Vec<RawAudit> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT audit_id, action, actor_id, actor_role, subject_patient_id,
                  related_record_id, details, source_address, timestamp
           FROM audit_log
           WHERE subject_patient_id = ?1
           ORDER BY timestamp DESC
           LIMIT ?2",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![id_str, limit], row_to_audit)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawAudit::into_audit).collect()
  }

  // ── Hash-chain ledger ─────────────────────────────────────────────────────

  async fn append_ledger(&self, input: NewLedgerEntry) -> Result<LedgerEntry> {
    let entry = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let entry = insert_chain_entry(
          &tx,
          input.subject_id,
          input.entry_type,
          input.payload_record_id,
          &input.payload,
        )?;
        tx.commit()?;
        Ok(entry)
      })
      .await?;

    Ok(entry)
  }

  async fn get_ledger_entry(&self, id: Uuid) -> Result<Option<LedgerEntry>> {
    let id_str = encode_uuid(id);

    let raw: Option<RawLedgerEntry> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!(
                "SELECT {LEDGER_COLUMNS} FROM ledger WHERE entry_id = ?1"
              ),
              rusqlite::params![id_str],
              row_to_ledger,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawLedgerEntry::into_entry).transpose()
  }

  async fn mark_ledger_verified(&self, id: Uuid) -> Result<LedgerEntry> {
    let id_str = encode_uuid(id);

    let raw: Option<RawLedgerEntry> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        let raw: Option<RawLedgerEntry> = tx
          .query_row(
            &format!("SELECT {LEDGER_COLUMNS} FROM ledger WHERE entry_id = ?1"),
            rusqlite::params![id_str],
            row_to_ledger,
          )
          .optional()?;

        if let Some(ref entry) = raw {
          tx.execute(
            "UPDATE ledger SET verified = 1 WHERE entry_id = ?1",
            rusqlite::params![entry.entry_id],
          )?;
          // The attested record is confirmed in the same step.
          tx.execute(
            "UPDATE medical_records SET verified = 1 WHERE record_id = ?1",
            rusqlite::params![entry.payload_record_id],
          )?;
        }

        tx.commit()?;
        Ok(raw.map(|r| RawLedgerEntry { verified: true, ..r }))
      })
      .await?;

    raw
      .ok_or(Error::LedgerEntryNotFound(id))?
      .into_entry()
  }

  async fn list_ledger(&self, patient_id: Uuid) -> Result<Vec<LedgerEntry>> {
    let id_str = encode_uuid(patient_id);

    let raws: Vec<RawLedgerEntry> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {LEDGER_COLUMNS} FROM ledger
           WHERE subject_id = ?1 ORDER BY seq"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![id_str], row_to_ledger)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawLedgerEntry::into_entry).collect()
  }

  async fn all_ledger_entries(&self) -> Result<Vec<LedgerEntry>> {
    let raws: Vec<RawLedgerEntry> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn
          .prepare(&format!("SELECT {LEDGER_COLUMNS} FROM ledger ORDER BY seq"))?;
        let rows = stmt
          .query_map([], row_to_ledger)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawLedgerEntry::into_entry).collect()
  }

  // ── Medical records ───────────────────────────────────────────────────────

  async fn add_medical_record(
    &self,
    input: NewMedicalRecord,
  ) -> Result<(MedicalRecord, LedgerEntry)> {
    let mut rec = MedicalRecord {
      id:             Uuid::new_v4(),
      patient_id:     input.patient_id,
      doctor_name:    input.doctor_name,
      treatment_type: input.treatment_type,
      diagnosis:      input.diagnosis,
      medications:    input.medications,
      date:           input.date,
      verified:       false,
      chain_hash:     None,
      recorded_at:    Utc::now(),
    };
    let canonical = record::canonical_payload(&rec)?;

    let (rec, entry) = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        insert_record_row(&tx, &rec)?;
        let entry = insert_chain_entry(
          &tx,
          rec.patient_id,
          EntryType::Medical,
          rec.id,
          &canonical,
        )?;
        tx.execute(
          "UPDATE medical_records SET chain_hash = ?1 WHERE record_id = ?2",
          rusqlite::params![entry.entry_hash, encode_uuid(rec.id)],
        )?;

        tx.commit()?;
        rec.chain_hash = Some(entry.entry_hash.clone());
        Ok((rec, entry))
      })
      .await?;

    Ok((rec, entry))
  }

  async fn update_medical_record(
    &self,
    id: Uuid,
    changes: MedicalRecordUpdate,
  ) -> Result<(MedicalRecord, LedgerEntry)> {
    let id_str = encode_uuid(id);

    let updated: Option<(MedicalRecord, LedgerEntry)> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        let raw: Option<RawRecord> = tx
          .query_row(
            &format!(
              "SELECT {RECORD_COLUMNS} FROM medical_records
               WHERE record_id = ?1"
            ),
            rusqlite::params![id_str],
            row_to_record,
          )
          .optional()?;

        let Some(raw) = raw else {
          return Ok(None);
        };
        let mut rec = raw.into_record().map_err(other_err)?;

        changes.apply(&mut rec);
        let canonical =
          record::canonical_payload(&rec).map_err(other_err)?;

        let entry = insert_chain_entry(
          &tx,
          rec.patient_id,
          EntryType::Medical,
          rec.id,
          &canonical,
        )?;
        rec.chain_hash = Some(entry.entry_hash.clone());

        let medications =
          serde_json::to_string(&rec.medications).map_err(other_err)?;
        tx.execute(
          "UPDATE medical_records SET
             doctor_name = ?1, treatment_type = ?2, diagnosis = ?3,
             medications = ?4, date = ?5, verified = 0, chain_hash = ?6
           WHERE record_id = ?7",
          rusqlite::params![
            rec.doctor_name,
            rec.treatment_type,
            rec.diagnosis,
            medications,
            rec.date.to_string(),
            rec.chain_hash,
            encode_uuid(rec.id),
          ],
        )?;

        tx.commit()?;
        Ok(Some((rec, entry)))
      })
      .await?;

    updated.ok_or(Error::RecordNotFound(id))
  }

  async fn get_medical_record(
    &self,
    id: Uuid,
  ) -> Result<Option<MedicalRecord>> {
    let id_str = encode_uuid(id);

    let raw: Option<RawRecord> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!(
                "SELECT {RECORD_COLUMNS} FROM medical_records
                 WHERE record_id = ?1"
              ),
              rusqlite::params![id_str],
              row_to_record,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawRecord::into_record).transpose()
  }

  async fn list_medical_records(
    &self,
    patient_id: Uuid,
  ) -> Result<Vec<MedicalRecord>> {
    let id_str = encode_uuid(patient_id);

    let raws: Vec<RawRecord> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {RECORD_COLUMNS} FROM medical_records
           WHERE patient_id = ?1 ORDER BY date DESC, recorded_at DESC"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![id_str], row_to_record)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawRecord::into_record).collect()
  }

  // ── Insurance info ────────────────────────────────────────────────────────

  async fn set_insurance_info(
    &self,
    input: NewInsuranceInfo,
  ) -> Result<(InsuranceInfo, LedgerEntry)> {
    let (info, entry) = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        // The row id survives upserts so ledger entries keep pointing at it.
        let existing: Option<String> = tx
          .query_row(
            "SELECT insurance_id FROM insurance_info WHERE patient_id = ?1",
            rusqlite::params![encode_uuid(input.patient_id)],
            |r| r.get(0),
          )
          .optional()?;

        let id = match existing.as_deref() {
          Some(s) => Uuid::parse_str(s).map_err(other_err)?,
          None => Uuid::new_v4(),
        };
        let info = InsuranceInfo {
          id,
          patient_id:      input.patient_id,
          provider:        input.provider,
          policy_number:   input.policy_number,
          coverage_amount: input.coverage_amount,
          active_claims:   input.active_claims,
          last_claim_date: input.last_claim_date,
          status:          input.status,
          updated_at:      Utc::now(),
        };
        let canonical =
          insurance::canonical_payload(&info).map_err(other_err)?;

        if existing.is_some() {
          tx.execute(
            "UPDATE insurance_info SET
               provider = ?1, policy_number = ?2, coverage_amount = ?3,
               active_claims = ?4, last_claim_date = ?5, status = ?6,
               updated_at = ?7
             WHERE insurance_id = ?8",
            rusqlite::params![
              info.provider,
              info.policy_number,
              info.coverage_amount,
              info.active_claims,
              info.last_claim_date.map(|d| d.to_string()),
              info.status.to_string(),
              encode_dt(info.updated_at),
              encode_uuid(info.id),
            ],
          )?;
        } else {
          tx.execute(
            "INSERT INTO insurance_info (
               insurance_id, patient_id, provider, policy_number,
               coverage_amount, active_claims, last_claim_date, status,
               updated_at
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            rusqlite::params![
              encode_uuid(info.id),
              encode_uuid(info.patient_id),
              info.provider,
              info.policy_number,
              info.coverage_amount,
              info.active_claims,
              info.last_claim_date.map(|d| d.to_string()),
              info.status.to_string(),
              encode_dt(info.updated_at),
            ],
          )?;
        }

        let entry = insert_chain_entry(
          &tx,
          info.patient_id,
          EntryType::Insurance,
          info.id,
          &canonical,
        )?;

        tx.commit()?;
        Ok((info, entry))
      })
      .await?;

    Ok((info, entry))
  }

  async fn get_insurance_info(
    &self,
    patient_id: Uuid,
  ) -> Result<Option<InsuranceInfo>> {
    let id_str = encode_uuid(patient_id);

    let raw: Option<RawInsurance> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!(
                "SELECT {INSURANCE_COLUMNS} FROM insurance_info
                 WHERE patient_id = ?1"
              ),
              rusqlite::params![id_str],
              row_to_insurance,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawInsurance::into_insurance).transpose()
  }
}
