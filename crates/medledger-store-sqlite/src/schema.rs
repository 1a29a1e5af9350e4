//! SQL schema for the medledger SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS patients (
    patient_id  TEXT PRIMARY KEY,
    chain_id    TEXT NOT NULL UNIQUE,
    name        TEXT NOT NULL,
    email       TEXT NOT NULL,
    phone       TEXT NOT NULL,
    created_at  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS staff (
    staff_id    TEXT PRIMARY KEY,
    name        TEXT NOT NULL,
    phone       TEXT NOT NULL UNIQUE,
    role        TEXT NOT NULL,   -- 'hospital_staff' | 'insurance_staff'
    active      INTEGER NOT NULL DEFAULT 1,
    created_at  TEXT NOT NULL
);

-- One-time codes. Written once; 'consumed' is the only field ever updated.
-- Expired rows stay in place and are treated as invalid at read time.
CREATE TABLE IF NOT EXISTS otp_requests (
    otp_id             TEXT PRIMARY KEY,
    contact            TEXT NOT NULL,
    code               TEXT NOT NULL,   -- 6 ASCII digits
    purpose            TEXT NOT NULL,   -- 'consent' | 'staff_login' | 'record_update'
    issued_at          TEXT NOT NULL,
    expires_at         TEXT NOT NULL,
    consumed           INTEGER NOT NULL DEFAULT 0,
    subject_patient_id TEXT REFERENCES patients(patient_id),
    issued_by          TEXT NOT NULL,
    issued_by_role     TEXT NOT NULL
);

-- Audit trail is strictly append-only.
-- No UPDATE or DELETE is ever issued against this table.
CREATE TABLE IF NOT EXISTS audit_log (
    audit_id           TEXT PRIMARY KEY,
    action             TEXT NOT NULL,
    actor_id           TEXT NOT NULL,
    actor_role         TEXT NOT NULL,
    subject_patient_id TEXT,
    related_record_id  TEXT,
    details            TEXT NOT NULL DEFAULT '{}',
    source_address     TEXT NOT NULL,
    timestamp          TEXT NOT NULL
);

-- The hash chain. 'seq' fixes global insertion order; 'verified' is the
-- only mutable column.
CREATE TABLE IF NOT EXISTS ledger (
    seq               INTEGER PRIMARY KEY AUTOINCREMENT,
    entry_id          TEXT NOT NULL UNIQUE,
    subject_id        TEXT NOT NULL,
    entry_hash        TEXT NOT NULL UNIQUE,
    previous_hash     TEXT NOT NULL,
    timestamp         TEXT NOT NULL,
    entry_type        TEXT NOT NULL,   -- 'medical' | 'insurance' | 'personal_info'
    payload_record_id TEXT NOT NULL,
    payload           TEXT NOT NULL,   -- canonical record snapshot at append time
    verified          INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS medical_records (
    record_id      TEXT PRIMARY KEY,
    patient_id     TEXT NOT NULL REFERENCES patients(patient_id),
    doctor_name    TEXT NOT NULL,
    treatment_type TEXT NOT NULL,
    diagnosis      TEXT NOT NULL,
    medications    TEXT NOT NULL DEFAULT '[]',
    date           TEXT NOT NULL,
    verified       INTEGER NOT NULL DEFAULT 0,
    chain_hash     TEXT,
    recorded_at    TEXT NOT NULL
);

-- One coverage summary per patient; upserts keep the row id stable.
CREATE TABLE IF NOT EXISTS insurance_info (
    insurance_id    TEXT PRIMARY KEY,
    patient_id      TEXT NOT NULL UNIQUE REFERENCES patients(patient_id),
    provider        TEXT NOT NULL,
    policy_number   TEXT NOT NULL UNIQUE,
    coverage_amount INTEGER NOT NULL,
    active_claims   INTEGER NOT NULL DEFAULT 0,
    last_claim_date TEXT,
    status          TEXT NOT NULL,   -- 'active' | 'inactive' | 'suspended'
    updated_at      TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS otp_contact_purpose_idx ON otp_requests(contact, purpose);
CREATE INDEX IF NOT EXISTS otp_expires_idx         ON otp_requests(expires_at);
CREATE INDEX IF NOT EXISTS audit_actor_idx         ON audit_log(actor_id);
CREATE INDEX IF NOT EXISTS audit_patient_idx       ON audit_log(subject_patient_id);
CREATE INDEX IF NOT EXISTS audit_timestamp_idx     ON audit_log(timestamp);
CREATE INDEX IF NOT EXISTS ledger_subject_idx      ON ledger(subject_id);
CREATE INDEX IF NOT EXISTS ledger_record_idx       ON ledger(payload_record_id);
CREATE INDEX IF NOT EXISTS records_patient_idx     ON medical_records(patient_id);

PRAGMA user_version = 1;
";
