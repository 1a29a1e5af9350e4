use chrono::NaiveDate;
use uuid::Uuid;

use medledger_core::{
  access::Role,
  audit::NewAudit,
  insurance::{CoverageStatus, NewInsuranceInfo},
  ledger::{self, ChainVerdict, EntryType, NewLedgerEntry},
  otp::{NewOtp, OtpPurpose, OtpRejection, OtpVerification},
  patient::NewPatient,
  record::{MedicalRecordUpdate, NewMedicalRecord},
  staff::NewStaffMember,
  store::SecurityStore,
};

use crate::{Error, SqliteStore};

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory().await.unwrap()
}

async fn seed_patient(store: &SqliteStore) -> medledger_core::patient::Patient {
  store
    .add_patient(NewPatient {
      name:  "Asha Rao".into(),
      email: "asha@example.com".into(),
      phone: "+911234567890".into(),
    })
    .await
    .unwrap()
}

fn new_otp(purpose: OtpPurpose, patient_id: Option<Uuid>) -> NewOtp {
  NewOtp {
    contact: "+911234567890".into(),
    code: "483920".into(),
    purpose,
    subject_patient_id: patient_id,
    issued_by: Uuid::new_v4(),
    issued_by_role: Role::HospitalStaff,
  }
}

fn new_record(patient_id: Uuid) -> NewMedicalRecord {
  NewMedicalRecord {
    patient_id,
    doctor_name: "Dr. Mehta".into(),
    treatment_type: "Consultation".into(),
    diagnosis: "Seasonal flu".into(),
    medications: vec!["Paracetamol".into()],
    date: NaiveDate::from_ymd_opt(2024, 3, 15).unwrap(),
  }
}

// ─── Patients & staff ────────────────────────────────────────────────────────

#[tokio::test]
async fn patient_round_trip_and_chain_id_lookup() {
  let store = store().await;
  let pat = seed_patient(&store).await;

  assert!(pat.chain_id.starts_with("BC-IN-2024-"));

  let by_id = store.get_patient(pat.id).await.unwrap().unwrap();
  assert_eq!(by_id.email, "asha@example.com");

  let by_chain = store
    .find_patient_by_chain_id(&pat.chain_id)
    .await
    .unwrap()
    .unwrap();
  assert_eq!(by_chain.id, pat.id);

  assert!(
    store
      .find_patient_by_chain_id("BC-IN-2024-XXX-0000000000")
      .await
      .unwrap()
      .is_none()
  );
}

#[tokio::test]
async fn staff_lookup_by_phone() {
  let store = store().await;
  let member = store
    .add_staff(NewStaffMember {
      name:  "Nurse Joy".into(),
      phone: "+919999999999".into(),
      role:  Role::HospitalStaff,
    })
    .await
    .unwrap();

  let found = store
    .find_staff_by_phone("+919999999999")
    .await
    .unwrap()
    .unwrap();
  assert_eq!(found.id, member.id);
  assert_eq!(found.role, Role::HospitalStaff);
  assert!(found.active);

  assert!(store.find_staff_by_phone("+910000000000").await.unwrap().is_none());
}

// ─── OTP lifecycle ───────────────────────────────────────────────────────────

#[tokio::test]
async fn otp_accepts_correct_code_once() {
  let store = store().await;
  let pat = seed_patient(&store).await;
  let otp = store
    .issue_otp(new_otp(OtpPurpose::Consent, Some(pat.id)))
    .await
    .unwrap();

  assert!(!otp.consumed);
  assert_eq!(otp.expires_at - otp.issued_at, chrono::Duration::minutes(10));

  match store.verify_otp(otp.id, "483920").await.unwrap() {
    OtpVerification::Accepted(entry) => {
      assert!(entry.consumed);
      assert_eq!(entry.subject_patient_id, Some(pat.id));
    }
    other => panic!("expected acceptance, got {other:?}"),
  }

  // The code is single-use, even with the correct digits.
  match store.verify_otp(otp.id, "483920").await.unwrap() {
    OtpVerification::Rejected(OtpRejection::AlreadyConsumed) => {}
    other => panic!("expected already-consumed, got {other:?}"),
  }
}

#[tokio::test]
async fn otp_rejects_wrong_code_without_consuming() {
  let store = store().await;
  let otp = store
    .issue_otp(new_otp(OtpPurpose::StaffLogin, None))
    .await
    .unwrap();

  match store.verify_otp(otp.id, "000000").await.unwrap() {
    OtpVerification::Rejected(OtpRejection::Mismatch) => {}
    other => panic!("expected mismatch, got {other:?}"),
  }

  // A failed attempt leaves the entry usable.
  assert!(store.verify_otp(otp.id, "483920").await.unwrap().is_accepted());
}

#[tokio::test]
async fn otp_expiry_beats_a_correct_code() {
  let store = store().await;
  let otp = store
    .issue_otp(new_otp(OtpPurpose::Consent, None))
    .await
    .unwrap();

  store
    .execute_raw(format!(
      "UPDATE otp_requests SET expires_at = '2020-01-01T00:00:00+00:00'
       WHERE otp_id = '{}';",
      otp.id
    ))
    .await
    .unwrap();

  match store.verify_otp(otp.id, "483920").await.unwrap() {
    OtpVerification::Rejected(OtpRejection::Expired) => {}
    other => panic!("expected expired, got {other:?}"),
  }
}

#[tokio::test]
async fn otp_unknown_id_is_not_found() {
  let store = store().await;
  match store.verify_otp(Uuid::new_v4(), "483920").await.unwrap() {
    OtpVerification::Rejected(OtpRejection::NotFound) => {}
    other => panic!("expected not-found, got {other:?}"),
  }
  assert!(store.get_otp(Uuid::new_v4()).await.unwrap().is_none());
}

// ─── Ledger ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn appends_link_back_to_genesis() {
  let store = store().await;
  let pat = seed_patient(&store).await;

  let mut entries = Vec::new();
  for i in 0..3 {
    entries.push(
      store
        .append_ledger(NewLedgerEntry {
          subject_id:        pat.id,
          entry_type:        EntryType::Medical,
          payload_record_id: Uuid::new_v4(),
          payload:           format!("{{\"n\":{i}}}"),
        })
        .await
        .unwrap(),
    );
  }

  assert_eq!(entries[0].previous_hash, ledger::GENESIS_HASH);
  assert_eq!(entries[1].previous_hash, entries[0].entry_hash);
  assert_eq!(entries[2].previous_hash, entries[1].entry_hash);

  let all = store.all_ledger_entries().await.unwrap();
  assert_eq!(all.len(), 3);
  assert_eq!(ledger::verify_chain(&all), ChainVerdict::Valid);
}

#[tokio::test]
async fn concurrent_appends_form_a_linear_chain() {
  let store = store().await;
  let pat = seed_patient(&store).await;

  let append = |payload: &str| {
    store.append_ledger(NewLedgerEntry {
      subject_id:        pat.id,
      entry_type:        EntryType::Medical,
      payload_record_id: Uuid::new_v4(),
      payload:           payload.to_string(),
    })
  };

  let (a, b, c, d) =
    tokio::join!(append("a"), append("b"), append("c"), append("d"));
  let appended = [a.unwrap(), b.unwrap(), c.unwrap(), d.unwrap()];

  // No two entries may claim the same predecessor.
  let mut prevs: Vec<&str> =
    appended.iter().map(|e| e.previous_hash.as_str()).collect();
  prevs.sort_unstable();
  prevs.dedup();
  assert_eq!(prevs.len(), 4);

  let all = store.all_ledger_entries().await.unwrap();
  assert_eq!(all.len(), 4);
  assert_eq!(ledger::verify_chain(&all), ChainVerdict::Valid);
}

#[tokio::test]
async fn tampered_row_fails_replay_at_its_index() {
  let store = store().await;
  let pat = seed_patient(&store).await;

  for i in 0..3 {
    store
      .append_ledger(NewLedgerEntry {
        subject_id:        pat.id,
        entry_type:        EntryType::Medical,
        payload_record_id: Uuid::new_v4(),
        payload:           format!("payload-{i}"),
      })
      .await
      .unwrap();
  }
  assert_eq!(
    ledger::verify_chain(&store.all_ledger_entries().await.unwrap()),
    ChainVerdict::Valid
  );

  // Out-of-band edit to a persisted payload, as an attacker with database
  // access would make.
  store
    .execute_raw(
      "UPDATE ledger SET payload = 'payload-1-doctored'
       WHERE payload = 'payload-1';"
        .into(),
    )
    .await
    .unwrap();

  assert_eq!(
    ledger::verify_chain(&store.all_ledger_entries().await.unwrap()),
    ChainVerdict::Invalid { at_index: 1 }
  );
}

#[tokio::test]
async fn list_ledger_filters_by_subject() {
  let store = store().await;
  let pat_a = seed_patient(&store).await;
  let pat_b = store
    .add_patient(NewPatient {
      name:  "Vikram Shah".into(),
      email: "vikram@example.com".into(),
      phone: "+911111111111".into(),
    })
    .await
    .unwrap();

  for (subject, payload) in
    [(pat_a.id, "a1"), (pat_b.id, "b1"), (pat_a.id, "a2")]
  {
    store
      .append_ledger(NewLedgerEntry {
        subject_id:        subject,
        entry_type:        EntryType::Medical,
        payload_record_id: Uuid::new_v4(),
        payload:           payload.into(),
      })
      .await
      .unwrap();
  }

  let for_a = store.list_ledger(pat_a.id).await.unwrap();
  assert_eq!(for_a.len(), 2);
  assert_eq!(for_a[0].payload, "a1");
  assert_eq!(for_a[1].payload, "a2");
}

#[tokio::test]
async fn mark_verified_flips_entry_and_record() {
  let store = store().await;
  let pat = seed_patient(&store).await;
  let (rec, entry) =
    store.add_medical_record(new_record(pat.id)).await.unwrap();

  let marked = store.mark_ledger_verified(entry.id).await.unwrap();
  assert!(marked.verified);

  let rec = store.get_medical_record(rec.id).await.unwrap().unwrap();
  assert!(rec.verified);

  match store.mark_ledger_verified(Uuid::new_v4()).await {
    Err(Error::LedgerEntryNotFound(_)) => {}
    other => panic!("expected ledger-entry-not-found, got {other:?}"),
  }
}

// ─── Medical records ─────────────────────────────────────────────────────────

#[tokio::test]
async fn add_record_appends_attestation_atomically() {
  let store = store().await;
  let pat = seed_patient(&store).await;

  let (rec, entry) =
    store.add_medical_record(new_record(pat.id)).await.unwrap();

  assert_eq!(rec.chain_hash.as_deref(), Some(entry.entry_hash.as_str()));
  assert_eq!(entry.subject_id, pat.id);
  assert_eq!(entry.payload_record_id, rec.id);
  assert!(!rec.verified);

  // The persisted row carries the same attestation hash.
  let stored = store.get_medical_record(rec.id).await.unwrap().unwrap();
  assert_eq!(stored.chain_hash, rec.chain_hash);

  // The payload is a replayable snapshot of the record.
  let all = store.all_ledger_entries().await.unwrap();
  assert_eq!(all.len(), 1);
  assert_eq!(ledger::verify_chain(&all), ChainVerdict::Valid);
  assert!(entry.payload.contains("Seasonal flu"));
}

#[tokio::test]
async fn update_record_resets_verification_and_reattests() {
  let store = store().await;
  let pat = seed_patient(&store).await;
  let (rec, first) =
    store.add_medical_record(new_record(pat.id)).await.unwrap();
  store.mark_ledger_verified(first.id).await.unwrap();

  let (updated, second) = store
    .update_medical_record(rec.id, MedicalRecordUpdate {
      diagnosis: Some("Pneumonia".into()),
      ..Default::default()
    })
    .await
    .unwrap();

  assert_eq!(updated.diagnosis, "Pneumonia");
  assert_eq!(updated.doctor_name, "Dr. Mehta");
  assert!(!updated.verified);
  assert_eq!(
    updated.chain_hash.as_deref(),
    Some(second.entry_hash.as_str())
  );
  assert_eq!(second.previous_hash, first.entry_hash);

  let all = store.all_ledger_entries().await.unwrap();
  assert_eq!(all.len(), 2);
  assert_eq!(ledger::verify_chain(&all), ChainVerdict::Valid);
}

#[tokio::test]
async fn update_unknown_record_errors() {
  let store = store().await;
  match store
    .update_medical_record(Uuid::new_v4(), MedicalRecordUpdate::default())
    .await
  {
    Err(Error::RecordNotFound(_)) => {}
    other => panic!("expected record-not-found, got {other:?}"),
  }
}

#[tokio::test]
async fn list_records_is_most_recent_first() {
  let store = store().await;
  let pat = seed_patient(&store).await;

  for (day, diagnosis) in [(10, "first"), (20, "second"), (15, "third")] {
    let mut input = new_record(pat.id);
    input.date = NaiveDate::from_ymd_opt(2024, 3, day).unwrap();
    input.diagnosis = diagnosis.into();
    store.add_medical_record(input).await.unwrap();
  }

  let records = store.list_medical_records(pat.id).await.unwrap();
  let diagnoses: Vec<&str> =
    records.iter().map(|r| r.diagnosis.as_str()).collect();
  assert_eq!(diagnoses, vec!["second", "third", "first"]);
}

// ─── Insurance info ──────────────────────────────────────────────────────────

fn new_insurance(patient_id: Uuid) -> NewInsuranceInfo {
  NewInsuranceInfo {
    patient_id,
    provider: "Star Health".into(),
    policy_number: "SH-99120".into(),
    coverage_amount: 500_000,
    active_claims: 0,
    last_claim_date: None,
    status: CoverageStatus::Active,
  }
}

#[tokio::test]
async fn insurance_upsert_keeps_its_row_id_and_reattests() {
  let store = store().await;
  let pat = seed_patient(&store).await;

  assert!(store.get_insurance_info(pat.id).await.unwrap().is_none());

  let (first, first_entry) =
    store.set_insurance_info(new_insurance(pat.id)).await.unwrap();
  assert_eq!(first_entry.entry_type, EntryType::Insurance);
  assert_eq!(first_entry.subject_id, pat.id);
  assert_eq!(first_entry.payload_record_id, first.id);

  let mut changed = new_insurance(pat.id);
  changed.active_claims = 2;
  changed.last_claim_date = NaiveDate::from_ymd_opt(2024, 5, 2);
  changed.status = CoverageStatus::Suspended;
  let (second, second_entry) =
    store.set_insurance_info(changed).await.unwrap();

  // Same summary row, fresh attestation.
  assert_eq!(second.id, first.id);
  assert_eq!(second_entry.previous_hash, first_entry.entry_hash);

  let stored = store.get_insurance_info(pat.id).await.unwrap().unwrap();
  assert_eq!(stored.active_claims, 2);
  assert_eq!(stored.status, CoverageStatus::Suspended);
  assert_eq!(
    stored.last_claim_date,
    NaiveDate::from_ymd_opt(2024, 5, 2)
  );

  let all = store.all_ledger_entries().await.unwrap();
  assert_eq!(all.len(), 2);
  assert_eq!(ledger::verify_chain(&all), ChainVerdict::Valid);
}

// ─── Audit log ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn audit_listing_is_most_recent_first_and_capped() {
  let store = store().await;
  let pat = seed_patient(&store).await;
  let actor = Uuid::new_v4();

  for action in ["OTP Sent", "OTP Verified", "Medical Records Access"] {
    store
      .record_audit(
        NewAudit::new(action, actor, Role::HospitalStaff, "203.0.113.7")
          .patient(pat.id),
      )
      .await
      .unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
  }

  let entries = store.list_audit(pat.id, 50).await.unwrap();
  let actions: Vec<&str> =
    entries.iter().map(|e| e.action.as_str()).collect();
  assert_eq!(
    actions,
    vec!["Medical Records Access", "OTP Verified", "OTP Sent"]
  );

  let capped = store.list_audit(pat.id, 2).await.unwrap();
  assert_eq!(capped.len(), 2);
  assert_eq!(capped[0].action, "Medical Records Access");

  // Entries about other patients are not returned.
  assert!(store.list_audit(Uuid::new_v4(), 50).await.unwrap().is_empty());
}

#[tokio::test]
async fn audit_details_round_trip_as_json() {
  let store = store().await;
  let pat = seed_patient(&store).await;

  store
    .record_audit(
      NewAudit::new("OTP Sent", Uuid::new_v4(), Role::InsuranceStaff, "unknown")
        .patient(pat.id)
        .details(serde_json::json!({ "purpose": "consent" })),
    )
    .await
    .unwrap();

  let entries = store.list_audit(pat.id, 10).await.unwrap();
  assert_eq!(entries[0].details["purpose"], "consent");
  assert_eq!(entries[0].actor_role, Role::InsuranceStaff);
}
