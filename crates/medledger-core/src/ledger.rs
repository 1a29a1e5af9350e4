//! The hash-chain ledger — an append-only sequence in which every entry
//! commits to its own canonical payload and to its predecessor's hash.
//!
//! The chain is strictly linear and global: `previous_hash` refers to the
//! immediately preceding entry in insertion order across all subjects, not
//! per-subject. Tamper-evident, not tamper-proof; there is one writer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use strum::{Display, EnumString};
use uuid::Uuid;

// ─── Genesis ─────────────────────────────────────────────────────────────────

/// `previous_hash` of the first entry on an empty ledger: the all-zero
/// 256-bit digest, hex-encoded. Never null or absent.
pub const GENESIS_HASH: &str =
  "0000000000000000000000000000000000000000000000000000000000000000";

// ─── Entry ───────────────────────────────────────────────────────────────────

/// The class of record an entry attests.
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
pub enum EntryType {
  Medical,
  Insurance,
  PersonalInfo,
}

/// One link in the chain. Append-only; `verified` is the only mutable field,
/// flipped after the patient confirms the entry through the consent gate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
  pub id:                Uuid,
  /// The entity the attested record concerns (a patient id).
  pub subject_id:        Uuid,
  pub entry_hash:        String,
  pub previous_hash:     String,
  pub timestamp:         DateTime<Utc>,
  pub entry_type:        EntryType,
  /// The mutable record this entry attests.
  pub payload_record_id: Uuid,
  /// Canonical serialisation of the record at append time. Stored so the
  /// chain can be replayed without the record's current (possibly mutated)
  /// state.
  pub payload:           String,
  pub verified:          bool,
}

/// Input to [`crate::store::SecurityStore::append_ledger`]. The previous
/// hash, timestamp, and entry hash are computed inside the store's
/// serialized append path.
#[derive(Debug, Clone)]
pub struct NewLedgerEntry {
  pub subject_id:        Uuid,
  pub entry_type:        EntryType,
  pub payload_record_id: Uuid,
  pub payload:           String,
}

// ─── Hashing ─────────────────────────────────────────────────────────────────

/// `entry_hash = hex(SHA-256(payload ‖ previous_hash ‖ timestamp))`.
///
/// The timestamp enters as its RFC 3339 form, the exact representation
/// persisted with the entry, so replay from storage recomputes identically.
pub fn compute_entry_hash(
  payload: &str,
  previous_hash: &str,
  timestamp: DateTime<Utc>,
) -> String {
  let mut hasher = Sha256::new();
  hasher.update(payload.as_bytes());
  hasher.update(previous_hash.as_bytes());
  hasher.update(timestamp.to_rfc3339().as_bytes());
  hex::encode(hasher.finalize())
}

// ─── Verification ────────────────────────────────────────────────────────────

/// Result of replaying the chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ChainVerdict {
  Valid,
  Invalid { at_index: usize },
}

impl ChainVerdict {
  pub fn is_valid(&self) -> bool { matches!(self, Self::Valid) }
}

/// Replay `entries` (which must be in global insertion order), recomputing
/// every hash and checking every predecessor link. Returns the index of the
/// first entry that fails either check.
pub fn verify_chain(entries: &[LedgerEntry]) -> ChainVerdict {
  let mut expected_prev = GENESIS_HASH;

  for (index, entry) in entries.iter().enumerate() {
    if entry.previous_hash != expected_prev {
      return ChainVerdict::Invalid { at_index: index };
    }

    let recomputed = compute_entry_hash(
      &entry.payload,
      &entry.previous_hash,
      entry.timestamp,
    );
    if recomputed != entry.entry_hash {
      return ChainVerdict::Invalid { at_index: index };
    }

    expected_prev = &entry.entry_hash;
  }

  ChainVerdict::Valid
}

#[cfg(test)]
mod tests {
  use super::*;

  fn entry(index: usize, previous_hash: &str, payload: &str) -> LedgerEntry {
    let timestamp = DateTime::from_timestamp(1_700_000_000 + index as i64, 0)
      .unwrap();
    let entry_hash = compute_entry_hash(payload, previous_hash, timestamp);
    LedgerEntry {
      id: Uuid::new_v4(),
      subject_id: Uuid::new_v4(),
      entry_hash,
      previous_hash: previous_hash.to_string(),
      timestamp,
      entry_type: EntryType::Medical,
      payload_record_id: Uuid::new_v4(),
      payload: payload.to_string(),
      verified: false,
    }
  }

  fn chain(payloads: &[&str]) -> Vec<LedgerEntry> {
    let mut entries: Vec<LedgerEntry> = Vec::new();
    for (i, p) in payloads.iter().enumerate() {
      let prev = entries
        .last()
        .map(|e| e.entry_hash.clone())
        .unwrap_or_else(|| GENESIS_HASH.to_string());
      entries.push(entry(i, &prev, p));
    }
    entries
  }

  #[test]
  fn empty_chain_is_valid() {
    assert_eq!(verify_chain(&[]), ChainVerdict::Valid);
  }

  #[test]
  fn well_formed_chain_is_valid() {
    let entries = chain(&["a", "b", "c"]);
    assert_eq!(verify_chain(&entries), ChainVerdict::Valid);
  }

  #[test]
  fn genesis_must_use_the_sentinel() {
    let entries = chain(&["a"]);
    let mut forged = entries.clone();
    forged[0].previous_hash = "f".repeat(64);
    forged[0].entry_hash = compute_entry_hash(
      &forged[0].payload,
      &forged[0].previous_hash,
      forged[0].timestamp,
    );
    assert_eq!(verify_chain(&forged), ChainVerdict::Invalid { at_index: 0 });
  }

  #[test]
  fn tampered_payload_is_detected_at_its_index() {
    let mut entries = chain(&["a", "b", "c"]);
    entries[1].payload = "b-mutated".to_string();
    assert_eq!(
      verify_chain(&entries),
      ChainVerdict::Invalid { at_index: 1 }
    );
  }

  #[test]
  fn broken_predecessor_link_is_detected() {
    let mut entries = chain(&["a", "b", "c"]);
    // Rehash entry 2 against a hash nothing in the chain produced.
    let bogus_prev = "e".repeat(64);
    entries[2].previous_hash = bogus_prev.clone();
    entries[2].entry_hash = compute_entry_hash(
      &entries[2].payload,
      &bogus_prev,
      entries[2].timestamp,
    );
    assert_eq!(
      verify_chain(&entries),
      ChainVerdict::Invalid { at_index: 2 }
    );
  }

  #[test]
  fn hash_depends_on_every_input() {
    let ts = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
    let base = compute_entry_hash("p", GENESIS_HASH, ts);
    assert_ne!(base, compute_entry_hash("q", GENESIS_HASH, ts));
    assert_ne!(base, compute_entry_hash("p", &"1".repeat(64), ts));
    assert_ne!(
      base,
      compute_entry_hash("p", GENESIS_HASH, ts + chrono::Duration::seconds(1))
    );
    assert_eq!(base.len(), 64);
  }
}
