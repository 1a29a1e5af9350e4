//! Patient registry types.
//!
//! Patients carry a public "chain id" used by staff to look a patient up
//! without knowing their internal UUID.

use chrono::{DateTime, Utc};
use rand_core::{OsRng, RngCore as _};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Patient {
  pub id:         Uuid,
  pub chain_id:   String,
  pub name:       String,
  pub email:      String,
  pub phone:      String,
  pub created_at: DateTime<Utc>,
}

/// Input to [`crate::store::SecurityStore::add_patient`].
/// The id, chain id, and creation timestamp are assigned by the store.
#[derive(Debug, Clone, Deserialize)]
pub struct NewPatient {
  pub name:  String,
  pub email: String,
  pub phone: String,
}

/// Generate a public chain id, e.g. `BC-IN-2024-7F3-184D2C9A1B`.
pub fn generate_chain_id() -> String {
  const ALPHABET: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";
  let mut buf = [0u8; 13];
  OsRng.fill_bytes(&mut buf);
  let chars: Vec<char> = buf
    .iter()
    .map(|b| ALPHABET[(*b as usize) % ALPHABET.len()] as char)
    .collect();
  let head: String = chars[..3].iter().collect();
  let tail: String = chars[3..].iter().collect();
  format!("BC-IN-2024-{head}-{tail}")
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn chain_id_has_expected_shape() {
    let id = generate_chain_id();
    assert!(id.starts_with("BC-IN-2024-"));
    let parts: Vec<&str> = id.split('-').collect();
    assert_eq!(parts.len(), 5);
    assert_eq!(parts[3].len(), 3);
    assert_eq!(parts[4].len(), 10);
  }

  #[test]
  fn chain_ids_are_distinct() {
    assert_ne!(generate_chain_id(), generate_chain_id());
  }
}
