//! Error types for `medledger-core`.
//!
//! Lookup failures are expressed as `Option` returns on the store trait, and
//! storage backends carry their own error enums; what remains here is what
//! this crate itself can fail at — grant verification and canonical
//! serialisation.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("grant token is malformed")]
  GrantMalformed,

  #[error("grant token signature does not verify")]
  GrantSignatureMismatch,

  #[error("grant token has expired")]
  GrantExpired,

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
