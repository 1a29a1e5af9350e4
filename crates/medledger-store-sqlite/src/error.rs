//! Error type for `medledger-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] medledger_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  #[error("column decode error: {0}")]
  Decode(String),

  #[error("medical record not found: {0}")]
  RecordNotFound(uuid::Uuid),

  #[error("ledger entry not found: {0}")]
  LedgerEntryNotFound(uuid::Uuid),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
