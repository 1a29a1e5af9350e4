//! SQLite backend for the medledger security store.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated
//! thread without blocking the async runtime. Because every store call is
//! one closure executed sequentially on that thread, ledger appends are
//! serialized by construction: the read of the chain tip and the insert of
//! the new entry happen in the same closure, inside one transaction.

mod encode;
mod schema;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::SqliteStore;

#[cfg(test)]
mod tests;
