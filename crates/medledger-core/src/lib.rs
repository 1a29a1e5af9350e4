//! Core types and trait definitions for the medledger records service.
//!
//! This crate is deliberately free of HTTP and database dependencies.
//! All other crates depend on it; it depends on nothing proprietary.

pub mod access;
pub mod audit;
pub mod consent;
pub mod error;
pub mod grant;
pub mod insurance;
pub mod ledger;
pub mod otp;
pub mod patient;
pub mod record;
pub mod staff;
pub mod store;

pub use error::{Error, Result};
