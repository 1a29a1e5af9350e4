//! JSON REST API for medledger.
//!
//! Exposes an axum [`Router`] backed by any
//! [`medledger_core::store::SecurityStore`]. Callers authenticate with
//! bearer grant tokens; staff obtain them through the phone-and-OTP login
//! flow, consent-scoped tokens come out of the consent gate, and patient
//! tokens are minted by the external identity provider sharing the grant
//! secret.

pub mod auth;
pub mod consent;
pub mod error;
pub mod ledger;
pub mod login;
pub mod patients;
pub mod records;

use std::{path::PathBuf, sync::Arc};

use axum::{
  Router,
  http::HeaderMap,
  routing::{get, post, put},
};
use chrono::Duration;
use medledger_core::{consent::ConsentGate, grant::GrantSigner, store::SecurityStore};
use serde::Deserialize;
use tower_http::trace::TraceLayer;

pub use error::ApiError;

/// Hard cap on audit entries returned per request.
pub const AUDIT_LIST_CAP: usize = 50;

/// Lifetime of a consent-scoped staff grant.
pub fn consent_grant_ttl() -> Duration { Duration::hours(1) }

/// Lifetime of a login grant.
pub fn login_grant_ttl() -> Duration { Duration::hours(8) }

// ─── Configuration ───────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml` with
/// `MEDLEDGER_*` environment overrides.
#[derive(Deserialize, Clone)]
pub struct ServerConfig {
  pub host:         String,
  pub port:         u16,
  pub store_path:   PathBuf,
  /// Secret used to tag grant tokens. Shared with the identity provider
  /// that mints patient tokens.
  pub grant_secret: String,
}

// ─── Application state ───────────────────────────────────────────────────────

/// Shared state threaded through all axum handlers.
#[derive(Clone)]
pub struct AppState<S: SecurityStore + Clone> {
  pub store:  S,
  pub signer: GrantSigner,
  pub gate:   ConsentGate<S>,
  pub config: Arc<ServerConfig>,
}

impl<S: SecurityStore + Clone> AppState<S> {
  pub fn new(store: S, config: ServerConfig) -> Self {
    let signer = GrantSigner::new(config.grant_secret.clone());
    let gate =
      ConsentGate::new(store.clone(), signer.clone(), consent_grant_ttl());
    Self { store, signer, gate, config: Arc::new(config) }
  }
}

// ─── Router ──────────────────────────────────────────────────────────────────

/// Build the full API router for `state`.
pub fn router<S>(state: AppState<S>) -> Router
where
  S: SecurityStore + Clone + 'static,
{
  Router::new()
    // Staff login
    .route("/api/auth/staff-login", post(login::staff_login::<S>))
    .route("/api/auth/verify-login", post(login::verify_login::<S>))
    // Consent gate
    .route("/api/consent/request", post(consent::request::<S>))
    .route("/api/consent/confirm", post(consent::confirm::<S>))
    .route("/api/consent/{id}", get(consent::status::<S>))
    // Patients
    .route("/api/patients", post(patients::create::<S>))
    .route("/api/patients/search", post(patients::search::<S>))
    .route("/api/patients/{id}/records", get(patients::records::<S>))
    .route("/api/patients/{id}/ledger", get(patients::ledger::<S>))
    .route("/api/patients/{id}/audit", get(patients::audit::<S>))
    .route("/api/patients/{id}/insurance", get(patients::insurance::<S>))
    // Medical records
    .route("/api/records", post(records::create::<S>))
    .route("/api/records/{id}", put(records::update::<S>))
    // Ledger verification
    .route("/api/ledger/verify", get(ledger::verify_all::<S>))
    .route("/api/ledger/{id}/verify", post(ledger::verify_entry::<S>))
    .layer(TraceLayer::new_for_http())
    .with_state(state)
}

// ─── Request metadata ────────────────────────────────────────────────────────

/// Best-effort caller address for audit entries: first `X-Forwarded-For`
/// hop, else `"unknown"`. The server does not terminate TLS itself, so the
/// socket address is always the proxy's.
pub fn source_address(headers: &HeaderMap) -> String {
  headers
    .get("x-forwarded-for")
    .and_then(|v| v.to_str().ok())
    .and_then(|v| v.split(',').next())
    .map(|s| s.trim().to_string())
    .filter(|s| !s.is_empty())
    .unwrap_or_else(|| "unknown".to_string())
}
