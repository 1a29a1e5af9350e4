//! Stateless access grants.
//!
//! A grant is a short-lived authorization token: identity, role, optional
//! patient scope, and a validity window. No server-side session exists;
//! validity is decided entirely by the signature tag and the expiry at
//! verification time.
//!
//! Token wire format: `base64url(json claims) "." base64url(sha256 tag)`,
//! where the tag covers the encoded claims and the server secret.

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD as B64;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::{
  Error, Result,
  access::Role,
  otp::constant_time_eq,
};

// ─── Grant ───────────────────────────────────────────────────────────────────

/// The claims carried by a token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessGrant {
  pub subject_identity: Uuid,
  pub role:             Role,
  /// Present only for consent-derived grants (and patient self-grants).
  pub scope_patient_id: Option<Uuid>,
  pub issued_at:        DateTime<Utc>,
  pub expires_at:       DateTime<Utc>,
}

impl AccessGrant {
  pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
    now > self.expires_at
  }
}

// ─── Signer ──────────────────────────────────────────────────────────────────

/// Issues and verifies grant tokens with a single server-held secret.
#[derive(Clone)]
pub struct GrantSigner {
  secret: String,
}

impl GrantSigner {
  pub fn new(secret: impl Into<String>) -> Self {
    Self { secret: secret.into() }
  }

  /// Build a grant valid for `ttl` from `now` and return it with its token.
  pub fn issue(
    &self,
    subject_identity: Uuid,
    role: Role,
    scope_patient_id: Option<Uuid>,
    ttl: Duration,
    now: DateTime<Utc>,
  ) -> Result<(AccessGrant, String)> {
    let grant = AccessGrant {
      subject_identity,
      role,
      scope_patient_id,
      issued_at: now,
      expires_at: now + ttl,
    };
    let token = self.sign(&grant)?;
    Ok((grant, token))
  }

  /// Encode and tag a grant.
  pub fn sign(&self, grant: &AccessGrant) -> Result<String> {
    let claims = B64.encode(serde_json::to_vec(grant)?);
    let tag = self.tag(&claims);
    Ok(format!("{claims}.{tag}"))
  }

  /// Decode a token, check its tag in constant time, then check expiry.
  pub fn verify(
    &self,
    token: &str,
    now: DateTime<Utc>,
  ) -> Result<AccessGrant> {
    let (claims, tag) = token.split_once('.').ok_or(Error::GrantMalformed)?;

    let expected = self.tag(claims);
    if !constant_time_eq(expected.as_bytes(), tag.as_bytes()) {
      return Err(Error::GrantSignatureMismatch);
    }

    let raw = B64.decode(claims).map_err(|_| Error::GrantMalformed)?;
    let grant: AccessGrant =
      serde_json::from_slice(&raw).map_err(|_| Error::GrantMalformed)?;

    if grant.is_expired(now) {
      return Err(Error::GrantExpired);
    }
    Ok(grant)
  }

  fn tag(&self, claims: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(claims.as_bytes());
    hasher.update(b".");
    hasher.update(self.secret.as_bytes());
    B64.encode(hasher.finalize())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn signer() -> GrantSigner { GrantSigner::new("test-secret") }

  #[test]
  fn sign_and_verify_round_trip() {
    let now = Utc::now();
    let pid = Uuid::new_v4();
    let (grant, token) = signer()
      .issue(
        Uuid::new_v4(),
        Role::HospitalStaff,
        Some(pid),
        Duration::hours(1),
        now,
      )
      .unwrap();

    let verified = signer().verify(&token, now).unwrap();
    assert_eq!(verified, grant);
    assert_eq!(verified.scope_patient_id, Some(pid));
  }

  #[test]
  fn expired_token_is_rejected() {
    let now = Utc::now();
    let (_, token) = signer()
      .issue(Uuid::new_v4(), Role::Patient, None, Duration::hours(1), now)
      .unwrap();

    let later = now + Duration::hours(2);
    assert!(matches!(
      signer().verify(&token, later),
      Err(Error::GrantExpired)
    ));
  }

  #[test]
  fn tampered_claims_fail_signature_check() {
    let now = Utc::now();
    let (_, token) = signer()
      .issue(Uuid::new_v4(), Role::Patient, None, Duration::hours(1), now)
      .unwrap();

    let (claims, tag) = token.split_once('.').unwrap();
    let mut forged_claims = claims.to_string();
    forged_claims.push('A');
    let forged = format!("{forged_claims}.{tag}");
    assert!(matches!(
      signer().verify(&forged, now),
      Err(Error::GrantSignatureMismatch)
    ));
  }

  #[test]
  fn wrong_secret_fails_signature_check() {
    let now = Utc::now();
    let (_, token) = signer()
      .issue(Uuid::new_v4(), Role::Patient, None, Duration::hours(1), now)
      .unwrap();

    let other = GrantSigner::new("other-secret");
    assert!(matches!(
      other.verify(&token, now),
      Err(Error::GrantSignatureMismatch)
    ));
  }

  #[test]
  fn token_without_separator_is_malformed() {
    assert!(matches!(
      signer().verify("not-a-token", Utc::now()),
      Err(Error::GrantMalformed)
    ));
  }
}
