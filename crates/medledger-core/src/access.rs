//! Role and scope checks mapping an authenticated identity to permitted
//! operations.
//!
//! `Role` is a closed enum: "any staff" is an explicit set-membership check,
//! never a string-pattern match on the role name.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoEnumIterator as _};
use uuid::Uuid;

use crate::grant::AccessGrant;

// ─── Role ────────────────────────────────────────────────────────────────────

/// The role claim carried by every identity and access grant.
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
  EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Role {
  Patient,
  HospitalStaff,
  InsuranceStaff,
}

impl Role {
  /// Membership in the closed staff set.
  pub fn is_staff(self) -> bool {
    matches!(self, Role::HospitalStaff | Role::InsuranceStaff)
  }

  /// All staff role variants, enumerated explicitly.
  pub fn staff_roles() -> impl Iterator<Item = Role> {
    Role::iter().filter(|r| r.is_staff())
  }
}

// ─── Identity ────────────────────────────────────────────────────────────────

/// The decoded claims of an authenticated caller.
///
/// For a patient, `subject_patient_id` is their own patient id. For staff,
/// `scope_patient_id` is the single patient a consent-derived grant opened —
/// absent for login-only grants.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Identity {
  pub id:                 Uuid,
  pub role:               Role,
  pub subject_patient_id: Option<Uuid>,
  pub scope_patient_id:   Option<Uuid>,
}

impl Identity {
  /// Derive the caller identity from a verified, unexpired grant.
  pub fn from_grant(grant: &AccessGrant) -> Self {
    match grant.role {
      Role::Patient => Identity {
        id:                 grant.subject_identity,
        role:               grant.role,
        subject_patient_id: grant.scope_patient_id,
        scope_patient_id:   None,
      },
      Role::HospitalStaff | Role::InsuranceStaff => Identity {
        id:                 grant.subject_identity,
        role:               grant.role,
        subject_patient_id: None,
        scope_patient_id:   grant.scope_patient_id,
      },
    }
  }
}

// ─── Checks ──────────────────────────────────────────────────────────────────

/// Strict role equality.
pub fn authorize(identity: &Identity, required: Role) -> bool {
  identity.role == required
}

/// True for any member of the staff set.
pub fn authorize_any_staff(identity: &Identity) -> bool {
  Role::staff_roles().any(|r| identity.role == r)
}

/// Scoped access to a single patient's records.
///
/// A patient may only reach their own records; staff may only reach the
/// patient a consent grant was issued for. Grant expiry is enforced at token
/// verification, before an [`Identity`] exists.
pub fn authorize_scoped(identity: &Identity, patient_id: Uuid) -> bool {
  match identity.role {
    Role::Patient => identity.subject_patient_id == Some(patient_id),
    Role::HospitalStaff | Role::InsuranceStaff => {
      identity.scope_patient_id == Some(patient_id)
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn staff(scope: Option<Uuid>) -> Identity {
    Identity {
      id:                 Uuid::new_v4(),
      role:               Role::HospitalStaff,
      subject_patient_id: None,
      scope_patient_id:   scope,
    }
  }

  fn patient(own_id: Uuid) -> Identity {
    Identity {
      id:                 Uuid::new_v4(),
      role:               Role::Patient,
      subject_patient_id: Some(own_id),
      scope_patient_id:   None,
    }
  }

  #[test]
  fn authorize_is_strict_equality() {
    let id = staff(None);
    assert!(authorize(&id, Role::HospitalStaff));
    assert!(!authorize(&id, Role::InsuranceStaff));
    assert!(!authorize(&id, Role::Patient));
  }

  #[test]
  fn staff_set_is_exactly_the_two_staff_roles() {
    let roles: Vec<Role> = Role::staff_roles().collect();
    assert_eq!(roles, vec![Role::HospitalStaff, Role::InsuranceStaff]);

    let mut insurance = staff(None);
    insurance.role = Role::InsuranceStaff;
    assert!(authorize_any_staff(&staff(None)));
    assert!(authorize_any_staff(&insurance));
    assert!(!authorize_any_staff(&patient(Uuid::new_v4())));
  }

  #[test]
  fn scoped_access_requires_matching_scope() {
    let pid = Uuid::new_v4();
    assert!(authorize_scoped(&staff(Some(pid)), pid));
    assert!(!authorize_scoped(&staff(Some(Uuid::new_v4())), pid));
    assert!(!authorize_scoped(&staff(None), pid));
  }

  #[test]
  fn patient_scoped_access_is_own_records_only() {
    let pid = Uuid::new_v4();
    assert!(authorize_scoped(&patient(pid), pid));
    assert!(!authorize_scoped(&patient(pid), Uuid::new_v4()));
  }
}
