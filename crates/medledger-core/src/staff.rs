//! Staff registry types for the phone-and-OTP login flow.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::access::Role;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StaffMember {
  pub id:         Uuid,
  pub name:       String,
  pub phone:      String,
  /// Always a staff variant; patient identities never appear here.
  pub role:       Role,
  pub active:     bool,
  pub created_at: DateTime<Utc>,
}

/// Input to [`crate::store::SecurityStore::add_staff`].
#[derive(Debug, Clone, Deserialize)]
pub struct NewStaffMember {
  pub name:  String,
  pub phone: String,
  pub role:  Role,
}
