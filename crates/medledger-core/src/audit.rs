//! Audit log entries — append-only who-did-what-when records.
//!
//! Audit entries are written alongside, never inside, the mutating
//! transaction they describe. They are never updated or deleted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::access::Role;

/// One action record. `details` is an open key-value map.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
  pub id:                 Uuid,
  pub action:             String,
  pub actor_id:           Uuid,
  pub actor_role:         Role,
  pub subject_patient_id: Option<Uuid>,
  pub related_record_id:  Option<Uuid>,
  pub details:            serde_json::Value,
  pub source_address:     String,
  pub timestamp:          DateTime<Utc>,
}

/// Input to [`crate::store::SecurityStore::record_audit`].
/// The id and timestamp are assigned by the store.
#[derive(Debug, Clone)]
pub struct NewAudit {
  pub action:             String,
  pub actor_id:           Uuid,
  pub actor_role:         Role,
  pub subject_patient_id: Option<Uuid>,
  pub related_record_id:  Option<Uuid>,
  pub details:            serde_json::Value,
  pub source_address:     String,
}

impl NewAudit {
  pub fn new(
    action: impl Into<String>,
    actor_id: Uuid,
    actor_role: Role,
    source_address: impl Into<String>,
  ) -> Self {
    Self {
      action: action.into(),
      actor_id,
      actor_role,
      subject_patient_id: None,
      related_record_id: None,
      details: serde_json::Value::Object(serde_json::Map::new()),
      source_address: source_address.into(),
    }
  }

  pub fn patient(mut self, patient_id: Uuid) -> Self {
    self.subject_patient_id = Some(patient_id);
    self
  }

  pub fn record(mut self, record_id: Uuid) -> Self {
    self.related_record_id = Some(record_id);
    self
  }

  pub fn details(mut self, details: serde_json::Value) -> Self {
    self.details = details;
    self
  }
}
