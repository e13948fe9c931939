//! Domain types for the field-registration queue.
//!
//! All types are serializable/deserializable via serde + serde_json.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Schema version written into the queue file.
pub const QUEUE_FILE_VERSION: u32 = 1;

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// Client-generated identifier for a queued registration.
///
/// Doubles as the idempotency key presented to the remote authority, so it
/// must be unique across every record ever created on a device. A UUID v4
/// gives that without any on-device counter that a restart could reset.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecordId(pub String);

impl RecordId {
    /// Generate a fresh random identifier.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Short prefix for compact display: at most eight bytes, trimmed back
    /// to a char boundary so hand-edited ids with multibyte text cannot
    /// panic the renderer.
    pub fn short(&self) -> &str {
        let mut end = self.0.len().min(8);
        while !self.0.is_char_boundary(end) {
            end -= 1;
        }
        &self.0[..end]
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for RecordId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for RecordId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

// ---------------------------------------------------------------------------
// Domain structs
// ---------------------------------------------------------------------------

/// Beneficiary details captured by a field agent. Immutable after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Beneficiary {
    pub name: String,
    pub phone: String,
    pub village: String,
    pub role: String,
}

/// One unit of work in the registration queue.
///
/// `synced` is monotonic: false at creation, flipped to true exactly once
/// after the remote authority confirms acceptance, never reverted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingRegistration {
    pub id: RecordId,
    pub beneficiary: Beneficiary,
    /// Operator attribution from the local session; display only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registered_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub synced: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub synced_at: Option<DateTime<Utc>>,
}

impl PendingRegistration {
    /// Build a new unsynced record with a fresh id and creation timestamp.
    pub fn new(beneficiary: Beneficiary, registered_by: Option<String>) -> Self {
        Self {
            id: RecordId::generate(),
            beneficiary,
            registered_by,
            created_at: Utc::now(),
            synced: false,
            synced_at: None,
        }
    }
}

/// On-disk queue payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueFile {
    pub version: u32,
    #[serde(default)]
    pub records: Vec<PendingRegistration>,
}

impl Default for QueueFile {
    fn default() -> Self {
        Self {
            version: QUEUE_FILE_VERSION,
            records: Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
