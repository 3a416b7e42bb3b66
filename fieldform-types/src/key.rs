//! Record identity: entity kind plus entity id.
//!
//! A record is keyed by `(kind, id)`. The key renders to the stable storage
//! namespace `offline_<kind>_<id>` used by the persisted layout, so keys
//! survive restarts and remain greppable in a device dump.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The kind of entity a record holds ("employee", "form", "document", ...).
///
/// Kinds are app-defined strings; the data layer is generic over them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityKind(String);

impl EntityKind {
    /// Creates an entity kind from a string.
    #[must_use]
    pub fn new(kind: impl Into<String>) -> Self {
        Self(kind.into())
    }

    /// Returns the kind as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EntityKind {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for EntityKind {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Unique identity of a record: entity kind plus entity id.
///
/// At most one record (and at most one live queue entry) exists per key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RecordKey {
    pub kind: EntityKind,
    pub id: String,
}

impl RecordKey {
    /// Creates a record key.
    #[must_use]
    pub fn new(kind: impl Into<EntityKind>, id: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            id: id.into(),
        }
    }

    /// Returns the stable storage namespace key, `offline_<kind>_<id>`.
    #[must_use]
    pub fn storage_key(&self) -> String {
        format!("offline_{}_{}", self.kind, self.id)
    }
}

impl fmt::Display for RecordKey {
    // Display matches the persisted namespace so log lines and DB rows agree.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "offline_{}_{}", self.kind, self.id)
    }
}
