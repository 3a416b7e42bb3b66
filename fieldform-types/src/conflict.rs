//! Conflict records.

use crate::{Operation, Payload, RecordKey};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Unique identifier for a detected conflict. UUID v7, so ids order by
/// detection time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConflictId(Uuid);

impl ConflictId {
    /// Creates a new conflict ID with the current timestamp (UUID v7).
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Creates a conflict ID from an existing UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl Default for ConflictId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConflictId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ConflictId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// A detected divergence between the local and server copies of a record.
///
/// Created when a submission's base version does not match the server's
/// current version. Lives in the open set until explicitly resolved; the
/// stale local payload is never retried automatically.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConflictRecord {
    /// Unique identifier for this conflict.
    pub id: ConflictId,

    /// The record both sides disagree about.
    pub key: RecordKey,

    /// The operation whose submission surfaced the conflict. Resolution
    /// uses it to re-enqueue the right kind of write.
    pub operation: Operation,

    /// The local payload that was submitted. Empty for tombstones.
    pub local_payload: Payload,

    /// The server's current payload.
    pub server_payload: Payload,

    /// The base version the submission assumed.
    pub local_version: u64,

    /// The server's current version.
    pub server_version: u64,

    /// When the conflict was detected.
    pub detected_at: DateTime<Utc>,
}

impl ConflictRecord {
    /// Creates a conflict record detected now.
    #[must_use]
    pub fn new(
        key: RecordKey,
        operation: Operation,
        local_payload: Payload,
        server_payload: Payload,
        local_version: u64,
        server_version: u64,
    ) -> Self {
        Self {
            id: ConflictId::new(),
            key,
            operation,
            local_payload,
            server_payload,
            local_version,
            server_version,
            detected_at: Utc::now(),
        }
    }
}
