//! Pending queue operations.
//!
//! Every local mutation produces (or coalesces into) exactly one live queue
//! entry per record key. Entries are drained in `(priority, enqueued_at)`
//! order once the device is online.

use crate::{Payload, RecordKey};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Default priority for generic data operations. Lower is more urgent.
pub const PRIORITY_DATA: i32 = 10;

/// Default priority for file uploads — drained ahead of data operations.
pub const PRIORITY_UPLOAD: i32 = 5;

/// Priority for conflict-resolution resubmissions, so they are not starved.
pub const PRIORITY_RESOLUTION: i32 = 1;

/// Unique identifier for a queue entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntryId(Uuid);

impl EntryId {
    /// Creates a new entry ID with the current timestamp (UUID v7).
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Creates an entry ID from an existing UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl Default for EntryId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for EntryId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// The kind of remote operation a queue entry performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    /// First write of an entity the server has never seen.
    Create,
    /// Subsequent write of a known entity.
    Update,
    /// Tombstone for an entity the server must forget.
    Delete,
    /// File attachment upload.
    Upload,
}

impl Operation {
    /// Coalesces a new operation into an existing live entry's operation.
    ///
    /// Delete always wins. Create absorbs Update: the server never saw the
    /// record, so whatever the payload now is, the operation is still its
    /// first write.
    #[must_use]
    pub fn coalesce(self, incoming: Self) -> Self {
        match (self, incoming) {
            (Self::Delete, _) | (_, Self::Delete) => Self::Delete,
            (Self::Create, _) | (_, Self::Create) => Self::Create,
            (Self::Upload, _) | (_, Self::Upload) => Self::Upload,
            (Self::Update, Self::Update) => Self::Update,
        }
    }

    /// Stable string form used in persisted rows.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::Upload => "upload",
        }
    }

    /// Parses the persisted string form.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "create" => Some(Self::Create),
            "update" => Some(Self::Update),
            "delete" => Some(Self::Delete),
            "upload" => Some(Self::Upload),
            _ => None,
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A pending network operation derived from a local mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueEntry {
    /// Unique identifier for this entry.
    pub id: EntryId,

    /// The operation to perform against the remote.
    pub operation: Operation,

    /// The record this entry applies to.
    pub key: RecordKey,

    /// Payload to submit. `None` for tombstones.
    pub payload: Option<Payload>,

    /// Base version for tombstones, captured when the record was deleted
    /// locally (the live record no longer exists to read it from).
    pub base_version: Option<u64>,

    /// Drain priority; lower is more urgent.
    pub priority: i32,

    /// When the entry was first enqueued. Coalescing keeps the original.
    pub enqueued_at: DateTime<Utc>,

    /// Number of transient failures so far.
    pub attempts: u32,

    /// Earliest time this entry is eligible for the next drain.
    pub next_attempt_at: DateTime<Utc>,

    /// Message of the most recent failure, for diagnostics.
    pub last_error: Option<String>,
}
