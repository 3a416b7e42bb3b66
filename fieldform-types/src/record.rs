//! The versioned local record.

use crate::{Payload, RecordKey};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single versioned local copy of one entity.
///
/// The record store owns the canonical row; callers always receive clones.
/// `local_version` starts at 1, increments on every local mutation and never
/// decreases — it is the base version the sync engine submits against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Identity of the record.
    pub key: RecordKey,

    /// The record's content.
    pub payload: Payload,

    /// Monotonic local mutation counter, starting at 1.
    pub local_version: u64,

    /// Whether the server has acknowledged this version.
    pub synced: bool,

    /// The server's version at the last acknowledgment, if any.
    pub server_version: Option<u64>,

    /// When the record was last mutated locally.
    pub updated_at: DateTime<Utc>,
}

impl Record {
    /// Whether this record still has local changes the server has not seen.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        !self.synced
    }

    /// Whether the server has ever acknowledged any version of this record.
    /// Deleting such a record requires a tombstone so the server is told.
    #[must_use]
    pub fn reached_server(&self) -> bool {
        self.synced || self.server_version.is_some()
    }
}
