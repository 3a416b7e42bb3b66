//! Conflict resolution.

use crate::conflict::ConflictSet;
use crate::error::SyncResult;
use fieldform_queue::SyncQueue;
use fieldform_store::RecordStore;
use fieldform_types::{
    diff_payloads, ConflictId, FieldDiff, Operation, Payload, Record, PRIORITY_DATA,
    PRIORITY_RESOLUTION,
};
use std::sync::Arc;
use tracing::{info, warn};

/// How to settle a conflict. Resolution is terminal: the conflict leaves
/// the open set whichever strategy wins.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    /// Take the server's payload; local edits are discarded.
    ServerWins,
    /// Resubmit the local payload against the server's current version.
    ClientWins,
    /// Write a caller-built payload (typically assembled field-by-field in
    /// the conflict UI) as a fresh local mutation.
    Merge(Payload),
}

/// Applies resolution strategies to open conflicts.
pub struct ConflictResolver {
    store: Arc<RecordStore>,
    queue: Arc<SyncQueue>,
    conflicts: Arc<ConflictSet>,
}

impl ConflictResolver {
    /// Creates a resolver over the engine's conflict set.
    pub fn new(store: Arc<RecordStore>, queue: Arc<SyncQueue>, conflicts: Arc<ConflictSet>) -> Self {
        Self {
            store,
            queue,
            conflicts,
        }
    }

    /// Field-level diff of an open conflict, for the resolution UI.
    /// `None` when the conflict is no longer open.
    pub async fn diff(&self, id: ConflictId) -> Option<Vec<FieldDiff>> {
        let conflict = self.conflicts.get(id).await?;
        Some(diff_payloads(&conflict.local_payload, &conflict.server_payload))
    }

    /// Resolves a conflict with the given strategy.
    ///
    /// Returns the resulting record; `None` when the conflict was already
    /// resolved (resolution is idempotent — the second call is a no-op) or
    /// when the resolution re-enqueued a deletion, which leaves no record.
    pub async fn resolve(
        &self,
        id: ConflictId,
        resolution: Resolution,
    ) -> SyncResult<Option<Record>> {
        let Some(conflict) = self.conflicts.remove(id).await else {
            return Ok(None);
        };

        match resolution {
            Resolution::ServerWins => {
                // The server payload becomes the local truth at the server's
                // version; nothing further to sync.
                let record = self.store.apply_server(
                    &conflict.key,
                    conflict.server_payload,
                    conflict.server_version,
                )?;
                info!(key = %conflict.key, version = conflict.server_version, "conflict resolved: server wins");
                Ok(Some(record))
            }
            Resolution::ClientWins => {
                if conflict.operation == Operation::Delete {
                    // The local intent was deletion; resubmit the tombstone
                    // against the version the server just reported.
                    self.queue.enqueue(
                        Operation::Delete,
                        &conflict.key,
                        None,
                        Some(conflict.server_version),
                        PRIORITY_RESOLUTION,
                    )?;
                    info!(key = %conflict.key, "conflict resolved: client wins, delete requeued");
                    return Ok(None);
                }

                // Lift the base to the server's current version so the same
                // stale-base conflict cannot recur, then resubmit the local
                // payload ahead of ordinary traffic.
                let record = self.store.rebase(&conflict.key, conflict.server_version)?;
                let op = match conflict.operation {
                    Operation::Upload => Operation::Upload,
                    // The conflict proves the server knows this record.
                    _ => Operation::Update,
                };
                self.queue.enqueue(
                    op,
                    &conflict.key,
                    Some(conflict.local_payload),
                    None,
                    PRIORITY_RESOLUTION,
                )?;
                info!(key = %conflict.key, base = record.local_version, "conflict resolved: client wins, resubmitted");
                Ok(Some(record))
            }
            Resolution::Merge(merged) => {
                // A merge is an ordinary local mutation: version increments,
                // quota applies, and it queues like any other write.
                let record = self.store.put(&conflict.key, merged.clone())?;
                self.queue.enqueue(
                    Operation::Update,
                    &conflict.key,
                    Some(merged),
                    None,
                    PRIORITY_DATA,
                )?;
                info!(key = %conflict.key, version = record.local_version, "conflict resolved: merged");
                Ok(Some(record))
            }
        }
    }

    /// Resolves every open conflict with one strategy. Used by "accept all
    /// server changes" style bulk actions; merge needs per-conflict input
    /// and is rejected here.
    pub async fn resolve_all(&self, resolution: Resolution) -> SyncResult<usize> {
        if matches!(resolution, Resolution::Merge(_)) {
            warn!("bulk resolution cannot merge; ignoring request");
            return Ok(0);
        }
        let open = self.conflicts.list().await;
        let resolved = open.len();
        for conflict in open {
            self.resolve(conflict.id, resolution.clone()).await?;
        }
        Ok(resolved)
    }
}
