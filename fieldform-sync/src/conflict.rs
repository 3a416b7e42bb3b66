//! The open conflict set.

use fieldform_types::{ConflictId, ConflictRecord, RecordKey};
use std::collections::{BTreeMap, HashSet};
use tokio::sync::RwLock;

/// Conflicts awaiting an explicit resolution.
///
/// Keyed by `ConflictId` (UUID v7), so iteration order is detection order.
/// Held in memory: the persisted layout carries records, index and queue —
/// an unresolved conflict lost to a crash re-materializes on the next
/// drain, because the stale base version is still in the record store.
#[derive(Default)]
pub struct ConflictSet {
    inner: RwLock<BTreeMap<ConflictId, ConflictRecord>>,
}

impl ConflictSet {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a conflict and returns its id.
    pub async fn insert(&self, conflict: ConflictRecord) -> ConflictId {
        let id = conflict.id;
        self.inner.write().await.insert(id, conflict);
        id
    }

    /// Fetches a conflict by id.
    pub async fn get(&self, id: ConflictId) -> Option<ConflictRecord> {
        self.inner.read().await.get(&id).cloned()
    }

    /// Removes a conflict, returning it if it was still open.
    pub async fn remove(&self, id: ConflictId) -> Option<ConflictRecord> {
        self.inner.write().await.remove(&id)
    }

    /// All open conflicts, oldest first.
    pub async fn list(&self) -> Vec<ConflictRecord> {
        self.inner.read().await.values().cloned().collect()
    }

    /// Record keys with an open conflict.
    pub async fn open_keys(&self) -> HashSet<RecordKey> {
        self.inner
            .read()
            .await
            .values()
            .map(|c| c.key.clone())
            .collect()
    }

    /// Number of open conflicts.
    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    /// Whether the set is empty.
    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }
}
