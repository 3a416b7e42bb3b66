//! The offline service facade.

use crate::config::ServiceConfig;
use crate::error::{ServiceError, ServiceResult};
use chrono::{DateTime, Utc};
use fieldform_queue::SyncQueue;
use fieldform_store::{
    Compressor, DeflateCompressor, NoopCompressor, RecordStore, StorageManager,
};
use fieldform_sync::{
    ConflictResolver, ConnectionState, NetworkMonitor, RemoteApi, Resolution, SyncEngine,
    SyncRunStatus,
};
use fieldform_types::{
    ConflictId, ConflictRecord, EntityKind, FieldDiff, Operation, Payload, QueueEntry, Record,
    RecordKey, SchemaRegistry, PRIORITY_DATA, PRIORITY_UPLOAD,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Version tag on exported backup documents.
const BACKUP_FORMAT_VERSION: u32 = 1;

/// Aggregate status for the UI's sync indicator — one call, no polling of
/// internals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StorageStats {
    pub total_items: usize,
    pub synced_items: usize,
    pub pending_items: usize,
    pub queued_operations: usize,
    pub open_conflicts: usize,
    pub failed_operations: usize,
    pub storage_used_bytes: u64,
    pub is_online: bool,
    pub degraded: bool,
}

/// Serialized backup: all records plus the queue snapshot.
#[derive(Debug, Serialize, Deserialize)]
pub struct BackupDocument {
    pub format_version: u32,
    pub exported_at: DateTime<Utc>,
    pub records: Vec<Record>,
    pub queue: Vec<QueueEntry>,
}

/// What an import restored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImportReport {
    pub records: usize,
    pub queue_entries: usize,
}

/// The offline-first data layer, assembled.
///
/// Owns the record store, the sync queue, the connectivity monitor, the
/// sync engine and the conflict resolver. Construct one per app lifetime
/// and share it by reference.
pub struct OfflineService {
    config: ServiceConfig,
    records: Arc<RecordStore>,
    queue: Arc<SyncQueue>,
    monitor: NetworkMonitor,
    engine: Arc<SyncEngine>,
    resolver: ConflictResolver,
}

impl OfflineService {
    /// Opens the service with durable storage under `config.data_dir`.
    ///
    /// The device starts `Offline`; the platform connectivity callback
    /// corrects that through `report_connectivity`.
    pub fn open(
        config: ServiceConfig,
        remote: Arc<dyn RemoteApi>,
        schemas: SchemaRegistry,
    ) -> ServiceResult<Self> {
        std::fs::create_dir_all(&config.data_dir)?;
        let store = Arc::new(RecordStore::open(
            &config.data_dir.join("records.db"),
            Self::storage_manager(&config),
            schemas,
        )?);
        let queue = Arc::new(SyncQueue::open(&config.data_dir.join("queue.db"))?);
        Ok(Self::assemble(config, store, queue, remote))
    }

    /// Opens the service entirely in memory (for testing).
    pub fn open_in_memory(
        config: ServiceConfig,
        remote: Arc<dyn RemoteApi>,
        schemas: SchemaRegistry,
    ) -> ServiceResult<Self> {
        let store = Arc::new(RecordStore::open_in_memory(
            Self::storage_manager(&config),
            schemas,
        )?);
        let queue = Arc::new(SyncQueue::open_in_memory()?);
        Ok(Self::assemble(config, store, queue, remote))
    }

    fn storage_manager(config: &ServiceConfig) -> StorageManager {
        let compressor: Arc<dyn Compressor> = if config.compression {
            Arc::new(DeflateCompressor::new())
        } else {
            Arc::new(NoopCompressor)
        };
        StorageManager::new(config.quota.clone(), compressor)
    }

    fn assemble(
        config: ServiceConfig,
        store: Arc<RecordStore>,
        queue: Arc<SyncQueue>,
        remote: Arc<dyn RemoteApi>,
    ) -> Self {
        let monitor = NetworkMonitor::new(ConnectionState::Offline);
        let engine = Arc::new(SyncEngine::new(
            store.clone(),
            queue.clone(),
            remote,
            monitor.clone(),
            config.sync.clone(),
        ));
        let resolver =
            ConflictResolver::new(store.clone(), queue.clone(), engine.conflicts().clone());
        info!(data_dir = %config.data_dir.display(), "offline service ready");
        Self {
            config,
            records: store,
            queue,
            monitor,
            engine,
            resolver,
        }
    }

    // ── Local data API ───────────────────────────────────────────

    /// Writes a record and queues it for sync. Creates or overwrites.
    pub fn store(
        &self,
        kind: impl Into<EntityKind>,
        id: impl Into<String>,
        payload: Payload,
    ) -> ServiceResult<Record> {
        let key = RecordKey::new(kind, id);
        let existed = self.records.get(&key)?.is_some();
        let record = self.records.put(&key, payload.clone())?;
        let operation = if existed {
            Operation::Update
        } else {
            Operation::Create
        };
        self.queue
            .enqueue(operation, &key, Some(payload), None, PRIORITY_DATA)?;
        Ok(record)
    }

    /// Writes an existing record; fails with `NotFound` if it never existed.
    pub fn update(
        &self,
        kind: impl Into<EntityKind>,
        id: impl Into<String>,
        payload: Payload,
    ) -> ServiceResult<Record> {
        let key = RecordKey::new(kind, id);
        if self.records.get(&key)?.is_none() {
            return Err(ServiceError::NotFound(key.to_string()));
        }
        let record = self.records.put(&key, payload.clone())?;
        self.queue
            .enqueue(Operation::Update, &key, Some(payload), None, PRIORITY_DATA)?;
        Ok(record)
    }

    /// Reads a record.
    pub fn get(
        &self,
        kind: impl Into<EntityKind>,
        id: impl Into<String>,
    ) -> ServiceResult<Option<Record>> {
        Ok(self.records.get(&RecordKey::new(kind, id))?)
    }

    /// All records of a kind, oldest first.
    pub fn scan(&self, kind: impl Into<EntityKind>) -> ServiceResult<Vec<Record>> {
        Ok(self.records.scan_by_kind(&kind.into())?)
    }

    /// Deletes a record. Returns whether it existed.
    ///
    /// A record the server never saw is simply dropped, along with its
    /// pending queue entry. A previously synced record leaves a tombstone
    /// in the queue so the server is told.
    pub fn delete(
        &self,
        kind: impl Into<EntityKind>,
        id: impl Into<String>,
    ) -> ServiceResult<bool> {
        let key = RecordKey::new(kind, id);
        let Some(record) = self.records.delete(&key)? else {
            return Ok(false);
        };

        if record.reached_server() {
            self.queue.enqueue(
                Operation::Delete,
                &key,
                None,
                Some(record.local_version),
                PRIORITY_DATA,
            )?;
        } else {
            self.queue.remove_for_key(&key)?;
            debug!(key = %key, "unsynced record dropped without tombstone");
        }
        Ok(true)
    }

    /// Stores a file attachment and queues its upload ahead of ordinary
    /// data operations.
    pub fn store_file(
        &self,
        kind: impl Into<EntityKind>,
        id: impl Into<String>,
        bytes: &[u8],
        content_type: impl Into<String>,
    ) -> ServiceResult<Record> {
        let key = RecordKey::new(kind, id);
        let payload = Payload::blob(bytes, content_type);
        let record = self.records.put(&key, payload.clone())?;
        self.queue
            .enqueue(Operation::Upload, &key, Some(payload), None, PRIORITY_UPLOAD)?;
        Ok(record)
    }

    // ── Sync control ─────────────────────────────────────────────

    /// Feeds the platform connectivity signal.
    pub fn report_connectivity(&self, state: ConnectionState) -> bool {
        self.monitor.report(state)
    }

    /// Starts a queue drain. A no-op returning `AlreadyRunning` while one
    /// is active, and `Offline` when there is no connection.
    pub async fn start_sync(&self) -> ServiceResult<SyncRunStatus> {
        Ok(self.engine.start().await?)
    }

    /// Requests cancellation of the active drain (takes effect between
    /// batches).
    pub fn cancel_sync(&self) {
        self.engine.cancel();
    }

    /// Re-enqueues permanently failed operations and drains again.
    pub async fn retry_failed_sync(&self) -> ServiceResult<SyncRunStatus> {
        let requeued = self.engine.retry_failed().await?;
        if requeued > 0 {
            info!(requeued, "retrying failed operations");
        }
        self.start_sync().await
    }

    /// Drops every pending queue entry. Local records are untouched.
    pub fn clear_sync_queue(&self) -> ServiceResult<usize> {
        Ok(self.queue.clear()?)
    }

    // ── Conflicts ────────────────────────────────────────────────

    /// Open conflicts, oldest first.
    pub async fn get_conflicts(&self) -> Vec<ConflictRecord> {
        self.engine.conflicts().list().await
    }

    /// Field-level diff for one open conflict.
    pub async fn conflict_diff(&self, id: ConflictId) -> Option<Vec<FieldDiff>> {
        self.resolver.diff(id).await
    }

    /// Resolves a conflict. Idempotent: resolving an already-resolved id
    /// returns `None` and changes nothing.
    pub async fn resolve_conflict(
        &self,
        id: ConflictId,
        resolution: Resolution,
    ) -> ServiceResult<Option<Record>> {
        Ok(self.resolver.resolve(id, resolution).await?)
    }

    // ── Stats ────────────────────────────────────────────────────

    /// Aggregate storage and sync status.
    pub async fn storage_stats(&self) -> ServiceResult<StorageStats> {
        let counts = self.records.counts()?;
        Ok(StorageStats {
            total_items: counts.total,
            synced_items: counts.synced,
            pending_items: counts.pending,
            queued_operations: self.queue.pending_count()?,
            open_conflicts: self.engine.conflicts().len().await,
            failed_operations: self.engine.failed_operations().await.len(),
            storage_used_bytes: self.records.used_bytes()?,
            is_online: self.monitor.is_online(),
            degraded: self.engine.is_degraded()?,
        })
    }

    // ── Backup ───────────────────────────────────────────────────

    /// Exports every record and the queue snapshot as a JSON document.
    pub fn export_data(&self) -> ServiceResult<String> {
        let document = BackupDocument {
            format_version: BACKUP_FORMAT_VERSION,
            exported_at: Utc::now(),
            records: self.records.all_records()?,
            queue: self.queue.snapshot()?,
        };
        Ok(serde_json::to_string_pretty(&document)?)
    }

    /// Restores a backup produced by `export_data`. Existing rows for the
    /// same keys are overwritten; versions, sync flags and retry state come
    /// back verbatim.
    pub fn import_data(&self, json: &str) -> ServiceResult<ImportReport> {
        let document: BackupDocument = serde_json::from_str(json)
            .map_err(|e| ServiceError::InvalidBackup(e.to_string()))?;
        if document.format_version != BACKUP_FORMAT_VERSION {
            return Err(ServiceError::InvalidBackup(format!(
                "unsupported format version {}",
                document.format_version
            )));
        }

        for record in &document.records {
            self.records.restore(record)?;
        }
        self.queue.restore(&document.queue)?;

        info!(
            records = document.records.len(),
            queue_entries = document.queue.len(),
            "backup imported"
        );
        Ok(ImportReport {
            records: document.records.len(),
            queue_entries: document.queue.len(),
        })
    }

    // ── Background tasks ─────────────────────────────────────────

    /// Spawns the reconnect listener: every Offline→Online edge triggers a
    /// drain. Abort the handle on shutdown.
    pub fn spawn_auto_sync(self: &Arc<Self>) -> JoinHandle<()> {
        let service = Arc::clone(self);
        let mut listener = self.monitor.subscribe();
        tokio::spawn(async move {
            while listener.reconnected().await.is_ok() {
                match service.engine.start().await {
                    Ok(status) => debug!(?status, "auto sync after reconnect"),
                    Err(e) => warn!("auto sync failed: {e}"),
                }
            }
        })
    }

    /// Spawns scheduled retention cleanup at `config.cleanup_interval`.
    pub fn spawn_maintenance(self: &Arc<Self>) -> JoinHandle<()> {
        let service = Arc::clone(self);
        let period = self.config.cleanup_interval;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick fires immediately; skip it so opening the app
            // does not race a sweep against initial writes.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                match service.records.cleanup(Utc::now()) {
                    Ok(report) if report.removed > 0 => {
                        info!(removed = report.removed, "scheduled cleanup ran");
                    }
                    Ok(_) => {}
                    Err(e) => warn!("scheduled cleanup failed: {e}"),
                }
            }
        })
    }
}
