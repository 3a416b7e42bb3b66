//! The sync engine — serialized queue drain against the remote API.

use crate::conflict::ConflictSet;
use crate::error::SyncResult;
use crate::monitor::NetworkMonitor;
use crate::remote::{FileMetadata, RemoteApi, SubmitBody, SubmitOutcome, UploadOutcome};
use chrono::{DateTime, Utc};
use fieldform_queue::{SyncQueue, DEFAULT_ATTEMPTS_CEILING, DEFAULT_BATCH_SIZE};
use fieldform_store::RecordStore;
use fieldform_types::{
    ConflictRecord, Operation, Payload, QueueEntry, RecordKey, PRIORITY_DATA,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

/// Configuration for the sync engine.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Maximum entries drained per batch.
    pub batch_size: usize,
    /// Transient-failure count past which the engine reports degraded sync.
    pub attempts_ceiling: u32,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            attempts_ceiling: DEFAULT_ATTEMPTS_CEILING,
        }
    }
}

/// Counters for one drain run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainReport {
    /// Entries taken off the queue and submitted.
    pub submitted: usize,
    /// Accepted by the server.
    pub accepted: usize,
    /// Version conflicts raised.
    pub conflicted: usize,
    /// Transient failures, backed off for retry.
    pub retried: usize,
    /// Permanent rejections, removed from the queue.
    pub rejected: usize,
}

/// Result of asking the engine to sync.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncRunStatus {
    /// A drain ran to completion (possibly over zero entries).
    Completed(DrainReport),
    /// A drain was already in progress; no second one was started.
    AlreadyRunning,
    /// The device is offline; nothing was drained.
    Offline,
}

/// A permanently rejected operation, kept for the UI and for manual retry.
#[derive(Debug, Clone, PartialEq)]
pub struct FailedOperation {
    pub key: RecordKey,
    pub operation: Operation,
    pub payload: Option<Payload>,
    pub base_version: Option<u64>,
    pub reason: String,
    pub failed_at: DateTime<Utc>,
}

/// How a single entry settled, before queue bookkeeping.
enum EntryOutcome {
    /// Server acknowledged the write.
    Accepted,
    /// The record vanished locally since enqueue; nothing to submit.
    Obsolete,
    /// Version conflict recorded in the open set.
    Conflicted,
    /// Definitive server rejection.
    Rejected(String),
}

/// Drains the sync queue while online.
///
/// Runs are serialized: starting a sync while one is active is a no-op
/// returning `AlreadyRunning`, never a second parallel drain — the same
/// entry must not be submitted twice. Per-entry failures are isolated; one
/// bad record never aborts the batch.
pub struct SyncEngine {
    config: SyncConfig,
    store: Arc<RecordStore>,
    queue: Arc<SyncQueue>,
    remote: Arc<dyn RemoteApi>,
    monitor: NetworkMonitor,
    conflicts: Arc<ConflictSet>,
    failed: Arc<RwLock<Vec<FailedOperation>>>,
    drain_lock: Mutex<()>,
    cancelled: AtomicBool,
    last_report: RwLock<Option<DrainReport>>,
}

impl SyncEngine {
    /// Creates an engine over the given store, queue and remote.
    pub fn new(
        store: Arc<RecordStore>,
        queue: Arc<SyncQueue>,
        remote: Arc<dyn RemoteApi>,
        monitor: NetworkMonitor,
        config: SyncConfig,
    ) -> Self {
        Self {
            config,
            store,
            queue,
            remote,
            monitor,
            conflicts: Arc::new(ConflictSet::new()),
            failed: Arc::new(RwLock::new(Vec::new())),
            drain_lock: Mutex::new(()),
            cancelled: AtomicBool::new(false),
            last_report: RwLock::new(None),
        }
    }

    /// The open conflict set.
    #[must_use]
    pub fn conflicts(&self) -> &Arc<ConflictSet> {
        &self.conflicts
    }

    /// The connectivity monitor this engine watches.
    #[must_use]
    pub fn monitor(&self) -> &NetworkMonitor {
        &self.monitor
    }

    /// The engine configuration.
    #[must_use]
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    // ── Drain loop ───────────────────────────────────────────────

    /// Drains ready queue entries until none remain, the run is cancelled,
    /// or the device goes offline.
    pub async fn start(&self) -> SyncResult<SyncRunStatus> {
        if !self.monitor.is_online() {
            return Ok(SyncRunStatus::Offline);
        }
        let Ok(_guard) = self.drain_lock.try_lock() else {
            debug!("sync requested while a drain is active");
            return Ok(SyncRunStatus::AlreadyRunning);
        };

        self.cancelled.store(false, Ordering::SeqCst);
        let mut report = DrainReport::default();

        loop {
            if self.cancelled.load(Ordering::SeqCst) {
                info!("sync cancelled between batches");
                break;
            }
            if !self.monitor.is_online() {
                info!("device went offline mid-drain");
                break;
            }

            let batch = self.queue.dequeue_ready(self.config.batch_size)?;
            if batch.is_empty() {
                break;
            }

            for entry in batch {
                self.settle_entry(entry, &mut report).await;
            }
        }

        info!(
            submitted = report.submitted,
            accepted = report.accepted,
            conflicted = report.conflicted,
            retried = report.retried,
            rejected = report.rejected,
            "sync drain finished"
        );
        *self.last_report.write().await = Some(report);
        Ok(SyncRunStatus::Completed(report))
    }

    /// Requests cancellation of the active run. Takes effect between
    /// batches; the in-flight remote call always completes so every entry
    /// settles on a definitive answer.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    async fn settle_entry(&self, entry: QueueEntry, report: &mut DrainReport) {
        report.submitted += 1;
        let result = match entry.operation {
            Operation::Upload => self.submit_upload(&entry).await,
            _ => self.submit_record(&entry).await,
        };

        match result {
            Ok(EntryOutcome::Accepted) => {
                self.ack_quietly(&entry);
                report.accepted += 1;
            }
            Ok(EntryOutcome::Obsolete) => {
                debug!(key = %entry.key, "entry obsolete, record gone locally");
                self.ack_quietly(&entry);
            }
            Ok(EntryOutcome::Conflicted) => {
                // Acked, not requeued: the stale payload must not silently
                // overwrite newer server state. Resolution re-enqueues.
                self.ack_quietly(&entry);
                report.conflicted += 1;
            }
            Ok(EntryOutcome::Rejected(reason)) => {
                warn!(key = %entry.key, reason, "operation permanently rejected");
                if let Err(e) = self.queue.fail(entry.id, false, &reason) {
                    warn!(key = %entry.key, "failed to drop rejected entry: {e}");
                }
                self.failed.write().await.push(FailedOperation {
                    key: entry.key,
                    operation: entry.operation,
                    payload: entry.payload,
                    base_version: entry.base_version,
                    reason,
                    failed_at: Utc::now(),
                });
                report.rejected += 1;
            }
            Err(e) => {
                // Transport trouble or a local hiccup: keep the entry and
                // retry with backoff — dropping it would lose field data.
                warn!(key = %entry.key, "submission failed, will retry: {e}");
                if let Err(e) = self.queue.fail(entry.id, true, &e.to_string()) {
                    warn!(key = %entry.key, "failed to reschedule entry: {e}");
                }
                report.retried += 1;
            }
        }
    }

    fn ack_quietly(&self, entry: &QueueEntry) {
        if let Err(e) = self.queue.ack(entry.id) {
            warn!(key = %entry.key, "failed to ack settled entry: {e}");
        }
    }

    // ── Per-operation submission ─────────────────────────────────

    async fn submit_record(&self, entry: &QueueEntry) -> SyncResult<EntryOutcome> {
        let record = self.store.get(&entry.key)?;

        let (body, base) = match entry.operation {
            Operation::Delete => (SubmitBody::Delete, entry.base_version.unwrap_or(0)),
            _ => {
                let Some(record) = record.as_ref() else {
                    return Ok(EntryOutcome::Obsolete);
                };
                // The coalesced entry payload is the freshest write; the
                // record's current local version is the conflict-check base.
                let payload = entry
                    .payload
                    .clone()
                    .unwrap_or_else(|| record.payload.clone());
                (SubmitBody::Put(payload), record.local_version)
            }
        };

        match self.remote.submit(&entry.key, body, base).await? {
            SubmitOutcome::Accepted { new_version } => {
                if entry.operation != Operation::Delete {
                    self.store.mark_synced(&entry.key, new_version)?;
                }
                debug!(key = %entry.key, new_version, "server accepted write");
                Ok(EntryOutcome::Accepted)
            }
            SubmitOutcome::Conflict {
                server_payload,
                server_version,
            } => {
                let local_payload = entry
                    .payload
                    .clone()
                    .or_else(|| record.map(|r| r.payload))
                    .unwrap_or_else(Payload::empty);
                let conflict = ConflictRecord::new(
                    entry.key.clone(),
                    entry.operation,
                    local_payload,
                    server_payload,
                    base,
                    server_version,
                );
                warn!(
                    key = %entry.key,
                    local = base,
                    server = server_version,
                    "version conflict detected"
                );
                self.conflicts.insert(conflict).await;
                Ok(EntryOutcome::Conflicted)
            }
            SubmitOutcome::Rejected { reason } => Ok(EntryOutcome::Rejected(reason)),
        }
    }

    async fn submit_upload(&self, entry: &QueueEntry) -> SyncResult<EntryOutcome> {
        let record = self.store.get(&entry.key)?;
        let Some(payload) = entry
            .payload
            .clone()
            .or_else(|| record.as_ref().map(|r| r.payload.clone()))
        else {
            return Ok(EntryOutcome::Obsolete);
        };

        let (bytes, content_type) = match &payload {
            Payload::Blob { content_type, .. } => match payload.blob_bytes() {
                Ok(Some(bytes)) => (bytes, content_type.clone()),
                // A blob that no longer decodes will never upload; reject.
                Ok(None) | Err(_) => {
                    return Ok(EntryOutcome::Rejected(
                        "upload payload is not a decodable file blob".into(),
                    ));
                }
            },
            Payload::Fields(_) => {
                return Ok(EntryOutcome::Rejected(
                    "upload payload is not a file blob".into(),
                ));
            }
        };

        let metadata = FileMetadata {
            file_name: entry.key.id.clone(),
            content_type,
            byte_size: bytes.len() as u64,
        };

        match self.remote.upload_file(&entry.key, bytes, metadata).await? {
            UploadOutcome::Accepted { url } => {
                if let Some(record) = record {
                    self.store.mark_synced(&entry.key, record.local_version)?;
                }
                debug!(key = %entry.key, url, "file uploaded");
                Ok(EntryOutcome::Accepted)
            }
            UploadOutcome::Rejected { reason } => Ok(EntryOutcome::Rejected(reason)),
        }
    }

    // ── Failure surfacing ────────────────────────────────────────

    /// Permanently rejected operations since the last clear.
    pub async fn failed_operations(&self) -> Vec<FailedOperation> {
        self.failed.read().await.clone()
    }

    /// Re-enqueues every permanently rejected operation (at default data
    /// priority) and clears the failed list. Returns how many were requeued.
    pub async fn retry_failed(&self) -> SyncResult<usize> {
        let drained: Vec<FailedOperation> =
            self.failed.write().await.drain(..).collect();
        let count = drained.len();
        for op in drained {
            self.queue.enqueue(
                op.operation,
                &op.key,
                op.payload,
                op.base_version,
                PRIORITY_DATA,
            )?;
        }
        if count > 0 {
            info!(count, "requeued permanently failed operations");
        }
        Ok(count)
    }

    /// Drops the failed-operations list without retrying.
    pub async fn clear_failed(&self) {
        self.failed.write().await.clear();
    }

    /// Counters from the most recent completed drain.
    pub async fn last_report(&self) -> Option<DrainReport> {
        *self.last_report.read().await
    }

    /// Whether any queue entry has exhausted its attempts ceiling. The
    /// entry keeps retrying at the capped delay; this flag is the UI's cue
    /// to tell the user sync is struggling.
    pub fn is_degraded(&self) -> SyncResult<bool> {
        Ok(self.queue.degraded_count(self.config.attempts_ceiling)? > 0)
    }
}
