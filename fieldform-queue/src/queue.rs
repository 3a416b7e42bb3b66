//! SQLite-backed pending-operation queue.

use crate::backoff::backoff_delay;
use crate::error::{QueueError, QueueResult};
use chrono::{DateTime, Utc};
use fieldform_types::{EntryId, Operation, Payload, QueueEntry, RecordKey};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use tracing::debug;

/// Default drain batch size.
pub const DEFAULT_BATCH_SIZE: usize = 50;

/// Transient-failure count past which an entry counts as degraded in
/// aggregate stats. The entry keeps retrying at the capped delay; pending
/// data is never dropped for being unlucky.
pub const DEFAULT_ATTEMPTS_CEILING: u32 = 8;

/// Outcome of failing a queue entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailOutcome {
    /// Transient failure: entry kept, next attempt scheduled.
    Requeued {
        attempts: u32,
    },
    /// Permanent failure: entry removed from the queue.
    Removed,
}

/// Durable, priority-ordered list of pending operations.
///
/// Invariant: at most one live entry per record key. A new mutation for a
/// key coalesces into the existing entry — payload replaced, operation
/// upgraded (Delete wins, Create absorbs Update), retry state reset.
pub struct SyncQueue {
    conn: Arc<Mutex<Connection>>,
}

impl SyncQueue {
    /// Opens (or creates) a queue at the given path.
    pub fn open(path: &Path) -> QueueResult<Self> {
        let conn = Connection::open(path)?;
        let queue = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        queue.init_schema()?;
        Ok(queue)
    }

    /// Opens an in-memory queue (for testing).
    pub fn open_in_memory() -> QueueResult<Self> {
        let conn = Connection::open_in_memory()?;
        let queue = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        queue.init_schema()?;
        Ok(queue)
    }

    fn init_schema(&self) -> QueueResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS queue (
                id TEXT PRIMARY KEY,
                storage_key TEXT NOT NULL UNIQUE,
                kind TEXT NOT NULL,
                entity_id TEXT NOT NULL,
                operation TEXT NOT NULL,
                payload BLOB,
                base_version INTEGER,
                priority INTEGER NOT NULL,
                enqueued_at INTEGER NOT NULL,
                attempts INTEGER NOT NULL DEFAULT 0,
                next_attempt_at INTEGER NOT NULL,
                last_error TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_queue_ready
                ON queue(next_attempt_at, priority, enqueued_at);
            ",
        )?;
        Ok(())
    }

    // ── Producing ────────────────────────────────────────────────

    /// Appends (or coalesces) a pending operation for `key`.
    ///
    /// `base_version` is only meaningful for tombstones, whose record no
    /// longer exists to read a base from at submit time. The more urgent
    /// of the old and new priorities wins, and retry state resets so the
    /// fresh mutation is tried immediately.
    pub fn enqueue(
        &self,
        operation: Operation,
        key: &RecordKey,
        payload: Option<Payload>,
        base_version: Option<u64>,
        priority: i32,
    ) -> QueueResult<QueueEntry> {
        let now = Utc::now();
        let encoded = payload
            .as_ref()
            .map(|p| p.encode())
            .transpose()
            .map_err(|e| QueueError::InvalidData(e.to_string()))?;

        let conn = self.conn.lock().unwrap();
        let existing = Self::read_for_key(&conn, key)?;

        let entry = match existing {
            Some(live) => {
                let entry = QueueEntry {
                    operation: live.operation.coalesce(operation),
                    payload,
                    base_version: base_version.or(live.base_version),
                    priority: live.priority.min(priority),
                    attempts: 0,
                    next_attempt_at: now,
                    last_error: None,
                    ..live
                };
                conn.execute(
                    "UPDATE queue
                     SET operation = ?2, payload = ?3, base_version = ?4, priority = ?5,
                         attempts = 0, next_attempt_at = ?6, last_error = NULL
                     WHERE id = ?1",
                    params![
                        entry.id.to_string(),
                        entry.operation.as_str(),
                        encoded,
                        entry.base_version.map(|v| v as i64),
                        entry.priority,
                        now.timestamp_millis(),
                    ],
                )?;
                debug!(key = %key, op = %entry.operation, "queue entry coalesced");
                entry
            }
            None => {
                let entry = QueueEntry {
                    id: EntryId::new(),
                    operation,
                    key: key.clone(),
                    payload,
                    base_version,
                    priority,
                    enqueued_at: now,
                    attempts: 0,
                    next_attempt_at: now,
                    last_error: None,
                };
                conn.execute(
                    "INSERT INTO queue
                     (id, storage_key, kind, entity_id, operation, payload, base_version,
                      priority, enqueued_at, attempts, next_attempt_at, last_error)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, 0, ?10, NULL)",
                    params![
                        entry.id.to_string(),
                        key.storage_key(),
                        key.kind.as_str(),
                        key.id,
                        entry.operation.as_str(),
                        encoded,
                        entry.base_version.map(|v| v as i64),
                        entry.priority,
                        now.timestamp_millis(),
                        now.timestamp_millis(),
                    ],
                )?;
                debug!(key = %key, op = %entry.operation, "queue entry added");
                entry
            }
        };
        Ok(entry)
    }

    // ── Draining ─────────────────────────────────────────────────

    /// Returns up to `limit` entries whose next attempt is due, most urgent
    /// first (`priority` ascending, then enqueue time).
    pub fn dequeue_ready(&self, limit: usize) -> QueueResult<Vec<QueueEntry>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, kind, entity_id, operation, payload, base_version, priority,
                    enqueued_at, attempts, next_attempt_at, last_error
             FROM queue
             WHERE next_attempt_at <= ?1
             ORDER BY priority ASC, enqueued_at ASC, rowid ASC
             LIMIT ?2",
        )?;
        let rows = stmt.query_map(
            params![Utc::now().timestamp_millis(), limit as i64],
            Self::row_entry,
        )?;

        let mut entries = Vec::new();
        for row in rows {
            entries.push(row??);
        }
        Ok(entries)
    }

    /// Removes an entry after the remote definitively settled it.
    pub fn ack(&self, id: EntryId) -> QueueResult<()> {
        let conn = self.conn.lock().unwrap();
        let changed = conn.execute("DELETE FROM queue WHERE id = ?1", params![id.to_string()])?;
        if changed == 0 {
            return Err(QueueError::NotFound(id.to_string()));
        }
        Ok(())
    }

    /// Records a failed attempt.
    ///
    /// Transient failures keep the entry and push `next_attempt_at` out by
    /// the capped exponential backoff. Permanent failures remove the entry;
    /// surfacing them is the caller's job.
    pub fn fail(&self, id: EntryId, transient: bool, error: &str) -> QueueResult<FailOutcome> {
        let conn = self.conn.lock().unwrap();
        if !transient {
            let changed =
                conn.execute("DELETE FROM queue WHERE id = ?1", params![id.to_string()])?;
            if changed == 0 {
                return Err(QueueError::NotFound(id.to_string()));
            }
            return Ok(FailOutcome::Removed);
        }

        let attempts: u32 = conn
            .query_row(
                "SELECT attempts FROM queue WHERE id = ?1",
                params![id.to_string()],
                |row| row.get::<_, i64>(0),
            )
            .optional()?
            .ok_or_else(|| QueueError::NotFound(id.to_string()))? as u32
            + 1;

        let next = Utc::now() + backoff_delay(attempts);
        conn.execute(
            "UPDATE queue SET attempts = ?2, next_attempt_at = ?3, last_error = ?4 WHERE id = ?1",
            params![
                id.to_string(),
                attempts as i64,
                next.timestamp_millis(),
                error,
            ],
        )?;
        Ok(FailOutcome::Requeued { attempts })
    }

    // ── Queries ──────────────────────────────────────────────────

    /// Fetches an entry by id.
    pub fn get(&self, id: EntryId) -> QueueResult<Option<QueueEntry>> {
        let conn = self.conn.lock().unwrap();
        let row = conn
            .query_row(
                "SELECT id, kind, entity_id, operation, payload, base_version, priority,
                        enqueued_at, attempts, next_attempt_at, last_error
                 FROM queue WHERE id = ?1",
                params![id.to_string()],
                Self::row_entry,
            )
            .optional()?;
        row.transpose()
    }

    /// Fetches the live entry for a record key, if any.
    pub fn entry_for_key(&self, key: &RecordKey) -> QueueResult<Option<QueueEntry>> {
        let conn = self.conn.lock().unwrap();
        Self::read_for_key(&conn, key)
    }

    /// Removes any live entry for a record key. Returns whether one existed.
    pub fn remove_for_key(&self, key: &RecordKey) -> QueueResult<bool> {
        let conn = self.conn.lock().unwrap();
        let changed = conn.execute(
            "DELETE FROM queue WHERE storage_key = ?1",
            params![key.storage_key()],
        )?;
        Ok(changed > 0)
    }

    /// Number of live entries.
    pub fn pending_count(&self) -> QueueResult<usize> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM queue", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// Number of entries at or past the attempts ceiling.
    pub fn degraded_count(&self, ceiling: u32) -> QueueResult<usize> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM queue WHERE attempts >= ?1",
            params![ceiling as i64],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    /// Removes every entry. Pending local changes stay in the record store;
    /// only the outbound work list is dropped.
    pub fn clear(&self) -> QueueResult<usize> {
        let conn = self.conn.lock().unwrap();
        let changed = conn.execute("DELETE FROM queue", [])?;
        Ok(changed)
    }

    // ── Backup ───────────────────────────────────────────────────

    /// All entries in enqueue order, for backup export.
    pub fn snapshot(&self) -> QueueResult<Vec<QueueEntry>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, kind, entity_id, operation, payload, base_version, priority,
                    enqueued_at, attempts, next_attempt_at, last_error
             FROM queue ORDER BY enqueued_at ASC, rowid ASC",
        )?;
        let rows = stmt.query_map([], Self::row_entry)?;

        let mut entries = Vec::new();
        for row in rows {
            entries.push(row??);
        }
        Ok(entries)
    }

    /// Writes entries verbatim — ids, retry state and timestamps included.
    /// Used by backup import; normal writes go through `enqueue`.
    pub fn restore(&self, entries: &[QueueEntry]) -> QueueResult<()> {
        let conn = self.conn.lock().unwrap();
        for entry in entries {
            let encoded = entry
                .payload
                .as_ref()
                .map(|p| p.encode())
                .transpose()
                .map_err(|e| QueueError::InvalidData(e.to_string()))?;
            // Replace any live entry for the same key or id wholesale.
            conn.execute(
                "DELETE FROM queue WHERE storage_key = ?1 OR id = ?2",
                params![entry.key.storage_key(), entry.id.to_string()],
            )?;
            conn.execute(
                "INSERT INTO queue
                 (id, storage_key, kind, entity_id, operation, payload, base_version,
                  priority, enqueued_at, attempts, next_attempt_at, last_error)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                params![
                    entry.id.to_string(),
                    entry.key.storage_key(),
                    entry.key.kind.as_str(),
                    entry.key.id,
                    entry.operation.as_str(),
                    encoded,
                    entry.base_version.map(|v| v as i64),
                    entry.priority,
                    entry.enqueued_at.timestamp_millis(),
                    entry.attempts as i64,
                    entry.next_attempt_at.timestamp_millis(),
                    entry.last_error,
                ],
            )?;
        }
        Ok(())
    }

    // ── Row helpers ──────────────────────────────────────────────

    fn read_for_key(conn: &Connection, key: &RecordKey) -> QueueResult<Option<QueueEntry>> {
        let row = conn
            .query_row(
                "SELECT id, kind, entity_id, operation, payload, base_version, priority,
                        enqueued_at, attempts, next_attempt_at, last_error
                 FROM queue WHERE storage_key = ?1",
                params![key.storage_key()],
                Self::row_entry,
            )
            .optional()?;
        row.transpose()
    }

    /// Maps a row to a decoded entry. Decoding can fail outside SQLite, so
    /// the row closure yields a nested result unwrapped by callers.
    #[allow(clippy::type_complexity)]
    fn row_entry(row: &rusqlite::Row<'_>) -> rusqlite::Result<QueueResult<QueueEntry>> {
        let id: String = row.get(0)?;
        let kind: String = row.get(1)?;
        let entity_id: String = row.get(2)?;
        let operation: String = row.get(3)?;
        let payload: Option<Vec<u8>> = row.get(4)?;
        let base_version: Option<i64> = row.get(5)?;
        let priority: i32 = row.get(6)?;
        let enqueued_ms: i64 = row.get(7)?;
        let attempts: i64 = row.get(8)?;
        let next_ms: i64 = row.get(9)?;
        let last_error: Option<String> = row.get(10)?;

        Ok((|| {
            let payload = payload
                .map(|bytes| Payload::decode(&bytes))
                .transpose()
                .map_err(|e| QueueError::InvalidData(e.to_string()))?;
            Ok(QueueEntry {
                id: EntryId::from_str(&id)
                    .map_err(|e| QueueError::InvalidData(format!("bad entry id: {e}")))?,
                operation: Operation::parse(&operation)
                    .ok_or_else(|| QueueError::InvalidData(format!("bad operation: {operation}")))?,
                key: RecordKey::new(kind, entity_id),
                payload,
                base_version: base_version.map(|v| v as u64),
                priority,
                enqueued_at: DateTime::from_timestamp_millis(enqueued_ms)
                    .unwrap_or(DateTime::UNIX_EPOCH),
                attempts: attempts as u32,
                next_attempt_at: DateTime::from_timestamp_millis(next_ms)
                    .unwrap_or(DateTime::UNIX_EPOCH),
                last_error,
            })
        })())
    }
}
