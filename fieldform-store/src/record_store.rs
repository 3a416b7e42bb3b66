//! SQLite-backed versioned record store.

use crate::error::{StoreError, StoreResult};
use crate::manager::StorageManager;
use chrono::{DateTime, Utc};
use fieldform_types::{EntityKind, Payload, Record, RecordKey, SchemaRegistry};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

/// Aggregate record counts, for the UI status indicator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreCounts {
    pub total: usize,
    pub synced: usize,
    pub pending: usize,
}

/// Result of a retention cleanup sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanupReport {
    pub removed: usize,
    pub freed_bytes: u64,
}

/// Decoded row shape: kind, entity id, stored payload, compressed flag,
/// local version, synced flag, server version, updated-at millis.
type RowTuple = (String, String, Vec<u8>, bool, i64, bool, Option<i64>, i64);

/// Persistent store for versioned records, one row per `(kind, id)`.
///
/// Every mutation goes through this store; the sync queue and the UI both
/// see copies, never the canonical row. All operations are synchronous
/// SQLite calls guarded by one connection lock.
pub struct RecordStore {
    conn: Arc<Mutex<Connection>>,
    manager: StorageManager,
    schemas: SchemaRegistry,
}

impl RecordStore {
    /// Opens (or creates) a record store at the given path.
    pub fn open(path: &Path, manager: StorageManager, schemas: SchemaRegistry) -> StoreResult<Self> {
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
            manager,
            schemas,
        };
        store.init_schema()?;
        Ok(store)
    }

    /// Opens an in-memory record store (for testing).
    pub fn open_in_memory(manager: StorageManager, schemas: SchemaRegistry) -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
            manager,
            schemas,
        };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> StoreResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS records (
                storage_key TEXT PRIMARY KEY,
                kind TEXT NOT NULL,
                entity_id TEXT NOT NULL,
                payload BLOB NOT NULL,
                compressed INTEGER NOT NULL DEFAULT 0,
                byte_size INTEGER NOT NULL,
                local_version INTEGER NOT NULL,
                synced INTEGER NOT NULL DEFAULT 0,
                server_version INTEGER,
                updated_at INTEGER NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_records_kind ON records(kind);
            CREATE INDEX IF NOT EXISTS idx_records_synced ON records(synced);
            ",
        )?;
        Ok(())
    }

    /// Returns the storage manager governing this store.
    #[must_use]
    pub fn manager(&self) -> &StorageManager {
        &self.manager
    }

    // ── Mutations ────────────────────────────────────────────────

    /// Creates or overwrites the record for `key`.
    ///
    /// Increments `local_version` (1 on first write), clears the synced
    /// flag, validates against the kind's registered schema, and runs the
    /// quota gate — including an opportunistic cleanup sweep — before
    /// touching the row. Fails with `StorageFull` when the write does not
    /// fit even after cleanup.
    pub fn put(&self, key: &RecordKey, payload: Payload) -> StoreResult<Record> {
        self.schemas.validate(&key.kind, &payload)?;

        let raw = payload.encode()?;
        let (stored, compressed) = self.manager.encode(&raw);
        let incoming = stored.len() as u64;
        let now = Utc::now();

        let conn = self.conn.lock().unwrap();
        let existing = Self::row_meta(&conn, key)?;
        let replaced = existing.map(|(_, size)| size).unwrap_or(0);

        let used = Self::used_bytes_locked(&conn)?;
        if self.manager.wants_cleanup(used, replaced, incoming) {
            self.cleanup_locked(&conn, now)?;
        }
        let used = Self::used_bytes_locked(&conn)?;
        self.manager.check_quota(used, replaced, incoming)?;

        let record = match existing {
            Some((version, _)) => {
                conn.execute(
                    "UPDATE records
                     SET payload = ?2, compressed = ?3, byte_size = ?4,
                         local_version = ?5, synced = 0, updated_at = ?6
                     WHERE storage_key = ?1",
                    params![
                        key.storage_key(),
                        stored,
                        compressed,
                        incoming as i64,
                        (version + 1) as i64,
                        now.timestamp_millis(),
                    ],
                )?;
                self.read_record(&conn, key)?
                    .ok_or_else(|| StoreError::NotFound(key.to_string()))?
            }
            None => {
                conn.execute(
                    "INSERT INTO records
                     (storage_key, kind, entity_id, payload, compressed, byte_size,
                      local_version, synced, server_version, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, 1, 0, NULL, ?7)",
                    params![
                        key.storage_key(),
                        key.kind.as_str(),
                        key.id,
                        stored,
                        compressed,
                        incoming as i64,
                        now.timestamp_millis(),
                    ],
                )?;
                Record {
                    key: key.clone(),
                    payload,
                    local_version: 1,
                    synced: false,
                    server_version: None,
                    updated_at: now,
                }
            }
        };

        debug!(key = %key, version = record.local_version, "record written");
        Ok(record)
    }

    /// Removes the record for `key`, returning it if it existed.
    ///
    /// Queue side effects (dropping a pending entry, enqueuing a tombstone
    /// for previously synced records) are the caller's responsibility.
    pub fn delete(&self, key: &RecordKey) -> StoreResult<Option<Record>> {
        let conn = self.conn.lock().unwrap();
        let record = self.read_record(&conn, key)?;
        if record.is_some() {
            conn.execute(
                "DELETE FROM records WHERE storage_key = ?1",
                params![key.storage_key()],
            )?;
            debug!(key = %key, "record deleted");
        }
        Ok(record)
    }

    /// Marks a record as acknowledged by the server at `server_version`.
    /// `local_version` is untouched — it stays the base for the next
    /// conflict check.
    pub fn mark_synced(&self, key: &RecordKey, server_version: u64) -> StoreResult<()> {
        let conn = self.conn.lock().unwrap();
        let changed = conn.execute(
            "UPDATE records SET synced = 1, server_version = ?2 WHERE storage_key = ?1",
            params![key.storage_key(), server_version as i64],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound(key.to_string()));
        }
        Ok(())
    }

    /// Server-wins resolution write: replaces the payload with the server's,
    /// pins `local_version` to the server's version (never downward) and
    /// marks the record synced. Re-creates the row if the record was deleted
    /// locally in the meantime.
    pub fn apply_server(
        &self,
        key: &RecordKey,
        payload: Payload,
        server_version: u64,
    ) -> StoreResult<Record> {
        let raw = payload.encode()?;
        let (stored, compressed) = self.manager.encode(&raw);
        let now = Utc::now();

        let conn = self.conn.lock().unwrap();
        let version = match Self::row_meta(&conn, key)? {
            Some((local, _)) => local.max(server_version),
            None => server_version,
        };
        conn.execute(
            "INSERT INTO records
             (storage_key, kind, entity_id, payload, compressed, byte_size,
              local_version, synced, server_version, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 1, ?8, ?9)
             ON CONFLICT(storage_key) DO UPDATE SET
                payload = excluded.payload,
                compressed = excluded.compressed,
                byte_size = excluded.byte_size,
                local_version = excluded.local_version,
                synced = 1,
                server_version = excluded.server_version,
                updated_at = excluded.updated_at",
            params![
                key.storage_key(),
                key.kind.as_str(),
                key.id,
                stored,
                compressed,
                stored.len() as i64,
                version as i64,
                server_version as i64,
                now.timestamp_millis(),
            ],
        )?;

        Ok(Record {
            key: key.clone(),
            payload,
            local_version: version,
            synced: true,
            server_version: Some(server_version),
            updated_at: now,
        })
    }

    /// Client-wins resolution support: lifts `local_version` to the server's
    /// current version (never downward) so the resubmission carries a fresh
    /// base, and clears the synced flag.
    pub fn rebase(&self, key: &RecordKey, server_version: u64) -> StoreResult<Record> {
        let conn = self.conn.lock().unwrap();
        let (local, _) =
            Self::row_meta(&conn, key)?.ok_or_else(|| StoreError::NotFound(key.to_string()))?;
        conn.execute(
            "UPDATE records SET local_version = ?2, synced = 0 WHERE storage_key = ?1",
            params![key.storage_key(), local.max(server_version) as i64],
        )?;
        self.read_record(&conn, key)?
            .ok_or_else(|| StoreError::NotFound(key.to_string()))
    }

    /// Writes a record row verbatim — versions, flags and timestamp included.
    /// Used by backup import; normal writes go through `put`.
    pub fn restore(&self, record: &Record) -> StoreResult<()> {
        let raw = record.payload.encode()?;
        let (stored, compressed) = self.manager.encode(&raw);

        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO records
             (storage_key, kind, entity_id, payload, compressed, byte_size,
              local_version, synced, server_version, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
             ON CONFLICT(storage_key) DO UPDATE SET
                payload = excluded.payload,
                compressed = excluded.compressed,
                byte_size = excluded.byte_size,
                local_version = excluded.local_version,
                synced = excluded.synced,
                server_version = excluded.server_version,
                updated_at = excluded.updated_at",
            params![
                record.key.storage_key(),
                record.key.kind.as_str(),
                record.key.id,
                stored,
                compressed,
                stored.len() as i64,
                record.local_version as i64,
                record.synced,
                record.server_version.map(|v| v as i64),
                record.updated_at.timestamp_millis(),
            ],
        )?;
        Ok(())
    }

    // ── Reads ────────────────────────────────────────────────────

    /// Fetches the record for `key`.
    pub fn get(&self, key: &RecordKey) -> StoreResult<Option<Record>> {
        let conn = self.conn.lock().unwrap();
        self.read_record(&conn, key)
    }

    /// Returns all records of a kind, in insertion order of the index.
    pub fn scan_by_kind(&self, kind: &EntityKind) -> StoreResult<Vec<Record>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT kind, entity_id, payload, compressed, local_version, synced,
                    server_version, updated_at
             FROM records WHERE kind = ?1 ORDER BY rowid ASC",
        )?;
        let rows = stmt.query_map(params![kind.as_str()], Self::row_tuple)?;

        let mut records = Vec::new();
        for row in rows {
            records.push(self.record_from_tuple(row?)?);
        }
        Ok(records)
    }

    /// Returns every record in the store, in insertion order. Backup export.
    pub fn all_records(&self) -> StoreResult<Vec<Record>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT kind, entity_id, payload, compressed, local_version, synced,
                    server_version, updated_at
             FROM records ORDER BY rowid ASC",
        )?;
        let rows = stmt.query_map([], Self::row_tuple)?;

        let mut records = Vec::new();
        for row in rows {
            records.push(self.record_from_tuple(row?)?);
        }
        Ok(records)
    }

    /// Total persisted payload bytes.
    pub fn used_bytes(&self) -> StoreResult<u64> {
        let conn = self.conn.lock().unwrap();
        Self::used_bytes_locked(&conn)
    }

    /// Aggregate counts by sync flag.
    pub fn counts(&self) -> StoreResult<StoreCounts> {
        let conn = self.conn.lock().unwrap();
        let (total, synced): (i64, i64) = conn.query_row(
            "SELECT COUNT(*), COALESCE(SUM(synced), 0) FROM records",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        Ok(StoreCounts {
            total: total as usize,
            synced: synced as usize,
            pending: (total - synced) as usize,
        })
    }

    // ── Retention ────────────────────────────────────────────────

    /// Retention sweep: deletes synced records older than the retention
    /// window, oldest first, until usage falls under the cleanup target or
    /// no eligible candidates remain.
    ///
    /// Unsynced records are never candidates, whatever their age — and a
    /// record with an open conflict is by construction unsynced (its local
    /// mutation was never acknowledged), so open conflicts are covered by
    /// the same guard.
    pub fn cleanup(&self, now: DateTime<Utc>) -> StoreResult<CleanupReport> {
        let conn = self.conn.lock().unwrap();
        self.cleanup_locked(&conn, now)
    }

    fn cleanup_locked(&self, conn: &Connection, now: DateTime<Utc>) -> StoreResult<CleanupReport> {
        let target = self.manager.target_bytes();
        let mut used = Self::used_bytes_locked(conn)?;
        if used <= target {
            return Ok(CleanupReport::default());
        }

        let cutoff = self.manager.retention_cutoff(now).timestamp_millis();
        let mut stmt = conn.prepare(
            "SELECT storage_key, byte_size FROM records
             WHERE synced = 1 AND updated_at < ?1
             ORDER BY updated_at ASC",
        )?;
        let candidates: Vec<(String, u64)> = stmt
            .query_map(params![cutoff], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as u64))
            })?
            .collect::<Result<_, _>>()?;

        let mut report = CleanupReport::default();
        for (storage_key, size) in candidates {
            if used <= target {
                break;
            }
            conn.execute(
                "DELETE FROM records WHERE storage_key = ?1",
                params![storage_key],
            )?;
            used = used.saturating_sub(size);
            report.removed += 1;
            report.freed_bytes += size;
        }

        if report.removed > 0 {
            info!(
                removed = report.removed,
                freed = report.freed_bytes,
                "retention cleanup freed space"
            );
        }
        Ok(report)
    }

    // ── Row helpers ──────────────────────────────────────────────

    fn row_tuple(row: &rusqlite::Row<'_>) -> rusqlite::Result<RowTuple> {
        Ok((
            row.get(0)?,
            row.get(1)?,
            row.get(2)?,
            row.get(3)?,
            row.get(4)?,
            row.get(5)?,
            row.get(6)?,
            row.get(7)?,
        ))
    }

    fn record_from_tuple(&self, row: RowTuple) -> StoreResult<Record> {
        let (kind, entity_id, stored, compressed, version, synced, server_version, updated_ms) =
            row;
        let raw = self.manager.decode(&stored, compressed)?;
        let payload = Payload::decode(&raw)?;
        Ok(Record {
            key: RecordKey::new(kind, entity_id),
            payload,
            local_version: version as u64,
            synced,
            server_version: server_version.map(|v| v as u64),
            updated_at: DateTime::from_timestamp_millis(updated_ms)
                .unwrap_or(DateTime::UNIX_EPOCH),
        })
    }

    fn read_record(&self, conn: &Connection, key: &RecordKey) -> StoreResult<Option<Record>> {
        let row = conn
            .query_row(
                "SELECT kind, entity_id, payload, compressed, local_version, synced,
                        server_version, updated_at
                 FROM records WHERE storage_key = ?1",
                params![key.storage_key()],
                Self::row_tuple,
            )
            .optional()?;
        row.map(|r| self.record_from_tuple(r)).transpose()
    }

    /// `(local_version, byte_size)` of the row for `key`, if present.
    fn row_meta(conn: &Connection, key: &RecordKey) -> StoreResult<Option<(u64, u64)>> {
        let row = conn
            .query_row(
                "SELECT local_version, byte_size FROM records WHERE storage_key = ?1",
                params![key.storage_key()],
                |row| Ok((row.get::<_, i64>(0)? as u64, row.get::<_, i64>(1)? as u64)),
            )
            .optional()?;
        Ok(row)
    }

    fn used_bytes_locked(conn: &Connection) -> StoreResult<u64> {
        let used: i64 =
            conn.query_row("SELECT COALESCE(SUM(byte_size), 0) FROM records", [], |row| {
                row.get(0)
            })?;
        Ok(used as u64)
    }
}
