use chrono::{Duration, Utc};
use fieldform_store::{
    Compressor, NoopCompressor, RecordStore, StorageManager, StorageQuota, StoreError,
};
use fieldform_types::{Payload, RecordKey, SchemaRegistry};
use serde_json::json;
use std::io;
use std::sync::Arc;

/// A compressor that always fails, to exercise the uncompressed fallback.
struct BrokenCompressor;

impl Compressor for BrokenCompressor {
    fn name(&self) -> &'static str {
        "broken"
    }

    fn compress(&self, _data: &[u8]) -> io::Result<Vec<u8>> {
        Err(io::Error::other("compressor exploded"))
    }

    fn decompress(&self, _data: &[u8]) -> io::Result<Vec<u8>> {
        Err(io::Error::other("compressor exploded"))
    }
}

fn key(id: &str) -> RecordKey {
    RecordKey::new("form", id)
}

/// Fixed-size payload; same length for every id so byte math is uniform.
fn payload() -> Payload {
    Payload::from_value(json!({"data": "x".repeat(64)})).unwrap()
}

fn quota_store(max_bytes: u64, retention: Duration) -> RecordStore {
    let quota = StorageQuota {
        max_bytes,
        cleanup_threshold: 0.80,
        retention,
    };
    let manager = StorageManager::new(quota, Arc::new(NoopCompressor));
    RecordStore::open_in_memory(manager, SchemaRegistry::new()).unwrap()
}

fn unit_size() -> u64 {
    payload().encoded_len().unwrap()
}

// Records written moments ago must age past the retention cutoff; a
// negative window puts the cutoff in the future so everything synced
// qualifies without sleeping.
fn aged_out() -> Duration {
    Duration::milliseconds(-10)
}

// ── Hard ceiling ──────────────────────────────────────────────────

#[test]
fn write_over_quota_is_rejected() {
    let sz = unit_size();
    let store = quota_store(sz * 2 + 4, Duration::days(30));

    store.put(&key("a"), payload()).unwrap();
    store.put(&key("b"), payload()).unwrap();

    let err = store.put(&key("c"), payload()).unwrap_err();
    assert!(matches!(err, StoreError::StorageFull { .. }));
    // The rejected write left no partial row behind.
    assert!(store.get(&key("c")).unwrap().is_none());
    assert_eq!(store.counts().unwrap().total, 2);
}

#[test]
fn overwrite_of_existing_row_does_not_double_count() {
    let sz = unit_size();
    let store = quota_store(sz + 4, Duration::days(30));

    store.put(&key("a"), payload()).unwrap();
    // Same key again: replaces the row, fits in the same budget.
    store.put(&key("a"), payload()).unwrap();
    assert_eq!(store.counts().unwrap().total, 1);
}

// ── Cleanup before rejection ──────────────────────────────────────

#[test]
fn cleanup_frees_space_for_the_incoming_write() {
    let sz = unit_size();
    let store = quota_store(sz * 3 + 8, aged_out());

    store.put(&key("a"), payload()).unwrap();
    store.put(&key("b"), payload()).unwrap();
    store.put(&key("c"), payload()).unwrap();
    store.mark_synced(&key("a"), 1).unwrap();
    store.mark_synced(&key("b"), 1).unwrap();

    // Usage is at the ceiling; the next write must trigger a sweep of the
    // aged synced records and then succeed.
    store.put(&key("d"), payload()).unwrap();

    assert!(store.get(&key("a")).unwrap().is_none(), "oldest synced swept");
    assert!(store.get(&key("c")).unwrap().is_some(), "unsynced kept");
    assert!(store.get(&key("d")).unwrap().is_some(), "new write admitted");
}

#[test]
fn write_fails_when_cleanup_cannot_free_enough() {
    let sz = unit_size();
    let store = quota_store(sz * 3 + 8, aged_out());

    store.put(&key("a"), payload()).unwrap();
    store.put(&key("b"), payload()).unwrap();
    store.put(&key("c"), payload()).unwrap();
    // Nothing is synced, so cleanup has no candidates.

    let err = store.put(&key("d"), payload()).unwrap_err();
    assert!(matches!(err, StoreError::StorageFull { .. }));
    assert_eq!(store.counts().unwrap().total, 3, "no unsynced record was purged");
}

// ── Retention sweep ───────────────────────────────────────────────

#[test]
fn cleanup_removes_oldest_synced_first_until_under_target() {
    let sz = unit_size();
    let store = quota_store(sz * 2, aged_out());

    // Three records: usage 3·sz against a 2·sz ceiling (target 1.6·sz).
    // Insertion order fixes age order: a is oldest.
    store.put(&key("a"), payload()).unwrap();
    store.put(&key("b"), payload()).unwrap();
    store.put(&key("c"), payload()).unwrap();
    store.mark_synced(&key("a"), 1).unwrap();
    store.mark_synced(&key("b"), 1).unwrap();

    let report = store.cleanup(Utc::now()).unwrap();
    assert_eq!(report.removed, 2);
    assert_eq!(report.freed_bytes, sz * 2);

    assert!(store.get(&key("a")).unwrap().is_none());
    assert!(store.get(&key("b")).unwrap().is_none());
    assert!(store.get(&key("c")).unwrap().is_some(), "unsynced survives any sweep");
}

#[test]
fn cleanup_is_a_no_op_under_target() {
    let store = quota_store(10_000, aged_out());
    store.put(&key("a"), payload()).unwrap();
    store.mark_synced(&key("a"), 1).unwrap();

    let report = store.cleanup(Utc::now()).unwrap();
    assert_eq!(report.removed, 0);
    assert!(store.get(&key("a")).unwrap().is_some());
}

#[test]
fn cleanup_respects_retention_window() {
    let sz = unit_size();
    // 30-day retention: synced but recent records are not candidates.
    let store = quota_store(sz * 2, Duration::days(30));
    store.put(&key("a"), payload()).unwrap();
    store.put(&key("b"), payload()).unwrap();
    store.put(&key("c"), payload()).unwrap();
    store.mark_synced(&key("a"), 1).unwrap();
    store.mark_synced(&key("b"), 1).unwrap();

    let report = store.cleanup(Utc::now()).unwrap();
    assert_eq!(report.removed, 0, "records inside the window are kept");
}

// ── Compression fallback ──────────────────────────────────────────

#[test]
fn broken_compressor_falls_back_to_uncompressed() {
    let manager = StorageManager::new(StorageQuota::default(), Arc::new(BrokenCompressor));
    let store = RecordStore::open_in_memory(manager, SchemaRegistry::new()).unwrap();

    let k = key("f1");
    let p = payload();
    // The write must succeed despite the compressor failing...
    store.put(&k, p.clone()).unwrap();
    // ...and read back without ever touching decompress.
    assert_eq!(store.get(&k).unwrap().unwrap().payload, p);
}
