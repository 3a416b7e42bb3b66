use fieldform_store::{RecordStore, StorageManager, StorageQuota, StoreError};
use fieldform_store::{DeflateCompressor, NoopCompressor};
use fieldform_types::{EntityKind, EntitySchema, Payload, RecordKey, SchemaField, SchemaRegistry};
use serde_json::json;
use std::sync::Arc;

fn open_store() -> RecordStore {
    RecordStore::open_in_memory(StorageManager::with_defaults(), SchemaRegistry::new()).unwrap()
}

fn open_store_with_quota(quota: StorageQuota) -> RecordStore {
    // Noop compression keeps byte accounting predictable in quota tests.
    let manager = StorageManager::new(quota, Arc::new(NoopCompressor));
    RecordStore::open_in_memory(manager, SchemaRegistry::new()).unwrap()
}

fn key(kind: &str, id: &str) -> RecordKey {
    RecordKey::new(kind, id)
}

fn fields(value: serde_json::Value) -> Payload {
    Payload::from_value(value).unwrap()
}

// ── put / get ─────────────────────────────────────────────────────

#[test]
fn put_then_get_roundtrip() {
    let store = open_store();
    let k = key("employee", "e1");
    let payload = fields(json!({"name": "A", "dept": "ops"}));

    let written = store.put(&k, payload.clone()).unwrap();
    assert_eq!(written.local_version, 1);
    assert!(!written.synced);

    let read = store.get(&k).unwrap().unwrap();
    assert_eq!(read.payload, payload);
    assert_eq!(read.local_version, 1);
}

#[test]
fn get_missing_returns_none() {
    let store = open_store();
    assert!(store.get(&key("employee", "nope")).unwrap().is_none());
}

#[test]
fn version_increments_on_every_put() {
    let store = open_store();
    let k = key("employee", "e1");
    for expected in 1..=5 {
        let record = store.put(&k, fields(json!({"rev": expected}))).unwrap();
        assert_eq!(record.local_version, expected);
    }
}

#[test]
fn put_clears_synced_flag() {
    let store = open_store();
    let k = key("employee", "e1");
    store.put(&k, fields(json!({"v": 1}))).unwrap();
    store.mark_synced(&k, 1).unwrap();
    assert!(store.get(&k).unwrap().unwrap().synced);

    store.put(&k, fields(json!({"v": 2}))).unwrap();
    let record = store.get(&k).unwrap().unwrap();
    assert!(!record.synced);
    assert_eq!(record.local_version, 2);
}

#[test]
fn blob_payload_roundtrip() {
    let store = open_store();
    let k = key("document", "photo-1");
    let payload = Payload::blob(b"\x89PNG\r\n\x1a\n fake image bytes", "image/png");
    store.put(&k, payload.clone()).unwrap();
    assert_eq!(store.get(&k).unwrap().unwrap().payload, payload);
}

// ── scan ──────────────────────────────────────────────────────────

#[test]
fn scan_by_kind_filters_and_preserves_insertion_order() {
    let store = open_store();
    store.put(&key("employee", "e1"), fields(json!({"n": 1}))).unwrap();
    store.put(&key("form", "f1"), fields(json!({"n": 2}))).unwrap();
    store.put(&key("employee", "e2"), fields(json!({"n": 3}))).unwrap();

    let employees = store.scan_by_kind(&EntityKind::from("employee")).unwrap();
    let ids: Vec<&str> = employees.iter().map(|r| r.key.id.as_str()).collect();
    assert_eq!(ids, vec!["e1", "e2"]);
}

#[test]
fn overwrite_keeps_scan_position() {
    let store = open_store();
    store.put(&key("employee", "e1"), fields(json!({"n": 1}))).unwrap();
    store.put(&key("employee", "e2"), fields(json!({"n": 2}))).unwrap();
    // Overwriting e1 must not move it behind e2 in the index.
    store.put(&key("employee", "e1"), fields(json!({"n": 9}))).unwrap();

    let employees = store.scan_by_kind(&EntityKind::from("employee")).unwrap();
    let ids: Vec<&str> = employees.iter().map(|r| r.key.id.as_str()).collect();
    assert_eq!(ids, vec!["e1", "e2"]);
}

// ── delete ────────────────────────────────────────────────────────

#[test]
fn delete_returns_removed_record() {
    let store = open_store();
    let k = key("employee", "e1");
    store.put(&k, fields(json!({"n": 1}))).unwrap();

    let removed = store.delete(&k).unwrap().unwrap();
    assert_eq!(removed.key, k);
    assert!(store.get(&k).unwrap().is_none());
}

#[test]
fn delete_missing_is_none() {
    let store = open_store();
    assert!(store.delete(&key("employee", "ghost")).unwrap().is_none());
}

// ── sync flags ────────────────────────────────────────────────────

#[test]
fn mark_synced_keeps_local_version() {
    let store = open_store();
    let k = key("employee", "e1");
    store.put(&k, fields(json!({"n": 1}))).unwrap();
    store.put(&k, fields(json!({"n": 2}))).unwrap();

    store.mark_synced(&k, 7).unwrap();
    let record = store.get(&k).unwrap().unwrap();
    assert!(record.synced);
    assert_eq!(record.local_version, 2);
    assert_eq!(record.server_version, Some(7));
}

#[test]
fn mark_synced_missing_record_errors() {
    let store = open_store();
    assert!(matches!(
        store.mark_synced(&key("employee", "ghost"), 1),
        Err(StoreError::NotFound(_))
    ));
}

#[test]
fn apply_server_pins_version_and_syncs() {
    let store = open_store();
    let k = key("employee", "e1");
    store.put(&k, fields(json!({"name": "local"}))).unwrap();

    let server_payload = fields(json!({"name": "server"}));
    let record = store.apply_server(&k, server_payload.clone(), 4).unwrap();
    assert_eq!(record.payload, server_payload);
    assert_eq!(record.local_version, 4);
    assert!(record.synced);
    assert_eq!(record.server_version, Some(4));
}

#[test]
fn apply_server_never_lowers_version() {
    let store = open_store();
    let k = key("employee", "e1");
    for n in 1..=6 {
        store.put(&k, fields(json!({"rev": n}))).unwrap();
    }

    let record = store.apply_server(&k, fields(json!({"rev": 0})), 2).unwrap();
    assert_eq!(record.local_version, 6);
}

#[test]
fn apply_server_recreates_deleted_record() {
    let store = open_store();
    let k = key("employee", "e1");
    let record = store.apply_server(&k, fields(json!({"name": "server"})), 3).unwrap();
    assert_eq!(record.local_version, 3);
    assert!(store.get(&k).unwrap().is_some());
}

#[test]
fn rebase_lifts_version_and_clears_synced() {
    let store = open_store();
    let k = key("employee", "e1");
    store.put(&k, fields(json!({"n": 1}))).unwrap();
    store.mark_synced(&k, 1).unwrap();

    let record = store.rebase(&k, 5).unwrap();
    assert_eq!(record.local_version, 5);
    assert!(!record.synced);
}

#[test]
fn rebase_never_lowers_version() {
    let store = open_store();
    let k = key("employee", "e1");
    for n in 1..=8 {
        store.put(&k, fields(json!({"rev": n}))).unwrap();
    }
    let record = store.rebase(&k, 3).unwrap();
    assert_eq!(record.local_version, 8);
}

// ── schema validation ─────────────────────────────────────────────

#[test]
fn put_rejects_schema_violations() {
    let mut schemas = SchemaRegistry::new();
    schemas.register(EntitySchema::new(
        "employee",
        vec![SchemaField::text("name", true)],
    ));
    let store = RecordStore::open_in_memory(StorageManager::with_defaults(), schemas).unwrap();

    let err = store
        .put(&key("employee", "e1"), fields(json!({"badge": 1})))
        .unwrap_err();
    assert!(matches!(err, StoreError::Payload(_)));
    assert!(store.get(&key("employee", "e1")).unwrap().is_none());
}

// ── compression ───────────────────────────────────────────────────

#[test]
fn compressed_store_roundtrips_large_payloads() {
    let manager = StorageManager::new(StorageQuota::default(), Arc::new(DeflateCompressor::new()));
    let store = RecordStore::open_in_memory(manager, SchemaRegistry::new()).unwrap();

    // Highly repetitive payload, certain to shrink under deflate.
    let text = "onboarding ".repeat(500);
    let k = key("form", "f1");
    let payload = fields(json!({"notes": text}));
    store.put(&k, payload.clone()).unwrap();

    let read = store.get(&k).unwrap().unwrap();
    assert_eq!(read.payload, payload);
    // Stored (compressed) bytes are well under the raw encoding.
    assert!(store.used_bytes().unwrap() < payload.encoded_len().unwrap());
}

// ── accounting ────────────────────────────────────────────────────

#[test]
fn counts_track_sync_state() {
    let store = open_store();
    store.put(&key("employee", "e1"), fields(json!({"n": 1}))).unwrap();
    store.put(&key("employee", "e2"), fields(json!({"n": 2}))).unwrap();
    store.mark_synced(&key("employee", "e1"), 1).unwrap();

    let counts = store.counts().unwrap();
    assert_eq!(counts.total, 2);
    assert_eq!(counts.synced, 1);
    assert_eq!(counts.pending, 1);
}

#[test]
fn used_bytes_shrinks_on_delete() {
    let store = open_store_with_quota(StorageQuota::default());
    let k = key("form", "f1");
    store.put(&k, fields(json!({"data": "x".repeat(100)}))).unwrap();
    let before = store.used_bytes().unwrap();
    assert!(before > 0);

    store.delete(&k).unwrap();
    assert_eq!(store.used_bytes().unwrap(), 0);
}

// ── persistence ───────────────────────────────────────────────────

#[test]
fn records_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("records.db");
    let k = key("employee", "e1");
    let payload = fields(json!({"name": "A"}));

    {
        let store = RecordStore::open(
            &path,
            StorageManager::with_defaults(),
            SchemaRegistry::new(),
        )
        .unwrap();
        store.put(&k, payload.clone()).unwrap();
        store.mark_synced(&k, 1).unwrap();
    }

    let store = RecordStore::open(
        &path,
        StorageManager::with_defaults(),
        SchemaRegistry::new(),
    )
    .unwrap();
    let record = store.get(&k).unwrap().unwrap();
    assert_eq!(record.payload, payload);
    assert!(record.synced);
    assert_eq!(record.local_version, 1);
}
