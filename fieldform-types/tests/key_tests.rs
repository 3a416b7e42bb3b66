use fieldform_types::{EntityKind, RecordKey};
use std::collections::HashSet;

// ── EntityKind ────────────────────────────────────────────────────

#[test]
fn kind_from_str_and_display() {
    let kind = EntityKind::from("employee");
    assert_eq!(kind.as_str(), "employee");
    assert_eq!(kind.to_string(), "employee");
}

#[test]
fn kind_equality() {
    assert_eq!(EntityKind::from("form"), EntityKind::new("form"));
    assert_ne!(EntityKind::from("form"), EntityKind::from("employee"));
}

// ── RecordKey ─────────────────────────────────────────────────────

#[test]
fn storage_key_namespace() {
    let key = RecordKey::new("employee", "e1");
    assert_eq!(key.storage_key(), "offline_employee_e1");
    assert_eq!(key.to_string(), "offline_employee_e1");
}

#[test]
fn keys_hash_by_kind_and_id() {
    let mut set = HashSet::new();
    set.insert(RecordKey::new("employee", "e1"));
    set.insert(RecordKey::new("employee", "e1"));
    set.insert(RecordKey::new("form", "e1"));
    set.insert(RecordKey::new("employee", "e2"));
    assert_eq!(set.len(), 3);
}

#[test]
fn key_serialization_roundtrip() {
    let key = RecordKey::new("document", "doc-17");
    let json = serde_json::to_string(&key).unwrap();
    let parsed: RecordKey = serde_json::from_str(&json).unwrap();
    assert_eq!(key, parsed);
}
