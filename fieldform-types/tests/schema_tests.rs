use fieldform_types::{EntitySchema, EntityKind, Payload, SchemaField, SchemaRegistry};
use serde_json::json;

fn employee_schema() -> EntitySchema {
    EntitySchema::new(
        "employee",
        vec![
            SchemaField::text("name", true),
            SchemaField::number("badge", false),
            SchemaField::bool("active", false),
            SchemaField::json("documents", false),
        ],
    )
}

fn fields(value: serde_json::Value) -> Payload {
    Payload::from_value(value).unwrap()
}

// ── EntitySchema ──────────────────────────────────────────────────

#[test]
fn valid_payload_passes() {
    let schema = employee_schema();
    let payload = fields(json!({"name": "A", "badge": 12, "active": true}));
    assert!(schema.validate(&payload).is_ok());
}

#[test]
fn missing_required_field_fails() {
    let schema = employee_schema();
    let payload = fields(json!({"badge": 12}));
    let err = schema.validate(&payload).unwrap_err();
    assert!(err.to_string().contains("name"));
}

#[test]
fn null_required_field_fails() {
    let schema = employee_schema();
    let payload = fields(json!({"name": null}));
    assert!(schema.validate(&payload).is_err());
}

#[test]
fn wrong_type_fails() {
    let schema = employee_schema();
    let payload = fields(json!({"name": "A", "badge": "twelve"}));
    let err = schema.validate(&payload).unwrap_err();
    assert!(err.to_string().contains("badge"));
}

#[test]
fn optional_fields_may_be_absent() {
    let schema = employee_schema();
    let payload = fields(json!({"name": "A"}));
    assert!(schema.validate(&payload).is_ok());
}

#[test]
fn json_fields_accept_any_shape() {
    let schema = employee_schema();
    let payload = fields(json!({"name": "A", "documents": [{"id": 1}, {"id": 2}]}));
    assert!(schema.validate(&payload).is_ok());
}

#[test]
fn unknown_fields_are_allowed() {
    let schema = employee_schema();
    let payload = fields(json!({"name": "A", "extra": "ignored"}));
    assert!(schema.validate(&payload).is_ok());
}

#[test]
fn blob_payloads_pass_schema_validation() {
    let schema = employee_schema();
    let payload = Payload::blob(b"img", "image/jpeg");
    assert!(schema.validate(&payload).is_ok());
}

// ── SchemaRegistry ────────────────────────────────────────────────

#[test]
fn registry_validates_registered_kinds() {
    let mut registry = SchemaRegistry::new();
    registry.register(employee_schema());

    let kind = EntityKind::from("employee");
    assert!(registry.validate(&kind, &fields(json!({"name": "A"}))).is_ok());
    assert!(registry.validate(&kind, &fields(json!({}))).is_err());
}

#[test]
fn unregistered_kinds_always_pass() {
    let registry = SchemaRegistry::new();
    let kind = EntityKind::from("scratchpad");
    assert!(registry.validate(&kind, &fields(json!({"anything": 1}))).is_ok());
}

#[test]
fn register_replaces_existing_schema() {
    let mut registry = SchemaRegistry::new();
    registry.register(employee_schema());
    registry.register(EntitySchema::new("employee", vec![]));
    assert_eq!(registry.get(&EntityKind::from("employee")).unwrap().fields.len(), 0);
}
