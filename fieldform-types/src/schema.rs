//! Optional per-kind payload schemas.
//!
//! A registered schema lets the store reject malformed field payloads at
//! write time instead of at sync time, when the user is long gone from the
//! screen that produced them. Kinds without a registered schema are
//! accepted as-is.

use crate::{EntityKind, Error, Payload, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Describes the expected shape of one entity kind's field payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntitySchema {
    pub kind: EntityKind,
    pub fields: Vec<SchemaField>,
}

impl EntitySchema {
    /// Creates a schema for a kind.
    #[must_use]
    pub fn new(kind: impl Into<EntityKind>, fields: Vec<SchemaField>) -> Self {
        Self {
            kind: kind.into(),
            fields,
        }
    }

    /// Validates a payload against this schema.
    ///
    /// Blob payloads are not field-structured and pass untouched; uploads
    /// are validated by size at the store layer instead.
    pub fn validate(&self, payload: &Payload) -> Result<()> {
        let Some(map) = payload.fields() else {
            return Ok(());
        };

        for field in &self.fields {
            match map.get(&field.name) {
                None | Some(Value::Null) if field.required => {
                    return Err(self.violation(format!("missing required field '{}'", field.name)));
                }
                None | Some(Value::Null) => {}
                Some(value) => {
                    if !field.field_type.matches(value) {
                        return Err(self.violation(format!(
                            "field '{}' is not a {}",
                            field.name,
                            field.field_type.name()
                        )));
                    }
                }
            }
        }
        Ok(())
    }

    fn violation(&self, reason: String) -> Error {
        Error::SchemaViolation {
            kind: self.kind.to_string(),
            reason,
        }
    }
}

/// One expected field in a schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaField {
    pub name: String,
    pub field_type: FieldType,
    pub required: bool,
}

impl SchemaField {
    fn simple(name: &str, field_type: FieldType, required: bool) -> Self {
        Self {
            name: name.into(),
            field_type,
            required,
        }
    }

    /// Shorthand for a text field.
    pub fn text(name: &str, required: bool) -> Self {
        Self::simple(name, FieldType::Text, required)
    }

    /// Shorthand for a numeric field.
    pub fn number(name: &str, required: bool) -> Self {
        Self::simple(name, FieldType::Number, required)
    }

    /// Shorthand for a boolean field.
    pub fn bool(name: &str, required: bool) -> Self {
        Self::simple(name, FieldType::Bool, required)
    }

    /// Shorthand for a nested JSON field (arrays, objects, anything).
    pub fn json(name: &str, required: bool) -> Self {
        Self::simple(name, FieldType::Json, required)
    }
}

/// The accepted JSON type of a schema field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    Text,
    Number,
    Bool,
    Json,
}

impl FieldType {
    fn matches(self, value: &Value) -> bool {
        match self {
            Self::Text => value.is_string(),
            Self::Number => value.is_number(),
            Self::Bool => value.is_boolean(),
            Self::Json => true,
        }
    }

    fn name(self) -> &'static str {
        match self {
            Self::Text => "string",
            Self::Number => "number",
            Self::Bool => "boolean",
            Self::Json => "json value",
        }
    }
}

/// Registry of schemas keyed by entity kind.
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    schemas: HashMap<EntityKind, EntitySchema>,
}

impl SchemaRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers (or replaces) the schema for a kind.
    pub fn register(&mut self, schema: EntitySchema) {
        self.schemas.insert(schema.kind.clone(), schema);
    }

    /// Returns the schema for a kind, if registered.
    #[must_use]
    pub fn get(&self, kind: &EntityKind) -> Option<&EntitySchema> {
        self.schemas.get(kind)
    }

    /// Validates a payload against the registered schema for its kind.
    /// Unregistered kinds always pass.
    pub fn validate(&self, kind: &EntityKind, payload: &Payload) -> Result<()> {
        match self.schemas.get(kind) {
            Some(schema) => schema.validate(payload),
            None => Ok(()),
        }
    }
}
