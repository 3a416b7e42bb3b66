//! Core type definitions for the fieldform offline data layer.
//!
//! This crate defines the fundamental types shared by the store, queue and
//! sync crates:
//! - Entity keys and the stable on-device storage namespace
//! - Versioned records and their payloads (typed, not free-form maps)
//! - Pending queue operations and their coalescing rules
//! - Conflict records and field-level diffs
//! - Optional per-kind payload schemas
//!
//! Everything UI-facing (form models, screen state, localization) lives in
//! the app layer, not here.

mod conflict;
mod diff;
mod entry;
mod key;
mod payload;
mod record;
mod schema;

pub use conflict::{ConflictId, ConflictRecord};
pub use diff::{diff_payloads, FieldDiff, INTERNAL_FIELDS};
pub use entry::{
    EntryId, Operation, QueueEntry, PRIORITY_DATA, PRIORITY_RESOLUTION, PRIORITY_UPLOAD,
};
pub use key::{EntityKind, RecordKey};
pub use payload::{FieldMap, Payload};
pub use record::Record;
pub use schema::{EntitySchema, FieldType, SchemaField, SchemaRegistry};

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in type operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid UUID: {0}")]
    InvalidUuid(#[from] uuid::Error),

    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    #[error("schema violation for '{kind}': {reason}")]
    SchemaViolation { kind: String, reason: String },
}
