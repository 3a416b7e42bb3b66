//! Error types for the storage layer.

use thiserror::Error;

/// Result type for storage operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur in storage operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database error from SQLite.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Record not found.
    #[error("record not found: {0}")]
    NotFound(String),

    /// Write rejected: quota exceeded even after cleanup. Not retried;
    /// surfaced to the UI so the user can act.
    #[error("storage full: {needed} bytes requested with {available} of {limit} bytes free")]
    StorageFull {
        needed: u64,
        available: u64,
        limit: u64,
    },

    /// Payload failed validation against its kind's schema.
    #[error(transparent)]
    Payload(#[from] fieldform_types::Error),

    /// Stored row can no longer be decoded.
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// IO error (file system).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
