//! Error types for the sync queue.

use thiserror::Error;

/// Result type for queue operations.
pub type QueueResult<T> = Result<T, QueueError>;

/// Errors that can occur in queue operations.
#[derive(Debug, Error)]
pub enum QueueError {
    /// Database error from SQLite.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Entry not found (already acknowledged or removed).
    #[error("queue entry not found: {0}")]
    NotFound(String),

    /// Persisted row can no longer be decoded.
    #[error("invalid data: {0}")]
    InvalidData(String),
}
