//! Error types for the sync layer.

use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur in sync operations.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Transport-level network error. Always treated as transient.
    #[error("network error: {0}")]
    Network(String),

    /// Remote call timed out. Treated as transient.
    #[error("operation timed out")]
    Timeout,

    /// Storage error.
    #[error("storage error: {0}")]
    Store(#[from] fieldform_store::StoreError),

    /// Queue error.
    #[error("queue error: {0}")]
    Queue(#[from] fieldform_queue::QueueError),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Connectivity channel closed (monitor dropped).
    #[error("channel closed")]
    ChannelClosed,
}

impl SyncError {
    /// Whether this error is worth retrying with backoff. Everything a
    /// remote returns as an outcome is definitive; only transport trouble
    /// is transient.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Network(_) | Self::Timeout)
    }
}
