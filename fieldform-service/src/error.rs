//! Error types for the service facade.

use thiserror::Error;

/// Result type for service operations.
pub type ServiceResult<T> = Result<T, ServiceError>;

/// Errors surfaced to the app layer.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Storage error (including quota rejection).
    #[error(transparent)]
    Store(#[from] fieldform_store::StoreError),

    /// Queue error.
    #[error(transparent)]
    Queue(#[from] fieldform_queue::QueueError),

    /// Sync error.
    #[error(transparent)]
    Sync(#[from] fieldform_sync::SyncError),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error creating the data directory.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Record not found where one is required.
    #[error("record not found: {0}")]
    NotFound(String),

    /// Backup document cannot be imported.
    #[error("invalid backup: {0}")]
    InvalidBackup(String),
}
