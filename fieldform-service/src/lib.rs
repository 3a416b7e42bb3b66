//! The UI-facing offline data service for fieldform.
//!
//! `OfflineService` is the single entry point the app layer talks to: local
//! reads and writes, file attachments, sync control, conflict resolution,
//! storage stats, and backup export/import. It is constructed once per app
//! lifetime with its dependencies injected and passed by reference — there
//! is no hidden global instance.

mod config;
mod error;
mod service;

pub use config::ServiceConfig;
pub use error::{ServiceError, ServiceResult};
pub use service::{BackupDocument, ImportReport, OfflineService, StorageStats};

// The app layer drives everything through this crate; re-export the types
// its calls produce and consume.
pub use fieldform_sync::{
    ConnectionState, Resolution, SubmitBody, SubmitOutcome, SyncRunStatus, UploadOutcome,
};
pub use fieldform_types::{
    ConflictId, ConflictRecord, EntityKind, FieldDiff, Payload, Record, RecordKey,
};
