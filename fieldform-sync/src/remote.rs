//! The remote API contract.
//!
//! The app's HTTP client implements this trait; the sync layer only decides
//! when and what to send. Implementations return the definitive server
//! answers (`Conflict`, `Rejected`) as outcomes, and reserve `Err` for
//! transport problems — timeouts and connection errors — which the engine
//! retries with backoff.

use crate::error::SyncResult;
use async_trait::async_trait;
use fieldform_types::{Payload, RecordKey};
use serde::{Deserialize, Serialize};

/// Body of a record submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", content = "payload", rename_all = "snake_case")]
pub enum SubmitBody {
    /// Create or update with the given payload.
    Put(Payload),
    /// Tombstone: the server should delete the record.
    Delete,
}

/// Server answer to a record submission.
#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    /// The server accepted the write and assigned a new version.
    Accepted { new_version: u64 },

    /// The server's current version differs from the submitted base; the
    /// write was not applied.
    Conflict {
        server_payload: Payload,
        server_version: u64,
    },

    /// The server rejected the write permanently (validation failure).
    Rejected { reason: String },
}

/// Server answer to a file upload.
#[derive(Debug, Clone, PartialEq)]
pub enum UploadOutcome {
    /// Upload stored; the server returns its canonical URL.
    Accepted { url: String },

    /// Upload rejected permanently (too large, wrong type).
    Rejected { reason: String },
}

/// Metadata accompanying a file upload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileMetadata {
    pub file_name: String,
    pub content_type: String,
    pub byte_size: u64,
}

/// The remote endpoints this layer drains against.
#[async_trait]
pub trait RemoteApi: Send + Sync {
    /// Submits a record write with the client's base version. The server
    /// compares the base against its current version and reports a
    /// conflict instead of applying a stale write.
    async fn submit(
        &self,
        key: &RecordKey,
        body: SubmitBody,
        expected_base_version: u64,
    ) -> SyncResult<SubmitOutcome>;

    /// Uploads a file attachment.
    async fn upload_file(
        &self,
        key: &RecordKey,
        bytes: Vec<u8>,
        metadata: FileMetadata,
    ) -> SyncResult<UploadOutcome>;
}
