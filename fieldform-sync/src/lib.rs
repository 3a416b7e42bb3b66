//! Sync layer for fieldform.
//!
//! Drains the pending-operation queue against the remote API whenever the
//! device is online, detects version conflicts, and owns their resolution.
//!
//! # Components
//!
//! - **Monitor**: connectivity state with exactly-once reconnect edges
//! - **Remote**: the async contract the app's API client implements
//! - **Engine**: the serialized drain loop; one active run at a time
//! - **Resolver**: field-level diffs and the three resolution strategies
//!
//! # Sync process
//!
//! 1. A mutation lands in the record store and the sync queue
//! 2. The monitor reports the device back online
//! 3. The engine drains ready entries in priority order, one remote call
//!    at a time
//! 4. Each entry settles: acknowledged, conflicted, rejected, or backed
//!    off for retry
//!
//! Conflicts never resolve silently — they sit in the open set until the
//! UI (or a policy) picks a side.

mod conflict;
mod engine;
mod error;
mod monitor;
mod remote;
mod resolver;

pub use conflict::ConflictSet;
pub use engine::{DrainReport, FailedOperation, SyncConfig, SyncEngine, SyncRunStatus};
pub use error::{SyncError, SyncResult};
pub use monitor::{ConnectionState, NetworkListener, NetworkMonitor};
pub use remote::{FileMetadata, RemoteApi, SubmitBody, SubmitOutcome, UploadOutcome};
pub use resolver::{ConflictResolver, Resolution};
