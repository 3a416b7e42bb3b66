//! Durable sync queue for fieldform.
//!
//! Every local mutation lands here as a pending operation. The queue lives
//! in its own SQLite file (isolated from the record store) so pending work
//! survives restarts, coalesces per record key, and drains in
//! `(priority, enqueued_at)` order with exponential backoff on transient
//! failures.

mod backoff;
mod error;
mod queue;

pub use backoff::{backoff_delay, BASE_DELAY_SECS, MAX_DELAY_SECS};
pub use error::{QueueError, QueueResult};
pub use queue::{FailOutcome, SyncQueue, DEFAULT_ATTEMPTS_CEILING, DEFAULT_BATCH_SIZE};
