//! On-device storage layer for fieldform.
//!
//! Persists versioned records in a single SQLite file so form data written
//! in the field survives process restarts. The store is wrapped by a
//! storage manager that enforces a byte quota, runs retention cleanup over
//! synced records, and applies transparent (pluggable) compression.
//!
//! # Architecture
//!
//! - Records are stored as compressed payload blobs keyed by the stable
//!   `offline_<kind>_<id>` namespace
//! - Secondary indexes by kind and sync flag stand in for the key index of
//!   the persisted layout
//! - Quota admission runs before every write; cleanup runs opportunistically
//!   when a write would breach the cleanup threshold

mod compress;
mod error;
mod manager;
mod record_store;

pub use compress::{Compressor, DeflateCompressor, NoopCompressor};
pub use error::{StoreError, StoreResult};
pub use manager::{StorageManager, StorageQuota};
pub use record_store::{CleanupReport, RecordStore, StoreCounts};
