//! Storage quota and retention policy.
//!
//! The manager is policy, the record store is mechanism: the store asks the
//! manager whether a write fits, how payload bytes are encoded at rest, and
//! which records have aged out of the retention window.

use crate::compress::{Compressor, DeflateCompressor};
use crate::error::{StoreError, StoreResult};
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tracing::warn;

/// Storage ceiling and retention configuration.
#[derive(Debug, Clone)]
pub struct StorageQuota {
    /// Hard ceiling on total persisted payload bytes.
    pub max_bytes: u64,
    /// Fraction of `max_bytes` cleanup tries to get usage back under.
    pub cleanup_threshold: f64,
    /// How long synced records are kept before becoming cleanup candidates.
    pub retention: Duration,
}

impl Default for StorageQuota {
    fn default() -> Self {
        Self {
            max_bytes: 100 * 1024 * 1024, // 100 MB
            cleanup_threshold: 0.80,
            retention: Duration::days(30),
        }
    }
}

/// Enforces the storage quota and encodes payload bytes at rest.
pub struct StorageManager {
    quota: StorageQuota,
    compressor: Arc<dyn Compressor>,
}

impl StorageManager {
    /// Creates a manager with the given quota and compression strategy.
    #[must_use]
    pub fn new(quota: StorageQuota, compressor: Arc<dyn Compressor>) -> Self {
        Self { quota, compressor }
    }

    /// Default quota with deflate compression.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(StorageQuota::default(), Arc::new(DeflateCompressor::new()))
    }

    /// Returns the configured quota.
    #[must_use]
    pub fn quota(&self) -> &StorageQuota {
        &self.quota
    }

    /// The usage level cleanup sweeps back down to.
    #[must_use]
    pub fn target_bytes(&self) -> u64 {
        (self.quota.max_bytes as f64 * self.quota.cleanup_threshold) as u64
    }

    /// Oldest `updated_at` a synced record may have before it is a cleanup
    /// candidate.
    #[must_use]
    pub fn retention_cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - self.quota.retention
    }

    /// Admission check for a write of `incoming` bytes given current usage.
    /// `replaced` is the size of the row the write overwrites, if any.
    pub fn check_quota(&self, used: u64, replaced: u64, incoming: u64) -> StoreResult<()> {
        let projected = used.saturating_sub(replaced).saturating_add(incoming);
        if projected > self.quota.max_bytes {
            return Err(StoreError::StorageFull {
                needed: incoming,
                available: self.quota.max_bytes.saturating_sub(used.saturating_sub(replaced)),
                limit: self.quota.max_bytes,
            });
        }
        Ok(())
    }

    /// Whether a write of `incoming` bytes should trigger a cleanup sweep
    /// first (projected usage past the cleanup threshold).
    #[must_use]
    pub fn wants_cleanup(&self, used: u64, replaced: u64, incoming: u64) -> bool {
        used.saturating_sub(replaced).saturating_add(incoming) > self.target_bytes()
    }

    /// Encodes payload bytes for storage. Returns the stored bytes and
    /// whether they are compressed.
    ///
    /// A compressor error, or output no smaller than the input, degrades to
    /// storing the raw bytes.
    pub fn encode(&self, raw: &[u8]) -> (Vec<u8>, bool) {
        match self.compressor.compress(raw) {
            Ok(packed) if packed.len() < raw.len() => (packed, true),
            Ok(_) => (raw.to_vec(), false),
            Err(e) => {
                warn!(
                    compressor = self.compressor.name(),
                    "compression failed, storing uncompressed: {e}"
                );
                (raw.to_vec(), false)
            }
        }
    }

    /// Decodes stored bytes back to the raw payload encoding.
    pub fn decode(&self, stored: &[u8], compressed: bool) -> StoreResult<Vec<u8>> {
        if !compressed {
            return Ok(stored.to_vec());
        }
        self.compressor.decompress(stored).map_err(|e| {
            StoreError::InvalidData(format!(
                "failed to decompress stored payload with {}: {e}",
                self.compressor.name()
            ))
        })
    }
}
