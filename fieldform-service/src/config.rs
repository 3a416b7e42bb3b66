//! Service configuration.

use fieldform_store::StorageQuota;
use fieldform_sync::SyncConfig;
use std::path::PathBuf;
use std::time::Duration;

/// Tunables for one `OfflineService` instance.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Directory holding the record store and queue database files.
    pub data_dir: PathBuf,

    /// Storage ceiling and retention policy.
    pub quota: StorageQuota,

    /// Sync engine tunables.
    pub sync: SyncConfig,

    /// How often scheduled retention cleanup runs.
    pub cleanup_interval: Duration,

    /// Whether payloads are deflate-compressed at rest. Disable for data
    /// that is already compressed (mostly photos) or for debugging.
    pub compression: bool,
}

impl ServiceConfig {
    /// Defaults rooted at the given data directory: 100 MB quota, 30-day
    /// retention, weekly cleanup, compression on.
    #[must_use]
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            quota: StorageQuota::default(),
            sync: SyncConfig::default(),
            cleanup_interval: Duration::from_secs(7 * 24 * 60 * 60),
            compression: true,
        }
    }
}
