//! Backup configuration.

use serde::{Deserialize, Serialize};

/// Backup and restore configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupConfig {
    /// Bucket holding backup objects, segregated from live content.
    #[serde(default = "default_bucket")]
    pub bucket: String,
    /// Key prefix under which backups are laid out.
    #[serde(default = "default_prefix")]
    pub prefix: String,
    /// Upper bound on concurrent per-file transfers within one backup.
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_transfers: usize,
    /// Look-back window for incremental backups, in hours.
    #[serde(default = "default_incremental_window")]
    pub incremental_window_hours: i64,
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            bucket: default_bucket(),
            prefix: default_prefix(),
            max_concurrent_transfers: default_max_concurrent(),
            incremental_window_hours: default_incremental_window(),
        }
    }
}

fn default_bucket() -> String {
    "coffer-backups".to_string()
}

fn default_prefix() -> String {
    "backups".to_string()
}

fn default_max_concurrent() -> usize {
    4
}

fn default_incremental_window() -> i64 {
    24
}
