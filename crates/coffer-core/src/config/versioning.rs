//! Version-retention configuration.

use serde::{Deserialize, Serialize};

/// Version history retention settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersioningConfig {
    /// Retention cap: maximum versions retained per file.
    #[serde(default = "default_max_versions")]
    pub max_versions: i64,
    /// Upper bound on deletions performed by one retention sweep.
    #[serde(default = "default_cleanup_batch")]
    pub cleanup_batch_limit: u64,
}

impl Default for VersioningConfig {
    fn default() -> Self {
        Self {
            max_versions: default_max_versions(),
            cleanup_batch_limit: default_cleanup_batch(),
        }
    }
}

fn default_max_versions() -> i64 {
    10
}

fn default_cleanup_batch() -> u64 {
    100
}
