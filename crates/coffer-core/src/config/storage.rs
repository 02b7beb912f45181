//! Object-store configuration.

use serde::{Deserialize, Serialize};

/// Top-level object-store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Object-store provider to use: `"local"` or `"s3"`.
    #[serde(default = "default_provider")]
    pub provider: String,
    /// Bucket holding current file content and version objects.
    #[serde(default = "default_bucket")]
    pub bucket: String,
    /// Key prefix under which version objects are stored.
    #[serde(default = "default_versions_prefix")]
    pub versions_prefix: String,
    /// Lifetime of presigned download URLs in seconds (default 1 hour).
    #[serde(default = "default_presign_ttl")]
    pub presign_ttl_seconds: u64,
    /// Maximum upload size in bytes (default 5 GB).
    #[serde(default = "default_max_upload")]
    pub max_upload_size_bytes: u64,
    /// Local filesystem backend configuration.
    #[serde(default)]
    pub local: LocalStorageConfig,
    /// S3-compatible backend configuration.
    #[serde(default)]
    pub s3: S3StorageConfig,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            bucket: default_bucket(),
            versions_prefix: default_versions_prefix(),
            presign_ttl_seconds: default_presign_ttl(),
            max_upload_size_bytes: default_max_upload(),
            local: LocalStorageConfig::default(),
            s3: S3StorageConfig::default(),
        }
    }
}

/// Local filesystem backend configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalStorageConfig {
    /// Root path under which buckets are created as directories.
    #[serde(default = "default_local_root")]
    pub root_path: String,
}

impl Default for LocalStorageConfig {
    fn default() -> Self {
        Self {
            root_path: default_local_root(),
        }
    }
}

/// S3-compatible object-store configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct S3StorageConfig {
    /// S3 endpoint URL (for non-AWS services like MinIO).
    #[serde(default)]
    pub endpoint: String,
    /// AWS region.
    #[serde(default = "default_region")]
    pub region: String,
    /// Access key ID.
    #[serde(default)]
    pub access_key: String,
    /// Secret access key.
    #[serde(default)]
    pub secret_key: String,
    /// Use path-style addressing (required by most S3-compatible services).
    #[serde(default = "default_true")]
    pub force_path_style: bool,
}

fn default_provider() -> String {
    "local".to_string()
}

fn default_bucket() -> String {
    "coffer-files".to_string()
}

fn default_versions_prefix() -> String {
    "versions".to_string()
}

fn default_presign_ttl() -> u64 {
    3600
}

fn default_max_upload() -> u64 {
    5_368_709_120 // 5 GB
}

fn default_local_root() -> String {
    "./data/storage".to_string()
}

fn default_region() -> String {
    "us-east-1".to_string()
}

fn default_true() -> bool {
    true
}
