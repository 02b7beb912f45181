//! File version entity.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// One committed revision of a file's content.
///
/// Version numbers are strictly increasing from 1 and immutable once
/// created. `is_latest` is derived at query time and never stored.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct FileVersion {
    /// Unique version identifier.
    pub id: Uuid,
    /// The file this version belongs to.
    pub file_id: Uuid,
    /// Sequential version number, starting at 1.
    pub version_number: i32,
    /// Object-store locator of this version's content.
    pub storage_key: String,
    /// Size in bytes.
    pub size_bytes: i64,
    /// SHA-256 checksum.
    pub checksum_sha256: String,
    /// Optional comment describing the change.
    pub comment: Option<String>,
    /// Who created this version.
    pub author: Option<String>,
    /// When this version was created.
    pub created_at: DateTime<Utc>,
    /// Whether this is the newest version of its file (derived).
    #[sqlx(default)]
    #[serde(default)]
    pub is_latest: bool,
}

/// Data required to append a new version.
///
/// The id is minted by the caller so the version's object key can embed
/// it before the row exists.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateFileVersion {
    /// Version identifier.
    pub id: Uuid,
    /// The file the version belongs to.
    pub file_id: Uuid,
    /// Sequential version number.
    pub version_number: i32,
    /// Object-store locator.
    pub storage_key: String,
    /// Size in bytes.
    pub size_bytes: i64,
    /// SHA-256 checksum.
    pub checksum_sha256: String,
    /// Optional comment.
    pub comment: Option<String>,
    /// Author.
    pub author: Option<String>,
}

/// Result of comparing two versions of one file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionDiff {
    /// The lower version number compared.
    pub version_a: i32,
    /// The higher version number compared.
    pub version_b: i32,
    /// Size difference in bytes (`b - a`).
    pub size_delta: i64,
    /// Whether the recomputed checksums differ.
    pub checksum_differs: bool,
}

/// Result of a retention cleanup sweep.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CleanupReport {
    /// Files examined for excess versions.
    pub files_examined: u64,
    /// Versions deleted in this sweep.
    pub versions_deleted: u64,
    /// Whether the sweep stopped early because the per-call deletion
    /// budget was exhausted.
    pub truncated: bool,
}
