//! Backup manifest — the immutable description of a backup's file set.
//!
//! The manifest object is the durability commit record of a backup: it is
//! written last during creation and removed first during deletion, so a
//! backup without a readable manifest is treated as nonexistent.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use coffer_core::checksum;

/// Backup scope selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackupType {
    /// All candidate files.
    Full,
    /// Only files modified within the configured look-back window.
    Incremental,
}

impl BackupType {
    /// Return the type as a lowercase string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Incremental => "incremental",
        }
    }
}

impl fmt::Display for BackupType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for BackupType {
    type Err = coffer_core::AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "full" => Ok(Self::Full),
            "incremental" => Ok(Self::Incremental),
            _ => Err(coffer_core::AppError::validation(format!(
                "Invalid backup type: '{s}'. Expected one of: full, incremental"
            ))),
        }
    }
}

/// One file captured in a backup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    /// The entity that owned the file at capture time.
    pub entity_id: Uuid,
    /// The file's logical path.
    pub path: String,
    /// Object key of the captured content inside the backup bucket.
    pub key: String,
    /// Captured size in bytes.
    pub size_bytes: i64,
    /// Captured content checksum.
    pub checksum_sha256: String,
}

/// The immutable description of a backup's file set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupManifest {
    /// Backup identifier.
    pub backup_id: Uuid,
    /// Full or incremental.
    pub backup_type: BackupType,
    /// When the backup was created.
    pub created_at: DateTime<Utc>,
    /// Captured files, sorted by (entity_id, path).
    pub entries: Vec<ManifestEntry>,
    /// Number of captured files.
    pub file_count: u64,
    /// Total captured size in bytes.
    pub total_size_bytes: i64,
    /// Checksum over the sorted entry list; never recomputed in place.
    pub checksum_sha256: String,
}

impl BackupManifest {
    /// Assemble a manifest from captured entries, sorting them and
    /// computing the manifest checksum.
    pub fn assemble(
        backup_id: Uuid,
        backup_type: BackupType,
        created_at: DateTime<Utc>,
        mut entries: Vec<ManifestEntry>,
    ) -> Self {
        entries.sort_by(|a, b| (a.entity_id, &a.path).cmp(&(b.entity_id, &b.path)));
        let file_count = entries.len() as u64;
        let total_size_bytes = entries.iter().map(|e| e.size_bytes).sum();
        let checksum_sha256 = Self::compute_checksum(backup_id, backup_type, &entries);
        Self {
            backup_id,
            backup_type,
            created_at,
            entries,
            file_count,
            total_size_bytes,
            checksum_sha256,
        }
    }

    /// Compute the deterministic checksum over a sorted entry list.
    pub fn compute_checksum(
        backup_id: Uuid,
        backup_type: BackupType,
        entries: &[ManifestEntry],
    ) -> String {
        let mut canonical = format!("{backup_id}\n{backup_type}\n");
        for entry in entries {
            canonical.push_str(&format!(
                "{}\t{}\t{}\t{}\t{}\n",
                entry.entity_id, entry.path, entry.key, entry.size_bytes, entry.checksum_sha256
            ));
        }
        checksum::sha256_hex(canonical.as_bytes())
    }

    /// Recompute the checksum and compare it to the recorded one.
    pub fn checksum_valid(&self) -> bool {
        Self::compute_checksum(self.backup_id, self.backup_type, &self.entries)
            == self.checksum_sha256
    }

    /// Whether the manifest's counts agree with its entry list.
    pub fn counts_consistent(&self) -> bool {
        self.file_count == self.entries.len() as u64
            && self.total_size_bytes == self.entries.iter().map(|e| e.size_bytes).sum::<i64>()
    }
}
