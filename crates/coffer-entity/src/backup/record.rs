//! Backup operation result records.
//!
//! These are plain serializable results handed back to the task-runner
//! collaborator; they are not persisted by the engine.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::manifest::BackupType;

/// Terminal status of a backup run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackupStatus {
    /// The manifest was committed; `failed_count` may still be non-zero.
    Completed,
    /// The backup produced no manifest and is nonexistent.
    Failed,
}

impl fmt::Display for BackupStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Result record of a backup run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupRecord {
    /// Backup identifier.
    pub backup_id: Uuid,
    /// Full or incremental.
    pub backup_type: BackupType,
    /// Terminal status.
    pub status: BackupStatus,
    /// Files captured in the manifest.
    pub file_count: u64,
    /// Candidates that failed and were excluded.
    pub failed_count: u64,
    /// Total captured size in bytes.
    pub total_size_bytes: i64,
    /// Error detail for a failed run.
    pub error: Option<String>,
    /// When the run started.
    pub created_at: DateTime<Utc>,
}

/// Result record of a restore run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestoreReport {
    /// The backup restored from.
    pub backup_id: Uuid,
    /// Files restored.
    pub restored_count: u64,
    /// Entries that failed to restore (restored files stay in place).
    pub failed_count: u64,
    /// Per-entry failure descriptions.
    pub errors: Vec<String>,
}

/// Result of the three independent backup verification checks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupVerification {
    /// The verified backup.
    pub backup_id: Uuid,
    /// The manifest is readable, parseable, and internally consistent.
    pub manifest_valid: bool,
    /// Every listed backup object exists.
    pub files_present: bool,
    /// The recomputed manifest checksum matches the recorded one.
    pub checksum_valid: bool,
    /// Keys listed in the manifest but missing from the store.
    pub missing_keys: Vec<String>,
}

impl BackupVerification {
    /// Overall verdict: all three checks passed.
    pub fn passed(&self) -> bool {
        self.manifest_valid && self.files_present && self.checksum_valid
    }
}
