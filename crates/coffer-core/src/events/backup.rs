//! Backup-related domain events.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Events related to backup and restore operations.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum BackupEvent {
    /// A backup completed and its manifest was committed.
    Completed {
        /// The backup ID.
        backup_id: Uuid,
        /// Number of files captured.
        file_count: u64,
        /// Number of candidates that failed and were excluded.
        failed_count: u64,
        /// Total captured size in bytes.
        total_size_bytes: i64,
    },
    /// A restore finished (possibly with per-item failures).
    Restored {
        /// The backup ID restored from.
        backup_id: Uuid,
        /// Number of files restored.
        restored_count: u64,
        /// Number of entries that failed to restore.
        failed_count: u64,
    },
    /// A backup was deleted.
    Deleted {
        /// The backup ID.
        backup_id: Uuid,
        /// Number of objects removed.
        removed_objects: u64,
    },
}
