//! File-related domain events.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Events related to file operations.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum FileEvent {
    /// A file's content was uploaded (created or overwritten).
    Uploaded {
        /// The file ID.
        file_id: Uuid,
        /// The owning entity.
        entity_id: Uuid,
        /// The logical path.
        path: String,
        /// The file size in bytes.
        size_bytes: i64,
        /// The version number this upload produced.
        version_number: i32,
    },
    /// A file was deleted along with its version history.
    Deleted {
        /// The file ID.
        file_id: Uuid,
        /// The owning entity.
        entity_id: Uuid,
        /// The logical path (for display after deletion).
        path: String,
    },
    /// A file was moved to a new logical path.
    Moved {
        /// The file ID.
        file_id: Uuid,
        /// The owning entity.
        entity_id: Uuid,
        /// The source path.
        from: String,
        /// The destination path.
        to: String,
    },
}
