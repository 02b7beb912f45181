//! Progress reporting for long-running backup and restore runs.
//!
//! The callback is invoked with monotonically increasing `completed`
//! counts; cancellation is the task-runner collaborator's concern, not
//! the engine's.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A progress snapshot for one backup or restore run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupProgress {
    /// The run being reported on.
    pub backup_id: Uuid,
    /// Items finished so far (success or failure).
    pub completed: u64,
    /// Total items in the run.
    pub total: u64,
}

/// Callback receiving progress snapshots.
pub type ProgressCallback = Arc<dyn Fn(BackupProgress) + Send + Sync>;
