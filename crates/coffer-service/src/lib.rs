//! # coffer-service
//!
//! The Coffer engine managers. Each manager orchestrates repositories,
//! the cache layer, and the object store to implement one slice of the
//! engine: file CRUD, version history, and backup/restore.
//!
//! Managers follow constructor injection — all dependencies are provided
//! at construction time via `Arc` references.

pub mod backup;
pub mod file;
pub mod locks;
pub mod version;

pub use backup::{
    ActiveBackups, BackupManager, BackupProgress, CreateBackupParams, ProgressCallback,
    RestoreBackupParams,
};
pub use file::{DownloadLink, FileManager, UploadParams};
pub use version::VersionManager;
