//! File domain entities.

pub mod kind;
pub mod model;
pub mod version;

pub use kind::FileKind;
pub use model::{CreateFile, File, FileFilter, Visibility};
pub use version::{CleanupReport, CreateFileVersion, FileVersion, VersionDiff};
