//! File management.

pub mod manager;

pub use manager::{DownloadLink, FileManager, UploadParams};
