//! File type classification.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Coarse file classification derived from the path extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "file_kind", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    /// Text and office documents.
    Document,
    /// Raster and vector images.
    Image,
    /// Video files.
    Video,
    /// Audio files.
    Audio,
    /// Compressed archives.
    Archive,
    /// Source code and scripts.
    Code,
    /// Structured data files.
    Data,
    /// Everything else.
    Other,
}

impl FileKind {
    /// Classify a logical path by its extension.
    pub fn from_path(path: &str) -> Self {
        let Some(ext) = extension(path) else {
            return Self::Other;
        };
        match ext.as_str() {
            "txt" | "md" | "rst" | "pdf" | "doc" | "docx" | "odt" | "rtf" | "ppt" | "pptx" => {
                Self::Document
            }
            "png" | "jpg" | "jpeg" | "gif" | "svg" | "webp" | "bmp" | "ico" | "tiff" => Self::Image,
            "mp4" | "mkv" | "webm" | "avi" | "mov" => Self::Video,
            "mp3" | "wav" | "ogg" | "flac" | "m4a" => Self::Audio,
            "zip" | "gz" | "gzip" | "tar" | "bz2" | "xz" | "7z" | "rar" => Self::Archive,
            "rs" | "py" | "js" | "ts" | "go" | "java" | "c" | "cpp" | "h" | "sh" | "rb" | "sql" => {
                Self::Code
            }
            "json" | "yaml" | "yml" | "toml" | "xml" | "csv" | "tsv" | "parquet" => Self::Data,
            _ => Self::Other,
        }
    }

    /// Return the kind as a lowercase string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Document => "document",
            Self::Image => "image",
            Self::Video => "video",
            Self::Audio => "audio",
            Self::Archive => "archive",
            Self::Code => "code",
            Self::Data => "data",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for FileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for FileKind {
    type Err = coffer_core::AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "document" => Ok(Self::Document),
            "image" => Ok(Self::Image),
            "video" => Ok(Self::Video),
            "audio" => Ok(Self::Audio),
            "archive" => Ok(Self::Archive),
            "code" => Ok(Self::Code),
            "data" => Ok(Self::Data),
            "other" => Ok(Self::Other),
            _ => Err(coffer_core::AppError::validation(format!(
                "Invalid file kind: '{s}'"
            ))),
        }
    }
}

/// Guess a MIME type from a path extension.
pub fn content_type_from_path(path: &str) -> Option<String> {
    let ext = extension(path)?;
    let mime = match ext.as_str() {
        "txt" | "md" => "text/plain",
        "html" | "htm" => "text/html",
        "css" => "text/css",
        "js" => "application/javascript",
        "json" => "application/json",
        "xml" => "application/xml",
        "pdf" => "application/pdf",
        "zip" => "application/zip",
        "gz" | "gzip" => "application/gzip",
        "tar" => "application/x-tar",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "webp" => "image/webp",
        "mp4" => "video/mp4",
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        "csv" => "text/csv",
        "yaml" | "yml" => "application/yaml",
        "toml" => "application/toml",
        _ => return None,
    };
    Some(mime.to_string())
}

fn extension(path: &str) -> Option<String> {
    let name = path.rsplit('/').next()?;
    name.rsplit('.')
        .next()
        .filter(|ext| *ext != name)
        .map(|ext| ext.to_lowercase())
}
