//! File entity model.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::kind::FileKind;

/// Who may see a file outside its owning entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "file_visibility", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    /// Visible only within the owning entity.
    Private,
    /// Visible to other entities in the same deployment.
    Internal,
    /// Publicly downloadable through presigned links.
    Public,
}

impl Visibility {
    /// Return the visibility as a lowercase string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Private => "private",
            Self::Internal => "internal",
            Self::Public => "public",
        }
    }
}

impl fmt::Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Visibility {
    type Err = coffer_core::AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "private" => Ok(Self::Private),
            "internal" => Ok(Self::Internal),
            "public" => Ok(Self::Public),
            _ => Err(coffer_core::AppError::validation(format!(
                "Invalid visibility: '{s}'. Expected one of: private, internal, public"
            ))),
        }
    }
}

/// A file stored in Coffer.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct File {
    /// Unique file identifier.
    pub id: Uuid,
    /// The entity owning this file.
    pub entity_id: Uuid,
    /// Logical path, unique within the entity.
    pub path: String,
    /// Coarse classification derived from the extension.
    pub kind: FileKind,
    /// Size of the current content in bytes.
    pub size_bytes: i64,
    /// MIME type of the current content.
    pub content_type: Option<String>,
    /// SHA-256 checksum of the current content.
    pub checksum_sha256: String,
    /// Caller-supplied tags.
    pub tags: Vec<String>,
    /// Visibility classification.
    pub visibility: Visibility,
    /// Number of retained versions.
    pub version_count: i32,
    /// Object-store locator of the current content.
    pub storage_key: String,
    /// Arbitrary metadata (JSON).
    pub metadata: Option<serde_json::Value>,
    /// When the file was created.
    pub created_at: DateTime<Utc>,
    /// When the file content or metadata last changed.
    pub updated_at: DateTime<Utc>,
}

/// Data required to create a new file record.
///
/// The id is minted by the caller so the content locator can embed it
/// before the row exists.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateFile {
    /// File identifier.
    pub id: Uuid,
    /// The owning entity.
    pub entity_id: Uuid,
    /// Logical path.
    pub path: String,
    /// Classification.
    pub kind: FileKind,
    /// Content size in bytes.
    pub size_bytes: i64,
    /// MIME type.
    pub content_type: Option<String>,
    /// SHA-256 checksum.
    pub checksum_sha256: String,
    /// Tags.
    pub tags: Vec<String>,
    /// Visibility.
    pub visibility: Visibility,
    /// Object-store locator of the content.
    pub storage_key: String,
    /// Arbitrary metadata.
    pub metadata: Option<serde_json::Value>,
}

/// Filters applied when listing an entity's files.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FileFilter {
    /// Only paths starting with this prefix.
    pub prefix: Option<String>,
    /// Only files of this kind.
    pub kind: Option<FileKind>,
    /// Only files with this visibility.
    pub visibility: Option<Visibility>,
}
