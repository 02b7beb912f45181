//! Object-store trait for pluggable blob backends.

use std::collections::HashMap;
use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;

use crate::result::AppResult;

/// Metadata about a stored object.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ObjectInfo {
    /// Key within its bucket.
    pub key: String,
    /// Size in bytes.
    pub size_bytes: u64,
    /// Backend entity tag, if the backend exposes one.
    pub etag: Option<String>,
    /// Last modified timestamp.
    pub last_modified: Option<chrono::DateTime<chrono::Utc>>,
}

/// Result of a successful `put`.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct PutOutcome {
    /// The key the object was written under.
    pub key: String,
    /// Backend entity tag, if any.
    pub etag: Option<String>,
}

/// Inclusive byte range for partial reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    /// First byte offset.
    pub start: u64,
    /// Last byte offset (inclusive); `None` reads to the end.
    pub end: Option<u64>,
}

impl ByteRange {
    /// Render as an HTTP `Range` header value.
    pub fn to_header(&self) -> String {
        match self.end {
            Some(end) => format!("bytes={}-{end}", self.start),
            None => format!("bytes={}-", self.start),
        }
    }
}

/// A byte stream type used for reading object contents.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, std::io::Error>> + Send>>;

/// Trait for object-store backends.
///
/// Backend faults are translated into exactly three error kinds:
/// `NotFound`, `Unavailable` (retryable) and `Validation` (the adapter's
/// invalid-request class, non-retryable). No retry is attempted at this
/// layer; retry policy belongs to callers. Every call is duration-logged.
#[async_trait]
pub trait ObjectStore: Send + Sync + std::fmt::Debug + 'static {
    /// Return the provider type name (e.g., "local", "s3").
    fn provider_type(&self) -> &str;

    /// Check whether the backend is healthy and reachable.
    async fn health_check(&self) -> AppResult<bool>;

    /// Create a bucket. Succeeds if the bucket already exists.
    async fn create_bucket(&self, bucket: &str) -> AppResult<()>;

    /// Delete an empty bucket.
    async fn delete_bucket(&self, bucket: &str) -> AppResult<()>;

    /// Check whether a bucket exists.
    async fn bucket_exists(&self, bucket: &str) -> AppResult<bool>;

    /// Write an object and return its key and entity tag.
    async fn put(
        &self,
        bucket: &str,
        key: &str,
        data: Bytes,
        content_type: Option<&str>,
        metadata: Option<&HashMap<String, String>>,
    ) -> AppResult<PutOutcome>;

    /// Read an object (optionally a byte range) as a stream.
    async fn get(&self, bucket: &str, key: &str, range: Option<ByteRange>)
    -> AppResult<ByteStream>;

    /// Read an object fully into memory.
    async fn get_bytes(&self, bucket: &str, key: &str) -> AppResult<Bytes>;

    /// Remove an object. Removing a missing object is not an error.
    async fn remove(&self, bucket: &str, key: &str) -> AppResult<()>;

    /// List objects under a prefix. With `recursive` false, only the
    /// immediate children of the prefix are returned.
    async fn list(&self, bucket: &str, prefix: &str, recursive: bool)
    -> AppResult<Vec<ObjectInfo>>;

    /// Get metadata about one object.
    async fn stat(&self, bucket: &str, key: &str) -> AppResult<ObjectInfo>;

    /// Issue a time-boxed read URL for an object.
    async fn presign_get(
        &self,
        bucket: &str,
        key: &str,
        expires_in: Duration,
    ) -> AppResult<String>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_range_header() {
        let full = ByteRange {
            start: 0,
            end: Some(99),
        };
        assert_eq!(full.to_header(), "bytes=0-99");

        let open = ByteRange {
            start: 512,
            end: None,
        };
        assert_eq!(open.to_header(), "bytes=512-");
    }
}
