//! Local filesystem object store.
//!
//! Buckets are directories under a configured root; object keys map to
//! relative paths. This backend doubles as the test double for the S3
//! adapter, so it mirrors S3 semantics: puts never fail on missing
//! parents, removes of missing keys succeed, and `list` filters by key
//! prefix rather than by directory.

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio_util::io::ReaderStream;
use tracing::debug;

use coffer_core::checksum;
use coffer_core::error::{AppError, ErrorKind};
use coffer_core::result::AppResult;
use coffer_core::traits::object_store::{
    ByteRange, ByteStream, ObjectInfo, ObjectStore, PutOutcome,
};

/// Filesystem-backed object store.
#[derive(Debug, Clone)]
pub struct LocalObjectStore {
    /// Root directory under which buckets live.
    root: PathBuf,
}

impl LocalObjectStore {
    /// Create a new local object store rooted at the given path.
    pub async fn new(root_path: &str) -> AppResult<Self> {
        let root = PathBuf::from(root_path);
        fs::create_dir_all(&root).await.map_err(|e| {
            AppError::with_source(
                ErrorKind::Operation,
                format!("Failed to create storage root: {}", root.display()),
                e,
            )
        })?;
        Ok(Self { root })
    }

    /// Resolve a bucket + key to an absolute path, refusing traversal.
    fn resolve(&self, bucket: &str, key: &str) -> AppResult<PathBuf> {
        for segment in key.split('/') {
            if segment == ".." {
                return Err(AppError::validation(format!(
                    "Object key contains a traversal segment: {key}"
                )));
            }
        }
        Ok(self.root.join(bucket).join(key.trim_start_matches('/')))
    }

    fn bucket_dir(&self, bucket: &str) -> PathBuf {
        self.root.join(bucket)
    }

    /// Walk a bucket directory and collect every file key.
    async fn walk_keys(&self, bucket: &str) -> AppResult<Vec<(String, std::fs::Metadata)>> {
        let base = self.bucket_dir(bucket);
        if !base.is_dir() {
            return Err(AppError::not_found(format!("Bucket not found: {bucket}")));
        }

        let mut out = Vec::new();
        let mut stack = vec![base.clone()];
        while let Some(dir) = stack.pop() {
            let mut entries = fs::read_dir(&dir).await.map_err(|e| {
                AppError::with_source(
                    ErrorKind::Operation,
                    format!("Failed to read directory: {}", dir.display()),
                    e,
                )
            })?;
            while let Some(entry) = entries.next_entry().await.map_err(|e| {
                AppError::with_source(ErrorKind::Operation, "Failed to read directory entry", e)
            })? {
                let meta = entry.metadata().await.map_err(|e| {
                    AppError::with_source(ErrorKind::Operation, "Failed to read entry metadata", e)
                })?;
                if meta.is_dir() {
                    stack.push(entry.path());
                } else {
                    let key = entry
                        .path()
                        .strip_prefix(&base)
                        .map(|p| p.to_string_lossy().replace('\\', "/"))
                        .unwrap_or_default();
                    out.push((key, meta));
                }
            }
        }
        Ok(out)
    }
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    fn provider_type(&self) -> &str {
        "local"
    }

    async fn health_check(&self) -> AppResult<bool> {
        Ok(self.root.exists() && self.root.is_dir())
    }

    async fn create_bucket(&self, bucket: &str) -> AppResult<()> {
        fs::create_dir_all(self.bucket_dir(bucket))
            .await
            .map_err(|e| {
                AppError::with_source(
                    ErrorKind::Operation,
                    format!("Failed to create bucket: {bucket}"),
                    e,
                )
            })
    }

    async fn delete_bucket(&self, bucket: &str) -> AppResult<()> {
        let dir = self.bucket_dir(bucket);
        if !dir.is_dir() {
            return Err(AppError::not_found(format!("Bucket not found: {bucket}")));
        }
        fs::remove_dir(&dir).await.map_err(|e| {
            AppError::with_source(
                ErrorKind::Validation,
                format!("Failed to delete bucket (must be empty): {bucket}"),
                e,
            )
        })
    }

    async fn bucket_exists(&self, bucket: &str) -> AppResult<bool> {
        Ok(self.bucket_dir(bucket).is_dir())
    }

    async fn put(
        &self,
        bucket: &str,
        key: &str,
        data: Bytes,
        _content_type: Option<&str>,
        _metadata: Option<&std::collections::HashMap<String, String>>,
    ) -> AppResult<PutOutcome> {
        let started = Instant::now();
        let path = self.resolve(bucket, key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await.map_err(|e| {
                AppError::with_source(
                    ErrorKind::Operation,
                    format!("Failed to create parent directory for: {key}"),
                    e,
                )
            })?;
        }
        fs::write(&path, &data).await.map_err(|e| {
            AppError::with_source(
                ErrorKind::Operation,
                format!("Failed to write object: {key}"),
                e,
            )
        })?;

        let etag = checksum::sha256_hex(&data);
        debug!(
            bucket,
            key,
            bytes = data.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "local.put"
        );
        Ok(PutOutcome {
            key: key.to_string(),
            etag: Some(etag),
        })
    }

    async fn get(
        &self,
        bucket: &str,
        key: &str,
        range: Option<ByteRange>,
    ) -> AppResult<ByteStream> {
        let started = Instant::now();
        let path = self.resolve(bucket, key)?;
        let mut file = fs::File::open(&path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                AppError::not_found(format!("Object not found: {key}"))
            } else {
                AppError::with_source(
                    ErrorKind::Operation,
                    format!("Failed to open object: {key}"),
                    e,
                )
            }
        })?;

        let len = file
            .metadata()
            .await
            .map_err(|e| {
                AppError::with_source(ErrorKind::Operation, "Failed to read object metadata", e)
            })?
            .len();

        let (start, take) = match range {
            Some(r) => {
                let start = r.start.min(len);
                let end = r.end.map(|e| e.min(len.saturating_sub(1)));
                let take = match end {
                    Some(end) if end >= start => end - start + 1,
                    Some(_) => 0,
                    None => len - start,
                };
                (start, take)
            }
            None => (0, len),
        };

        file.seek(std::io::SeekFrom::Start(start))
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Operation, "Failed to seek object", e))?;

        debug!(
            bucket,
            key,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "local.get"
        );
        Ok(Box::pin(ReaderStream::new(file.take(take))))
    }

    async fn get_bytes(&self, bucket: &str, key: &str) -> AppResult<Bytes> {
        let started = Instant::now();
        let path = self.resolve(bucket, key)?;
        let data = fs::read(&path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                AppError::not_found(format!("Object not found: {key}"))
            } else {
                AppError::with_source(
                    ErrorKind::Operation,
                    format!("Failed to read object: {key}"),
                    e,
                )
            }
        })?;
        debug!(
            bucket,
            key,
            bytes = data.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "local.get_bytes"
        );
        Ok(Bytes::from(data))
    }

    async fn remove(&self, bucket: &str, key: &str) -> AppResult<()> {
        let started = Instant::now();
        let path = self.resolve(bucket, key)?;
        match fs::remove_file(&path).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                return Err(AppError::with_source(
                    ErrorKind::Operation,
                    format!("Failed to remove object: {key}"),
                    e,
                ));
            }
        }
        debug!(
            bucket,
            key,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "local.remove"
        );
        Ok(())
    }

    async fn list(
        &self,
        bucket: &str,
        prefix: &str,
        recursive: bool,
    ) -> AppResult<Vec<ObjectInfo>> {
        let started = Instant::now();
        let all = self.walk_keys(bucket).await?;

        let mut objects = Vec::new();
        let mut common_prefixes = BTreeSet::new();
        for (key, meta) in all {
            if !key.starts_with(prefix) {
                continue;
            }
            if !recursive {
                // Collapse anything below the next '/' into a synthetic
                // prefix entry, mirroring delimiter-style listings.
                if let Some(slash) = key[prefix.len()..].find('/') {
                    common_prefixes.insert(key[..prefix.len() + slash + 1].to_string());
                    continue;
                }
            }
            let last_modified = meta
                .modified()
                .ok()
                .map(chrono::DateTime::<chrono::Utc>::from);
            objects.push(ObjectInfo {
                key,
                size_bytes: meta.len(),
                etag: None,
                last_modified,
            });
        }
        for key in common_prefixes {
            objects.push(ObjectInfo {
                key,
                size_bytes: 0,
                etag: None,
                last_modified: None,
            });
        }
        objects.sort_by(|a, b| a.key.cmp(&b.key));

        debug!(
            bucket,
            prefix,
            count = objects.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "local.list"
        );
        Ok(objects)
    }

    async fn stat(&self, bucket: &str, key: &str) -> AppResult<ObjectInfo> {
        let started = Instant::now();
        let path = self.resolve(bucket, key)?;
        let meta = fs::metadata(&path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                AppError::not_found(format!("Object not found: {key}"))
            } else {
                AppError::with_source(
                    ErrorKind::Operation,
                    format!("Failed to stat object: {key}"),
                    e,
                )
            }
        })?;
        debug!(
            bucket,
            key,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "local.stat"
        );
        Ok(ObjectInfo {
            key: key.to_string(),
            size_bytes: meta.len(),
            etag: None,
            last_modified: meta
                .modified()
                .ok()
                .map(chrono::DateTime::<chrono::Utc>::from),
        })
    }

    async fn presign_get(
        &self,
        bucket: &str,
        key: &str,
        expires_in: Duration,
    ) -> AppResult<String> {
        let path = self.resolve(bucket, key)?;
        if !path.is_file() {
            return Err(AppError::not_found(format!("Object not found: {key}")));
        }
        Ok(format!(
            "file://{}?expires_in={}",
            path.display(),
            expires_in.as_secs()
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn make_store() -> (tempfile::TempDir, LocalObjectStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalObjectStore::new(dir.path().to_str().unwrap())
            .await
            .unwrap();
        store.create_bucket("test").await.unwrap();
        (dir, store)
    }

    #[tokio::test]
    async fn test_put_get_remove() {
        let (_dir, store) = make_store().await;
        let data = Bytes::from("hello world");
        let outcome = store
            .put("test", "a/b.txt", data.clone(), Some("text/plain"), None)
            .await
            .unwrap();
        assert!(outcome.etag.is_some());

        let read_back = store.get_bytes("test", "a/b.txt").await.unwrap();
        assert_eq!(read_back, data);

        store.remove("test", "a/b.txt").await.unwrap();
        // Removing a missing key is not an error.
        store.remove("test", "a/b.txt").await.unwrap();
        assert!(store.get_bytes("test", "a/b.txt").await.is_err());
    }

    #[tokio::test]
    async fn test_ranged_get() {
        let (_dir, store) = make_store().await;
        store
            .put("test", "r.txt", Bytes::from("0123456789"), None, None)
            .await
            .unwrap();

        let mut stream = store
            .get(
                "test",
                "r.txt",
                Some(ByteRange {
                    start: 2,
                    end: Some(5),
                }),
            )
            .await
            .unwrap();

        use futures::StreamExt;
        let mut collected = Vec::new();
        while let Some(chunk) = stream.next().await {
            collected.extend_from_slice(&chunk.unwrap());
        }
        assert_eq!(collected, b"2345");
    }

    #[tokio::test]
    async fn test_list_prefix_and_delimiter() {
        let (_dir, store) = make_store().await;
        for key in ["x/a.txt", "x/sub/b.txt", "y/c.txt"] {
            store
                .put("test", key, Bytes::from("data"), None, None)
                .await
                .unwrap();
        }

        let recursive = store.list("test", "x/", true).await.unwrap();
        let keys: Vec<_> = recursive.iter().map(|o| o.key.as_str()).collect();
        assert_eq!(keys, vec!["x/a.txt", "x/sub/b.txt"]);

        let shallow = store.list("test", "x/", false).await.unwrap();
        let keys: Vec<_> = shallow.iter().map(|o| o.key.as_str()).collect();
        assert_eq!(keys, vec!["x/a.txt", "x/sub/"]);
    }

    #[tokio::test]
    async fn test_stat_and_presign() {
        let (_dir, store) = make_store().await;
        store
            .put("test", "s.bin", Bytes::from(vec![0u8; 64]), None, None)
            .await
            .unwrap();

        let info = store.stat("test", "s.bin").await.unwrap();
        assert_eq!(info.size_bytes, 64);

        let url = store
            .presign_get("test", "s.bin", Duration::from_secs(3600))
            .await
            .unwrap();
        assert!(url.starts_with("file://"));
        assert!(url.ends_with("expires_in=3600"));

        assert!(
            store
                .presign_get("test", "missing", Duration::from_secs(60))
                .await
                .is_err()
        );
    }

    #[tokio::test]
    async fn test_bucket_lifecycle() {
        let (_dir, store) = make_store().await;
        assert!(store.bucket_exists("test").await.unwrap());
        assert!(!store.bucket_exists("nope").await.unwrap());

        store.create_bucket("fresh").await.unwrap();
        store.delete_bucket("fresh").await.unwrap();
        assert!(!store.bucket_exists("fresh").await.unwrap());
    }

    #[tokio::test]
    async fn test_traversal_rejected() {
        let (_dir, store) = make_store().await;
        assert!(store.get_bytes("test", "../escape").await.is_err());
    }
}
