//! Version manager — append-only per-file history with retention.
//!
//! Appends are serialized per file through a keyed lock, so version
//! numbers stay gap-free and strictly increasing under concurrent
//! writers. Retention keeps at most `max_versions` versions per file;
//! the oldest non-latest versions are evicted first and the latest is
//! never evicted.

use std::sync::Arc;

use bytes::Bytes;
use tracing::{info, warn};
use uuid::Uuid;

use coffer_cache::{NamespaceCache, keys as cache_keys};
use coffer_core::checksum;
use coffer_core::config::storage::StorageConfig;
use coffer_core::config::versioning::VersioningConfig;
use coffer_core::error::AppError;
use coffer_core::result::AppResult;
use coffer_core::traits::object_store::ObjectStore;
use coffer_database::repositories::{FileRepository, VersionRepository};
use coffer_entity::file::{CleanupReport, CreateFileVersion, File, FileVersion, VersionDiff};
use coffer_storage::layout;

use crate::file::{FileManager, UploadParams};
use crate::locks::KeyedLocks;

/// Manages per-file linear version history.
#[derive(Debug)]
pub struct VersionManager {
    /// File repository.
    files: Arc<dyn FileRepository>,
    /// Version repository.
    versions: Arc<dyn VersionRepository>,
    /// Object store holding version blobs.
    store: Arc<dyn ObjectStore>,
    /// Bucket and versions prefix.
    storage: StorageConfig,
    /// Retention settings.
    config: VersioningConfig,
    /// Namespaced cache layer (file metadata is invalidated when the
    /// retained-version count changes).
    cache: Arc<NamespaceCache>,
    /// Per-file append serialization.
    locks: KeyedLocks<Uuid>,
}

impl VersionManager {
    /// Creates a new version manager.
    pub fn new(
        files: Arc<dyn FileRepository>,
        versions: Arc<dyn VersionRepository>,
        store: Arc<dyn ObjectStore>,
        storage: StorageConfig,
        config: VersioningConfig,
        cache: Arc<NamespaceCache>,
    ) -> Self {
        Self {
            files,
            versions,
            store,
            storage,
            config,
            cache,
            locks: KeyedLocks::new(),
        }
    }

    /// Invalidate the cached metadata of a file whose version bookkeeping
    /// changed outside the file manager's write path.
    async fn invalidate_file(&self, file: &File) {
        let namespace = cache_keys::entity_files(file.entity_id);
        let key = cache_keys::file_by_path(&file.path);
        if let Err(e) = self.cache.invalidate(&namespace, Some(&key)).await {
            warn!(file_id = %file.id, error = %e, "Cache invalidation failed");
        }
    }

    /// The effective retention cap (at least 1 — the latest version is
    /// always retained).
    fn cap(&self) -> i64 {
        self.config.max_versions.max(1)
    }

    async fn resolve_file(&self, entity_id: Uuid, path: &str) -> AppResult<File> {
        self.files
            .find_by_path(entity_id, path)
            .await?
            .ok_or_else(|| AppError::not_found(format!("No file at '{path}' in this entity")))
    }

    /// Appends a version of `content` to the file at `path`.
    ///
    /// `version_number = max(existing) + 1` (1 if none). If appending
    /// would exceed the retention cap, cleanup runs first; if the cap
    /// still cannot be honored the append is refused with LimitExceeded.
    pub async fn create_version(
        &self,
        entity_id: Uuid,
        path: &str,
        content: &Bytes,
        comment: Option<String>,
        author: Option<String>,
    ) -> AppResult<FileVersion> {
        let file = self.resolve_file(entity_id, path).await?;
        let digest = checksum::sha256_hex(content);
        self.append(&file, content, &digest, comment, author).await
    }

    /// Append path shared with the file manager (which has already
    /// resolved the file and computed the checksum).
    pub(crate) async fn append(
        &self,
        file: &File,
        content: &Bytes,
        digest: &str,
        comment: Option<String>,
        author: Option<String>,
    ) -> AppResult<FileVersion> {
        let _guard = self.locks.acquire(file.id).await;

        let cap = self.cap();
        let count = self.versions.count_for_file(file.id).await?;
        if count + 1 > cap {
            // Make room: evict oldest non-latest versions first.
            let excess = count + 1 - cap;
            let victims = self.versions.oldest_non_latest(file.id, excess).await?;
            self.delete_versions(file.id, &victims).await?;

            let count = self.versions.count_for_file(file.id).await?;
            if count + 1 > cap {
                return Err(AppError::limit_exceeded(format!(
                    "File '{}' has reached the retention cap of {cap} versions",
                    file.path
                )));
            }
        }

        let next = self.versions.max_version_number(file.id).await?.unwrap_or(0) + 1;
        let version_id = Uuid::new_v4();
        let storage_key = layout::version_key(
            &self.storage.versions_prefix,
            file.id,
            &file.path,
            version_id,
        );

        self.store
            .put(
                &self.storage.bucket,
                &storage_key,
                content.clone(),
                file.content_type.as_deref(),
                None,
            )
            .await?;

        let version = self
            .versions
            .create(&CreateFileVersion {
                id: version_id,
                file_id: file.id,
                version_number: next,
                storage_key,
                size_bytes: content.len() as i64,
                checksum_sha256: digest.to_string(),
                comment,
                author,
            })
            .await?;

        self.files.adjust_version_count(file.id, 1).await?;
        self.invalidate_file(file).await;

        info!(
            file_id = %file.id,
            version = version.version_number,
            size = version.size_bytes,
            "File version created"
        );
        Ok(version)
    }

    /// Lists a file's versions, newest first.
    pub async fn list_versions(&self, entity_id: Uuid, path: &str) -> AppResult<Vec<FileVersion>> {
        let file = self.resolve_file(entity_id, path).await?;
        self.versions.list_for_file(file.id).await
    }

    /// Compares two versions by size and recomputed checksum. No
    /// byte-level diff is produced.
    pub async fn compare(
        &self,
        entity_id: Uuid,
        path: &str,
        version_a: i32,
        version_b: i32,
    ) -> AppResult<VersionDiff> {
        let file = self.resolve_file(entity_id, path).await?;

        let a = self
            .versions
            .find(file.id, version_a)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Version {version_a} not found")))?;
        let b = self
            .versions
            .find(file.id, version_b)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Version {version_b} not found")))?;

        let bytes_a = self
            .store
            .get_bytes(&self.storage.bucket, &a.storage_key)
            .await?;
        let bytes_b = self
            .store
            .get_bytes(&self.storage.bucket, &b.storage_key)
            .await?;

        Ok(VersionDiff {
            version_a,
            version_b,
            size_delta: bytes_b.len() as i64 - bytes_a.len() as i64,
            checksum_differs: checksum::sha256_hex(&bytes_a) != checksum::sha256_hex(&bytes_b),
        })
    }

    /// Restores a past version by re-uploading its content through the
    /// normal write path — this appends a NEW version; history is never
    /// rewound.
    pub async fn restore(
        &self,
        files: &FileManager,
        entity_id: Uuid,
        path: &str,
        version_number: i32,
        author: Option<String>,
    ) -> AppResult<File> {
        let file = self.resolve_file(entity_id, path).await?;
        let version = self
            .versions
            .find(file.id, version_number)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Version {version_number} not found")))?;

        let content = self
            .store
            .get_bytes(&self.storage.bucket, &version.storage_key)
            .await?;

        let restored = files
            .upload(
                entity_id,
                UploadParams {
                    path: path.to_string(),
                    content,
                    content_type: file.content_type.clone(),
                    metadata: file.metadata.clone(),
                    tags: file.tags.clone(),
                    visibility: Some(file.visibility),
                    author,
                    comment: Some(format!("restored from version {version_number}")),
                },
            )
            .await?;

        info!(
            file_id = %file.id,
            restored_from = version_number,
            "Version restored as new version"
        );
        Ok(restored)
    }

    /// Deletes one version. Refused if it is the only remaining version
    /// for the file.
    pub async fn delete_version(
        &self,
        entity_id: Uuid,
        path: &str,
        version_number: i32,
    ) -> AppResult<()> {
        let file = self.resolve_file(entity_id, path).await?;
        let _guard = self.locks.acquire(file.id).await;

        let count = self.versions.count_for_file(file.id).await?;
        if count <= 1 {
            return Err(AppError::validation(format!(
                "Cannot delete the only remaining version of '{path}'"
            )));
        }

        let version = self
            .versions
            .find(file.id, version_number)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Version {version_number} not found")))?;

        self.store
            .remove(&self.storage.bucket, &version.storage_key)
            .await?;
        if self.versions.delete(version.id).await? {
            self.files.adjust_version_count(file.id, -1).await?;
        }
        self.invalidate_file(&file).await;

        info!(file_id = %file.id, version = version_number, "File version deleted");
        Ok(())
    }

    /// Retention sweep over files exceeding the cap, optionally scoped to
    /// one entity. Deletions are batched per call to bound blast radius.
    pub async fn cleanup(&self, entity_id: Option<Uuid>) -> AppResult<CleanupReport> {
        let cap = self.cap();
        let budget = self.config.cleanup_batch_limit;
        let mut report = CleanupReport::default();

        let over_cap = self.versions.files_over_cap(cap, entity_id).await?;
        'sweep: for (file_id, count) in over_cap {
            report.files_examined += 1;
            let _guard = self.locks.acquire(file_id).await;

            let excess = count - cap;
            let victims = self.versions.oldest_non_latest(file_id, excess).await?;
            for victim in victims {
                if report.versions_deleted >= budget {
                    report.truncated = true;
                    break 'sweep;
                }
                if let Err(e) = self
                    .store
                    .remove(&self.storage.bucket, &victim.storage_key)
                    .await
                {
                    warn!(
                        file_id = %file_id,
                        version = victim.version_number,
                        error = %e,
                        "Failed to remove version blob during cleanup"
                    );
                }
                if self.versions.delete(victim.id).await? {
                    self.files.adjust_version_count(file_id, -1).await?;
                    report.versions_deleted += 1;
                }
            }
            if let Some(file) = self.files.find_by_id(file_id).await? {
                self.invalidate_file(&file).await;
            }
        }

        info!(
            files = report.files_examined,
            deleted = report.versions_deleted,
            truncated = report.truncated,
            "Version retention sweep completed"
        );
        Ok(report)
    }

    /// Best-effort removal of every version blob of a file; called by the
    /// file manager before the row (and its versions) cascade away.
    pub(crate) async fn remove_all_blobs(&self, file: &File) -> u64 {
        let versions = match self.versions.list_for_file(file.id).await {
            Ok(versions) => versions,
            Err(e) => {
                warn!(file_id = %file.id, error = %e, "Failed to list versions for blob removal");
                return 0;
            }
        };

        let mut removed = 0;
        for version in versions {
            match self
                .store
                .remove(&self.storage.bucket, &version.storage_key)
                .await
            {
                Ok(()) => removed += 1,
                Err(e) => warn!(
                    file_id = %file.id,
                    version = version.version_number,
                    error = %e,
                    "Failed to remove version blob"
                ),
            }
        }
        removed
    }

    /// Internal helper: delete version rows + blobs, adjusting the count.
    async fn delete_versions(&self, file_id: Uuid, victims: &[FileVersion]) -> AppResult<()> {
        for victim in victims {
            if let Err(e) = self
                .store
                .remove(&self.storage.bucket, &victim.storage_key)
                .await
            {
                warn!(
                    file_id = %file_id,
                    version = victim.version_number,
                    error = %e,
                    "Failed to remove version blob during eviction"
                );
            }
            if self.versions.delete(victim.id).await? {
                self.files.adjust_version_count(file_id, -1).await?;
            }
        }
        Ok(())
    }
}
