//! File manager — checksum-verified, quota-enforced file CRUD.
//!
//! Upload commits in a fixed order: validate → quota reservation (atomic
//! conditional update) → blob write under a fresh locator → version
//! append → file row commit → cache invalidation. A failure after the
//! reservation releases it; a failure after the blob write removes the
//! orphan, so a refused upload never leaks storage.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use tracing::{info, warn};
use uuid::Uuid;

use coffer_cache::{NamespaceCache, keys as cache_keys};
use coffer_core::checksum;
use coffer_core::config::storage::StorageConfig;
use coffer_core::error::AppError;
use coffer_core::events::{DomainEvent, EventPayload, EventSink, FileEvent};
use coffer_core::result::AppResult;
use coffer_core::sanitize;
use coffer_core::traits::object_store::ObjectStore;
use coffer_core::types::pagination::{PageRequest, PageResponse};
use coffer_database::repositories::{EntityRepository, FileRepository};
use coffer_entity::file::kind::content_type_from_path;
use coffer_entity::file::{CreateFile, File, FileFilter, FileKind, FileVersion, Visibility};
use coffer_storage::layout;

use crate::locks::KeyedLocks;
use crate::version::VersionManager;

/// Upload parameters (single request with full content).
#[derive(Debug, Clone)]
pub struct UploadParams {
    /// Logical path within the entity.
    pub path: String,
    /// File content.
    pub content: Bytes,
    /// MIME type; guessed from the extension when absent.
    pub content_type: Option<String>,
    /// Arbitrary metadata.
    pub metadata: Option<serde_json::Value>,
    /// Tags. An empty list leaves existing tags untouched on overwrite.
    pub tags: Vec<String>,
    /// Visibility; defaults to private for new files.
    pub visibility: Option<Visibility>,
    /// Who performed the upload.
    pub author: Option<String>,
    /// Version comment.
    pub comment: Option<String>,
}

/// A presigned download link.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct DownloadLink {
    /// Time-boxed read URL; bytes never flow through the engine.
    pub url: String,
    /// When the link stops working.
    pub expires_at: DateTime<Utc>,
}

/// Handles file CRUD against the object store, metadata store, and cache.
#[derive(Clone)]
pub struct FileManager {
    /// Entity repository (quota accounting).
    entities: Arc<dyn EntityRepository>,
    /// File repository.
    files: Arc<dyn FileRepository>,
    /// Version manager (append on every upload).
    versions: Arc<VersionManager>,
    /// Object store.
    store: Arc<dyn ObjectStore>,
    /// Namespaced cache layer.
    cache: Arc<NamespaceCache>,
    /// Bucket, presign TTL, upload cap.
    config: StorageConfig,
    /// Optional notification hook.
    events: Option<Arc<dyn EventSink>>,
    /// Per-(entity, path) write serialization.
    locks: Arc<KeyedLocks<(Uuid, String)>>,
}

impl std::fmt::Debug for FileManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileManager").finish()
    }
}

impl FileManager {
    /// Creates a new file manager.
    pub fn new(
        entities: Arc<dyn EntityRepository>,
        files: Arc<dyn FileRepository>,
        versions: Arc<VersionManager>,
        store: Arc<dyn ObjectStore>,
        cache: Arc<NamespaceCache>,
        config: StorageConfig,
        events: Option<Arc<dyn EventSink>>,
    ) -> Self {
        Self {
            entities,
            files,
            versions,
            store,
            cache,
            config,
            events,
            locks: Arc::new(KeyedLocks::new()),
        }
    }

    /// Uploads content to `path`, creating the file or overwriting it.
    /// Every successful upload appends one version.
    pub async fn upload(&self, entity_id: Uuid, params: UploadParams) -> AppResult<File> {
        sanitize::validate_logical_path(&params.path)?;
        if params.content.len() as u64 > self.config.max_upload_size_bytes {
            return Err(AppError::validation(format!(
                "Upload exceeds maximum size of {} bytes",
                self.config.max_upload_size_bytes
            )));
        }

        let entity = self
            .entities
            .find_by_id(entity_id)
            .await?
            .ok_or_else(|| AppError::not_found("Entity not found"))?;

        let _guard = self
            .locks
            .acquire((entity_id, params.path.clone()))
            .await;

        let existing = self.resolve(entity_id, &params.path).await?;
        let size = params.content.len() as i64;
        let (size_delta, file_delta) = match &existing {
            Some(file) => (size - file.size_bytes, 0),
            None => (size, 1),
        };

        // The reservation is the quota check: an atomic conditional update
        // against the running total, refused before any blob is written.
        if !self
            .entities
            .try_reserve_usage(entity_id, size_delta, file_delta)
            .await?
        {
            return Err(AppError::limit_exceeded(format!(
                "Upload of {size} bytes would exceed the quota of entity '{}'",
                entity.name
            )));
        }

        match self.commit_upload(entity_id, existing, params).await {
            Ok((file, version)) => {
                self.invalidate_cache(entity_id, &file.path).await;
                self.emit(EventPayload::File(FileEvent::Uploaded {
                    file_id: file.id,
                    entity_id,
                    path: file.path.clone(),
                    size_bytes: file.size_bytes,
                    version_number: version.version_number,
                }));
                info!(
                    entity_id = %entity_id,
                    file_id = %file.id,
                    path = %file.path,
                    size = file.size_bytes,
                    version = version.version_number,
                    "Upload completed"
                );
                Ok(file)
            }
            Err(e) => {
                if let Err(release_err) = self
                    .entities
                    .release_usage(entity_id, -size_delta, -file_delta)
                    .await
                {
                    warn!(
                        entity_id = %entity_id,
                        error = %release_err,
                        "Failed to release quota reservation after upload failure"
                    );
                }
                Err(e)
            }
        }
    }

    /// Blob write + version append + row commit, with orphan compensation.
    async fn commit_upload(
        &self,
        entity_id: Uuid,
        existing: Option<File>,
        params: UploadParams,
    ) -> AppResult<(File, FileVersion)> {
        let digest = checksum::sha256_hex(&params.content);
        let kind = FileKind::from_path(&params.path);
        let content_type = params
            .content_type
            .clone()
            .or_else(|| content_type_from_path(&params.path));
        let size = params.content.len() as i64;

        match existing {
            Some(mut file) => {
                let locator = layout::file_locator(entity_id, file.id, &params.path);
                self.store
                    .put(
                        &self.config.bucket,
                        &locator,
                        params.content.clone(),
                        content_type.as_deref(),
                        None,
                    )
                    .await?;

                // The version append lands before the row commit, so the
                // prior content stays addressable if the commit fails.
                let version = match self
                    .versions
                    .append(
                        &file,
                        &params.content,
                        &digest,
                        params.comment,
                        params.author,
                    )
                    .await
                {
                    Ok(version) => version,
                    Err(e) => {
                        let _ = self.store.remove(&self.config.bucket, &locator).await;
                        return Err(e);
                    }
                };

                let old_locator = std::mem::replace(&mut file.storage_key, locator);
                file.size_bytes = size;
                file.checksum_sha256 = digest;
                file.content_type = content_type;
                file.kind = kind;
                if !params.tags.is_empty() {
                    file.tags = params.tags;
                }
                if let Some(visibility) = params.visibility {
                    file.visibility = visibility;
                }
                if params.metadata.is_some() {
                    file.metadata = params.metadata;
                }
                file.version_count += 1;
                file.updated_at = Utc::now();

                let committed = self.files.update(&file).await?;

                if let Err(e) = self.store.remove(&self.config.bucket, &old_locator).await {
                    warn!(
                        file_id = %file.id,
                        key = %old_locator,
                        error = %e,
                        "Failed to remove superseded content blob"
                    );
                }
                Ok((committed, version))
            }
            None => {
                let file_id = Uuid::new_v4();
                let locator = layout::file_locator(entity_id, file_id, &params.path);
                self.store
                    .put(
                        &self.config.bucket,
                        &locator,
                        params.content.clone(),
                        content_type.as_deref(),
                        None,
                    )
                    .await?;

                let created = match self
                    .files
                    .create(&CreateFile {
                        id: file_id,
                        entity_id,
                        path: params.path.clone(),
                        kind,
                        size_bytes: size,
                        content_type,
                        checksum_sha256: digest.clone(),
                        tags: params.tags,
                        visibility: params.visibility.unwrap_or(Visibility::Private),
                        storage_key: locator.clone(),
                        metadata: params.metadata,
                    })
                    .await
                {
                    Ok(file) => file,
                    Err(e) => {
                        let _ = self.store.remove(&self.config.bucket, &locator).await;
                        return Err(e);
                    }
                };

                match self
                    .versions
                    .append(
                        &created,
                        &params.content,
                        &digest,
                        params.comment,
                        params.author,
                    )
                    .await
                {
                    Ok(version) => {
                        let mut file = created;
                        file.version_count = 1;
                        Ok((file, version))
                    }
                    Err(e) => {
                        let _ = self.files.delete(created.id).await;
                        let _ = self.store.remove(&self.config.bucket, &locator).await;
                        Err(e)
                    }
                }
            }
        }
    }

    /// Resolves a file and issues a presigned download URL. No bytes flow
    /// through this layer.
    pub async fn download(&self, entity_id: Uuid, path: &str) -> AppResult<DownloadLink> {
        let file = self.get_file(entity_id, path).await?;
        let ttl = Duration::from_secs(self.config.presign_ttl_seconds);
        let url = self
            .store
            .presign_get(&self.config.bucket, &file.storage_key, ttl)
            .await?;
        Ok(DownloadLink {
            url,
            expires_at: Utc::now() + chrono::Duration::seconds(ttl.as_secs() as i64),
        })
    }

    /// Deletes a file: current blob, version blobs, row (versions
    /// cascade), quota usage, and cache entries.
    pub async fn delete(&self, entity_id: Uuid, path: &str) -> AppResult<()> {
        let _guard = self.locks.acquire((entity_id, path.to_string())).await;

        let file = self
            .files
            .find_by_path(entity_id, path)
            .await?
            .ok_or_else(|| AppError::not_found(format!("No file at '{path}' in this entity")))?;

        self.versions.remove_all_blobs(&file).await;
        self.store
            .remove(&self.config.bucket, &file.storage_key)
            .await?;
        self.files.delete(file.id).await?;
        self.entities
            .release_usage(entity_id, -file.size_bytes, -1)
            .await?;
        self.invalidate_cache(entity_id, path).await;

        self.emit(EventPayload::File(FileEvent::Deleted {
            file_id: file.id,
            entity_id,
            path: path.to_string(),
        }));
        info!(entity_id = %entity_id, file_id = %file.id, path, "File deleted");
        Ok(())
    }

    /// Lists an entity's files newest-first with optional filters.
    pub async fn list(
        &self,
        entity_id: Uuid,
        filter: &FileFilter,
        page: &PageRequest,
    ) -> AppResult<PageResponse<File>> {
        self.files.list(entity_id, filter, page).await
    }

    /// Moves a file to a new logical path via copy-then-delete; no atomic
    /// rename primitive is assumed. Fails if the destination exists.
    pub async fn move_file(&self, entity_id: Uuid, src: &str, dst: &str) -> AppResult<File> {
        sanitize::validate_logical_path(dst)?;
        if src == dst {
            return Err(AppError::validation(
                "Source and destination paths are identical",
            ));
        }

        // Lock in path order so two opposed moves cannot deadlock.
        let (first, second) = if src <= dst { (src, dst) } else { (dst, src) };
        let _guard_a = self.locks.acquire((entity_id, first.to_string())).await;
        let _guard_b = self.locks.acquire((entity_id, second.to_string())).await;

        let mut file = self
            .files
            .find_by_path(entity_id, src)
            .await?
            .ok_or_else(|| AppError::not_found(format!("No file at '{src}' in this entity")))?;

        if self.files.find_by_path(entity_id, dst).await?.is_some() {
            return Err(AppError::conflict(format!(
                "A file already exists at '{dst}'"
            )));
        }

        let content = self
            .store
            .get_bytes(&self.config.bucket, &file.storage_key)
            .await?;
        let new_locator = layout::file_locator(entity_id, file.id, dst);
        self.store
            .put(
                &self.config.bucket,
                &new_locator,
                content,
                file.content_type.as_deref(),
                None,
            )
            .await?;

        let old_locator = std::mem::replace(&mut file.storage_key, new_locator);
        file.path = dst.to_string();
        file.kind = FileKind::from_path(dst);
        file.updated_at = Utc::now();
        let moved = self.files.update(&file).await?;

        if let Err(e) = self.store.remove(&self.config.bucket, &old_locator).await {
            warn!(
                file_id = %file.id,
                key = %old_locator,
                error = %e,
                "Failed to remove source blob after move"
            );
        }
        self.invalidate_cache(entity_id, src).await;
        self.invalidate_cache(entity_id, dst).await;

        self.emit(EventPayload::File(FileEvent::Moved {
            file_id: file.id,
            entity_id,
            from: src.to_string(),
            to: dst.to_string(),
        }));
        info!(entity_id = %entity_id, file_id = %file.id, from = src, to = dst, "File moved");
        Ok(moved)
    }

    /// Re-downloads the current content and constant-time compares its
    /// recomputed checksum to the stored one. Returns `false` on
    /// mismatch, never an error.
    pub async fn verify(&self, entity_id: Uuid, path: &str) -> AppResult<bool> {
        let file = self
            .files
            .find_by_path(entity_id, path)
            .await?
            .ok_or_else(|| AppError::not_found(format!("No file at '{path}' in this entity")))?;

        let content = self
            .store
            .get_bytes(&self.config.bucket, &file.storage_key)
            .await?;
        Ok(checksum::verify_sha256(&content, &file.checksum_sha256))
    }

    /// Resolves a file by path, NotFound if absent.
    pub async fn get_file(&self, entity_id: Uuid, path: &str) -> AppResult<File> {
        self.resolve(entity_id, path)
            .await?
            .ok_or_else(|| AppError::not_found(format!("No file at '{path}' in this entity")))
    }

    /// Cache-assisted resolve: cache hit, else metadata store then
    /// populate. Cache degradation is logged and tolerated.
    async fn resolve(&self, entity_id: Uuid, path: &str) -> AppResult<Option<File>> {
        let namespace = cache_keys::entity_files(entity_id);
        let key = cache_keys::file_by_path(path);

        match self.cache.get_json::<File>(&namespace, &key).await {
            Ok(Some(file)) => return Ok(Some(file)),
            Ok(None) => {}
            Err(e) => {
                warn!(entity_id = %entity_id, path, error = %e, "Cache read failed");
            }
        }

        let file = self.files.find_by_path(entity_id, path).await?;
        if let Some(file) = &file {
            if let Err(e) = self.cache.set_json(&namespace, &key, file, None).await {
                warn!(entity_id = %entity_id, path, error = %e, "Cache populate failed");
            }
        }
        Ok(file)
    }

    /// Invalidate the cache entry for (entity, path); never updated in
    /// place. Failures are logged, not surfaced.
    async fn invalidate_cache(&self, entity_id: Uuid, path: &str) {
        let namespace = cache_keys::entity_files(entity_id);
        let key = cache_keys::file_by_path(path);
        if let Err(e) = self.cache.invalidate(&namespace, Some(&key)).await {
            warn!(entity_id = %entity_id, path, error = %e, "Cache invalidation failed");
        }
    }

    fn emit(&self, payload: EventPayload) {
        if let Some(sink) = &self.events {
            sink.publish(DomainEvent::new(payload));
        }
    }
}
