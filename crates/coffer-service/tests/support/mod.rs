//! Shared test support: in-memory repositories and a fully wired engine
//! over a temporary local object store and an in-memory cache.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use coffer_cache::memory::MemoryCacheProvider;
use coffer_cache::{CacheStats, NamespaceCache};
use coffer_core::config::backup::BackupConfig;
use coffer_core::config::cache::MemoryCacheConfig;
use coffer_core::config::storage::StorageConfig;
use coffer_core::config::versioning::VersioningConfig;
use coffer_core::error::AppError;
use coffer_core::result::AppResult;
use coffer_core::traits::ObjectStore;
use coffer_core::types::pagination::{PageRequest, PageResponse};
use coffer_database::repositories::{EntityRepository, FileRepository, VersionRepository};
use coffer_entity::entity::{CreateEntity, Entity};
use coffer_entity::file::{CreateFile, CreateFileVersion, File, FileFilter, FileVersion};
use coffer_service::{ActiveBackups, BackupManager, FileManager, UploadParams, VersionManager};
use coffer_storage::providers::LocalObjectStore;

// ── In-memory repositories ─────────────────────────────────

#[derive(Debug, Default)]
pub struct InMemoryEntityRepository {
    rows: Mutex<HashMap<Uuid, Entity>>,
}

#[async_trait]
impl EntityRepository for InMemoryEntityRepository {
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Entity>> {
        Ok(self.rows.lock().unwrap().get(&id).cloned())
    }

    async fn find_by_name(&self, name: &str) -> AppResult<Option<Entity>> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .values()
            .find(|e| e.name == name)
            .cloned())
    }

    async fn create(&self, data: &CreateEntity) -> AppResult<Entity> {
        let mut rows = self.rows.lock().unwrap();
        if rows.values().any(|e| e.name == data.name) {
            return Err(AppError::conflict(format!(
                "An entity named '{}' already exists",
                data.name
            )));
        }
        let now = Utc::now();
        let entity = Entity {
            id: Uuid::new_v4(),
            name: data.name.clone(),
            file_count: 0,
            total_size_bytes: 0,
            quota_bytes: data.quota_bytes,
            created_at: now,
            updated_at: now,
        };
        rows.insert(entity.id, entity.clone());
        Ok(entity)
    }

    async fn list(&self, page: &PageRequest) -> AppResult<PageResponse<Entity>> {
        let mut entities: Vec<Entity> = self.rows.lock().unwrap().values().cloned().collect();
        entities.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        let total = entities.len() as u64;
        let items = entities
            .into_iter()
            .skip(page.offset() as usize)
            .take(page.limit() as usize)
            .collect();
        Ok(PageResponse::new(items, page.page, page.page_size, total))
    }

    async fn delete(&self, id: Uuid) -> AppResult<bool> {
        Ok(self.rows.lock().unwrap().remove(&id).is_some())
    }

    async fn try_reserve_usage(
        &self,
        id: Uuid,
        size_delta: i64,
        file_delta: i64,
    ) -> AppResult<bool> {
        let mut rows = self.rows.lock().unwrap();
        let Some(entity) = rows.get_mut(&id) else {
            return Ok(false);
        };
        let new_total = entity.total_size_bytes + size_delta;
        let new_count = entity.file_count + file_delta;
        if new_total > entity.quota_bytes || new_total < 0 || new_count < 0 {
            return Ok(false);
        }
        entity.total_size_bytes = new_total;
        entity.file_count = new_count;
        entity.updated_at = Utc::now();
        Ok(true)
    }

    async fn release_usage(&self, id: Uuid, size_delta: i64, file_delta: i64) -> AppResult<()> {
        let mut rows = self.rows.lock().unwrap();
        if let Some(entity) = rows.get_mut(&id) {
            entity.total_size_bytes = (entity.total_size_bytes + size_delta).max(0);
            entity.file_count = (entity.file_count + file_delta).max(0);
            entity.updated_at = Utc::now();
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct InMemoryFileRepository {
    rows: Mutex<HashMap<Uuid, File>>,
}

impl InMemoryFileRepository {
    /// Test helper: rewrite a file's updated_at (for incremental-backup
    /// candidate selection).
    pub fn backdate(&self, file_id: Uuid, updated_at: DateTime<Utc>) {
        if let Some(file) = self.rows.lock().unwrap().get_mut(&file_id) {
            file.updated_at = updated_at;
        }
    }

    fn entity_of(&self, file_id: Uuid) -> Option<Uuid> {
        self.rows.lock().unwrap().get(&file_id).map(|f| f.entity_id)
    }
}

#[async_trait]
impl FileRepository for InMemoryFileRepository {
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<File>> {
        Ok(self.rows.lock().unwrap().get(&id).cloned())
    }

    async fn find_by_path(&self, entity_id: Uuid, path: &str) -> AppResult<Option<File>> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .values()
            .find(|f| f.entity_id == entity_id && f.path == path)
            .cloned())
    }

    async fn create(&self, data: &CreateFile) -> AppResult<File> {
        let mut rows = self.rows.lock().unwrap();
        if rows
            .values()
            .any(|f| f.entity_id == data.entity_id && f.path == data.path)
        {
            return Err(AppError::conflict(format!(
                "A file already exists at '{}' in this entity",
                data.path
            )));
        }
        let now = Utc::now();
        let file = File {
            id: data.id,
            entity_id: data.entity_id,
            path: data.path.clone(),
            kind: data.kind,
            size_bytes: data.size_bytes,
            content_type: data.content_type.clone(),
            checksum_sha256: data.checksum_sha256.clone(),
            tags: data.tags.clone(),
            visibility: data.visibility,
            version_count: 0,
            storage_key: data.storage_key.clone(),
            metadata: data.metadata.clone(),
            created_at: now,
            updated_at: now,
        };
        rows.insert(file.id, file.clone());
        Ok(file)
    }

    async fn update(&self, file: &File) -> AppResult<File> {
        let mut rows = self.rows.lock().unwrap();
        if !rows.contains_key(&file.id) {
            return Err(AppError::not_found(format!("File {} not found", file.id)));
        }
        rows.insert(file.id, file.clone());
        Ok(file.clone())
    }

    async fn delete(&self, id: Uuid) -> AppResult<bool> {
        Ok(self.rows.lock().unwrap().remove(&id).is_some())
    }

    async fn list(
        &self,
        entity_id: Uuid,
        filter: &FileFilter,
        page: &PageRequest,
    ) -> AppResult<PageResponse<File>> {
        let mut files: Vec<File> = self
            .rows
            .lock()
            .unwrap()
            .values()
            .filter(|f| f.entity_id == entity_id)
            .filter(|f| {
                filter
                    .prefix
                    .as_deref()
                    .is_none_or(|p| f.path.starts_with(p))
            })
            .filter(|f| filter.kind.is_none_or(|k| f.kind == k))
            .filter(|f| filter.visibility.is_none_or(|v| f.visibility == v))
            .cloned()
            .collect();
        files.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        let total = files.len() as u64;
        let items = files
            .into_iter()
            .skip(page.offset() as usize)
            .take(page.limit() as usize)
            .collect();
        Ok(PageResponse::new(items, page.page, page.page_size, total))
    }

    async fn list_for_backup(
        &self,
        entity_id: Option<Uuid>,
        modified_since: Option<DateTime<Utc>>,
    ) -> AppResult<Vec<File>> {
        let mut files: Vec<File> = self
            .rows
            .lock()
            .unwrap()
            .values()
            .filter(|f| entity_id.is_none_or(|id| f.entity_id == id))
            .filter(|f| modified_since.is_none_or(|since| f.updated_at >= since))
            .cloned()
            .collect();
        files.sort_by(|a, b| (a.entity_id, &a.path).cmp(&(b.entity_id, &b.path)));
        Ok(files)
    }

    async fn adjust_version_count(&self, file_id: Uuid, delta: i32) -> AppResult<()> {
        let mut rows = self.rows.lock().unwrap();
        if let Some(file) = rows.get_mut(&file_id) {
            file.version_count = (file.version_count + delta).max(0);
            file.updated_at = Utc::now();
        }
        Ok(())
    }
}

#[derive(Debug)]
pub struct InMemoryVersionRepository {
    rows: Mutex<HashMap<Uuid, FileVersion>>,
    files: Arc<InMemoryFileRepository>,
}

impl InMemoryVersionRepository {
    pub fn new(files: Arc<InMemoryFileRepository>) -> Self {
        Self {
            rows: Mutex::new(HashMap::new()),
            files,
        }
    }

    fn max_for(rows: &HashMap<Uuid, FileVersion>, file_id: Uuid) -> Option<i32> {
        rows.values()
            .filter(|v| v.file_id == file_id)
            .map(|v| v.version_number)
            .max()
    }
}

#[async_trait]
impl VersionRepository for InMemoryVersionRepository {
    async fn create(&self, data: &CreateFileVersion) -> AppResult<FileVersion> {
        let mut rows = self.rows.lock().unwrap();
        if rows
            .values()
            .any(|v| v.file_id == data.file_id && v.version_number == data.version_number)
        {
            return Err(AppError::conflict(format!(
                "Version {} already exists",
                data.version_number
            )));
        }
        let version = FileVersion {
            id: data.id,
            file_id: data.file_id,
            version_number: data.version_number,
            storage_key: data.storage_key.clone(),
            size_bytes: data.size_bytes,
            checksum_sha256: data.checksum_sha256.clone(),
            comment: data.comment.clone(),
            author: data.author.clone(),
            created_at: Utc::now(),
            is_latest: true,
        };
        rows.insert(version.id, version.clone());
        Ok(version)
    }

    async fn list_for_file(&self, file_id: Uuid) -> AppResult<Vec<FileVersion>> {
        let rows = self.rows.lock().unwrap();
        let max = Self::max_for(&rows, file_id);
        let mut versions: Vec<FileVersion> = rows
            .values()
            .filter(|v| v.file_id == file_id)
            .cloned()
            .map(|mut v| {
                v.is_latest = Some(v.version_number) == max;
                v
            })
            .collect();
        versions.sort_by(|a, b| b.version_number.cmp(&a.version_number));
        Ok(versions)
    }

    async fn find(&self, file_id: Uuid, version_number: i32) -> AppResult<Option<FileVersion>> {
        let rows = self.rows.lock().unwrap();
        let max = Self::max_for(&rows, file_id);
        Ok(rows
            .values()
            .find(|v| v.file_id == file_id && v.version_number == version_number)
            .cloned()
            .map(|mut v| {
                v.is_latest = Some(v.version_number) == max;
                v
            }))
    }

    async fn max_version_number(&self, file_id: Uuid) -> AppResult<Option<i32>> {
        Ok(Self::max_for(&self.rows.lock().unwrap(), file_id))
    }

    async fn count_for_file(&self, file_id: Uuid) -> AppResult<i64> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .values()
            .filter(|v| v.file_id == file_id)
            .count() as i64)
    }

    async fn oldest_non_latest(&self, file_id: Uuid, limit: i64) -> AppResult<Vec<FileVersion>> {
        let rows = self.rows.lock().unwrap();
        let Some(max) = Self::max_for(&rows, file_id) else {
            return Ok(Vec::new());
        };
        let mut versions: Vec<FileVersion> = rows
            .values()
            .filter(|v| v.file_id == file_id && v.version_number < max)
            .cloned()
            .collect();
        versions.sort_by(|a, b| a.version_number.cmp(&b.version_number));
        versions.truncate(limit.max(0) as usize);
        Ok(versions)
    }

    async fn delete(&self, version_id: Uuid) -> AppResult<bool> {
        Ok(self.rows.lock().unwrap().remove(&version_id).is_some())
    }

    async fn files_over_cap(
        &self,
        cap: i64,
        entity_id: Option<Uuid>,
    ) -> AppResult<Vec<(Uuid, i64)>> {
        let rows = self.rows.lock().unwrap();
        let mut counts: HashMap<Uuid, i64> = HashMap::new();
        for version in rows.values() {
            *counts.entry(version.file_id).or_default() += 1;
        }
        let mut over: Vec<(Uuid, i64)> = counts
            .into_iter()
            .filter(|(_, count)| *count > cap)
            .filter(|(file_id, _)| {
                entity_id.is_none_or(|id| self.files.entity_of(*file_id) == Some(id))
            })
            .collect();
        over.sort_by(|a, b| b.1.cmp(&a.1));
        Ok(over)
    }
}

// ── Harness ────────────────────────────────────────────────

pub struct Harness {
    pub _tmp: tempfile::TempDir,
    pub entities: Arc<InMemoryEntityRepository>,
    pub file_rows: Arc<InMemoryFileRepository>,
    pub version_rows: Arc<InMemoryVersionRepository>,
    pub store: Arc<LocalObjectStore>,
    pub cache: Arc<NamespaceCache>,
    pub files: Arc<FileManager>,
    pub versions: Arc<VersionManager>,
    pub backups: BackupManager,
    pub storage_config: StorageConfig,
    pub backup_config: BackupConfig,
}

pub async fn harness() -> Harness {
    harness_with(VersioningConfig::default()).await
}

pub async fn harness_with(versioning: VersioningConfig) -> Harness {
    let tmp = tempfile::tempdir().expect("tempdir");
    let mut storage_config = StorageConfig::default();
    storage_config.local.root_path = tmp.path().to_string_lossy().to_string();

    let store = Arc::new(
        LocalObjectStore::new(&storage_config.local.root_path)
            .await
            .expect("local store"),
    );
    store
        .create_bucket(&storage_config.bucket)
        .await
        .expect("content bucket");

    let cache_provider = Arc::new(MemoryCacheProvider::new(&MemoryCacheConfig::default(), 300));
    let cache = Arc::new(NamespaceCache::new(
        cache_provider,
        Arc::new(CacheStats::new()),
        Duration::from_secs(300),
        1000,
        0.9,
    ));

    let entities = Arc::new(InMemoryEntityRepository::default());
    let file_rows = Arc::new(InMemoryFileRepository::default());
    let version_rows = Arc::new(InMemoryVersionRepository::new(Arc::clone(&file_rows)));

    let versions = Arc::new(VersionManager::new(
        file_rows.clone(),
        version_rows.clone(),
        store.clone(),
        storage_config.clone(),
        versioning,
        cache.clone(),
    ));
    let files = Arc::new(FileManager::new(
        entities.clone(),
        file_rows.clone(),
        versions.clone(),
        store.clone(),
        cache.clone(),
        storage_config.clone(),
        None,
    ));
    let backup_config = BackupConfig::default();
    let backups = BackupManager::new(
        entities.clone(),
        file_rows.clone(),
        files.clone(),
        store.clone(),
        storage_config.clone(),
        backup_config.clone(),
        Arc::new(ActiveBackups::new()),
        None,
    );

    Harness {
        _tmp: tmp,
        entities,
        file_rows,
        version_rows,
        store,
        cache,
        files,
        versions,
        backups,
        storage_config,
        backup_config,
    }
}

// ── Convenience helpers ────────────────────────────────────

pub async fn create_entity(h: &Harness, name: &str, quota_bytes: i64) -> Entity {
    h.entities
        .create(&CreateEntity {
            name: name.to_string(),
            quota_bytes,
        })
        .await
        .expect("create entity")
}

pub fn upload_params(path: &str, content: &[u8]) -> UploadParams {
    UploadParams {
        path: path.to_string(),
        content: Bytes::copy_from_slice(content),
        content_type: None,
        metadata: None,
        tags: Vec::new(),
        visibility: None,
        author: Some("tests".to_string()),
        comment: None,
    }
}

pub async fn upload(h: &Harness, entity_id: Uuid, path: &str, content: &[u8]) -> File {
    h.files
        .upload(entity_id, upload_params(path, content))
        .await
        .expect("upload")
}
