//! File repository implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use coffer_core::error::AppError;
use coffer_core::result::AppResult;
use coffer_core::types::pagination::{PageRequest, PageResponse};
use coffer_entity::file::{CreateFile, File, FileFilter};

use super::db_err;

/// Persistence operations for file rows.
#[async_trait]
pub trait FileRepository: Send + Sync + std::fmt::Debug + 'static {
    /// Find a file by ID.
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<File>>;

    /// Find a file by entity and logical path.
    async fn find_by_path(&self, entity_id: Uuid, path: &str) -> AppResult<Option<File>>;

    /// Create a new file record.
    async fn create(&self, data: &CreateFile) -> AppResult<File>;

    /// Update an existing file record.
    async fn update(&self, file: &File) -> AppResult<File>;

    /// Delete a file record (versions cascade). Returns `true` if removed.
    async fn delete(&self, id: Uuid) -> AppResult<bool>;

    /// List an entity's files with filters and pagination, newest first.
    async fn list(
        &self,
        entity_id: Uuid,
        filter: &FileFilter,
        page: &PageRequest,
    ) -> AppResult<PageResponse<File>>;

    /// List backup candidates: optionally scoped to one entity, optionally
    /// restricted to files modified since a cutoff. Ordered by
    /// (entity_id, path) for deterministic manifests.
    async fn list_for_backup(
        &self,
        entity_id: Option<Uuid>,
        modified_since: Option<DateTime<Utc>>,
    ) -> AppResult<Vec<File>>;

    /// Adjust a file's retained-version count.
    async fn adjust_version_count(&self, file_id: Uuid, delta: i32) -> AppResult<()>;
}

/// PostgreSQL-backed file repository.
#[derive(Debug, Clone)]
pub struct PgFileRepository {
    pool: PgPool,
}

impl PgFileRepository {
    /// Create a new file repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl FileRepository for PgFileRepository {
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<File>> {
        sqlx::query_as::<_, File>("SELECT * FROM files WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| db_err("Failed to find file", e))
    }

    async fn find_by_path(&self, entity_id: Uuid, path: &str) -> AppResult<Option<File>> {
        sqlx::query_as::<_, File>("SELECT * FROM files WHERE entity_id = $1 AND path = $2")
            .bind(entity_id)
            .bind(path)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| db_err("Failed to find file by path", e))
    }

    async fn create(&self, data: &CreateFile) -> AppResult<File> {
        sqlx::query_as::<_, File>(
            "INSERT INTO files (id, entity_id, path, kind, size_bytes, content_type, \
             checksum_sha256, tags, visibility, storage_key, metadata) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) RETURNING *",
        )
        .bind(data.id)
        .bind(data.entity_id)
        .bind(&data.path)
        .bind(data.kind)
        .bind(data.size_bytes)
        .bind(&data.content_type)
        .bind(&data.checksum_sha256)
        .bind(&data.tags)
        .bind(data.visibility)
        .bind(&data.storage_key)
        .bind(&data.metadata)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if e.as_database_error()
                .is_some_and(|d| d.is_unique_violation())
            {
                AppError::conflict(format!(
                    "A file already exists at '{}' in this entity",
                    data.path
                ))
            } else {
                db_err("Failed to create file", e)
            }
        })
    }

    async fn update(&self, file: &File) -> AppResult<File> {
        sqlx::query_as::<_, File>(
            "UPDATE files SET path = $2, kind = $3, size_bytes = $4, content_type = $5, \
             checksum_sha256 = $6, tags = $7, visibility = $8, version_count = $9, \
             storage_key = $10, metadata = $11, updated_at = $12 \
             WHERE id = $1 RETURNING *",
        )
        .bind(file.id)
        .bind(&file.path)
        .bind(file.kind)
        .bind(file.size_bytes)
        .bind(&file.content_type)
        .bind(&file.checksum_sha256)
        .bind(&file.tags)
        .bind(file.visibility)
        .bind(file.version_count)
        .bind(&file.storage_key)
        .bind(&file.metadata)
        .bind(file.updated_at)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_err("Failed to update file", e))?
        .ok_or_else(|| AppError::not_found(format!("File {} not found", file.id)))
    }

    async fn delete(&self, id: Uuid) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM files WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| db_err("Failed to delete file", e))?;
        Ok(result.rows_affected() > 0)
    }

    async fn list(
        &self,
        entity_id: Uuid,
        filter: &FileFilter,
        page: &PageRequest,
    ) -> AppResult<PageResponse<File>> {
        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM files WHERE entity_id = $1 \
             AND ($2::text IS NULL OR path LIKE $2 || '%') \
             AND ($3::file_kind IS NULL OR kind = $3) \
             AND ($4::file_visibility IS NULL OR visibility = $4)",
        )
        .bind(entity_id)
        .bind(filter.prefix.as_deref())
        .bind(filter.kind)
        .bind(filter.visibility)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| db_err("Failed to count files", e))?;

        let files = sqlx::query_as::<_, File>(
            "SELECT * FROM files WHERE entity_id = $1 \
             AND ($2::text IS NULL OR path LIKE $2 || '%') \
             AND ($3::file_kind IS NULL OR kind = $3) \
             AND ($4::file_visibility IS NULL OR visibility = $4) \
             ORDER BY updated_at DESC LIMIT $5 OFFSET $6",
        )
        .bind(entity_id)
        .bind(filter.prefix.as_deref())
        .bind(filter.kind)
        .bind(filter.visibility)
        .bind(page.limit() as i64)
        .bind(page.offset() as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_err("Failed to list files", e))?;

        Ok(PageResponse::new(
            files,
            page.page,
            page.page_size,
            total as u64,
        ))
    }

    async fn list_for_backup(
        &self,
        entity_id: Option<Uuid>,
        modified_since: Option<DateTime<Utc>>,
    ) -> AppResult<Vec<File>> {
        sqlx::query_as::<_, File>(
            "SELECT * FROM files \
             WHERE ($1::uuid IS NULL OR entity_id = $1) \
               AND ($2::timestamptz IS NULL OR updated_at >= $2) \
             ORDER BY entity_id, path",
        )
        .bind(entity_id)
        .bind(modified_since)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_err("Failed to list backup candidates", e))
    }

    async fn adjust_version_count(&self, file_id: Uuid, delta: i32) -> AppResult<()> {
        sqlx::query(
            "UPDATE files SET version_count = GREATEST(version_count + $2, 0), \
             updated_at = NOW() WHERE id = $1",
        )
        .bind(file_id)
        .bind(delta)
        .execute(&self.pool)
        .await
        .map_err(|e| db_err("Failed to adjust version count", e))?;
        Ok(())
    }
}
