//! File version repository implementation.

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use coffer_core::error::AppError;
use coffer_core::result::AppResult;
use coffer_entity::file::{CreateFileVersion, FileVersion};

use super::db_err;

/// Persistence operations for file version history.
#[async_trait]
pub trait VersionRepository: Send + Sync + std::fmt::Debug + 'static {
    /// Append a version row.
    async fn create(&self, data: &CreateFileVersion) -> AppResult<FileVersion>;

    /// List a file's versions newest-first, with `is_latest` derived.
    async fn list_for_file(&self, file_id: Uuid) -> AppResult<Vec<FileVersion>>;

    /// Find one version by file and number.
    async fn find(&self, file_id: Uuid, version_number: i32) -> AppResult<Option<FileVersion>>;

    /// Highest version number for a file, if any versions exist.
    async fn max_version_number(&self, file_id: Uuid) -> AppResult<Option<i32>>;

    /// Number of retained versions for a file.
    async fn count_for_file(&self, file_id: Uuid) -> AppResult<i64>;

    /// Up to `limit` oldest versions excluding the latest one.
    async fn oldest_non_latest(&self, file_id: Uuid, limit: i64) -> AppResult<Vec<FileVersion>>;

    /// Delete one version row. Returns `true` if removed.
    async fn delete(&self, version_id: Uuid) -> AppResult<bool>;

    /// Files whose retained-version count exceeds `cap`, optionally scoped
    /// to one entity. Returns (file_id, version_count) pairs.
    async fn files_over_cap(
        &self,
        cap: i64,
        entity_id: Option<Uuid>,
    ) -> AppResult<Vec<(Uuid, i64)>>;
}

/// PostgreSQL-backed version repository.
#[derive(Debug, Clone)]
pub struct PgVersionRepository {
    pool: PgPool,
}

impl PgVersionRepository {
    /// Create a new version repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl VersionRepository for PgVersionRepository {
    async fn create(&self, data: &CreateFileVersion) -> AppResult<FileVersion> {
        let mut version = sqlx::query_as::<_, FileVersion>(
            "INSERT INTO file_versions (id, file_id, version_number, storage_key, size_bytes, \
             checksum_sha256, comment, author) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) RETURNING *",
        )
        .bind(data.id)
        .bind(data.file_id)
        .bind(data.version_number)
        .bind(&data.storage_key)
        .bind(data.size_bytes)
        .bind(&data.checksum_sha256)
        .bind(&data.comment)
        .bind(&data.author)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if e.as_database_error()
                .is_some_and(|d| d.is_unique_violation())
            {
                AppError::conflict(format!(
                    "Version {} already exists for this file",
                    data.version_number
                ))
            } else {
                db_err("Failed to create file version", e)
            }
        })?;

        // A freshly appended version is by construction the newest.
        version.is_latest = true;
        Ok(version)
    }

    async fn list_for_file(&self, file_id: Uuid) -> AppResult<Vec<FileVersion>> {
        sqlx::query_as::<_, FileVersion>(
            "SELECT *, version_number = MAX(version_number) OVER () AS is_latest \
             FROM file_versions WHERE file_id = $1 ORDER BY version_number DESC",
        )
        .bind(file_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_err("Failed to list file versions", e))
    }

    async fn find(&self, file_id: Uuid, version_number: i32) -> AppResult<Option<FileVersion>> {
        sqlx::query_as::<_, FileVersion>(
            "SELECT *, version_number = \
             (SELECT MAX(version_number) FROM file_versions WHERE file_id = $1) AS is_latest \
             FROM file_versions WHERE file_id = $1 AND version_number = $2",
        )
        .bind(file_id)
        .bind(version_number)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_err("Failed to find file version", e))
    }

    async fn max_version_number(&self, file_id: Uuid) -> AppResult<Option<i32>> {
        sqlx::query_scalar::<_, Option<i32>>(
            "SELECT MAX(version_number) FROM file_versions WHERE file_id = $1",
        )
        .bind(file_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| db_err("Failed to read max version number", e))
    }

    async fn count_for_file(&self, file_id: Uuid) -> AppResult<i64> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM file_versions WHERE file_id = $1")
            .bind(file_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| db_err("Failed to count file versions", e))
    }

    async fn oldest_non_latest(&self, file_id: Uuid, limit: i64) -> AppResult<Vec<FileVersion>> {
        sqlx::query_as::<_, FileVersion>(
            "SELECT *, FALSE AS is_latest FROM file_versions \
             WHERE file_id = $1 AND version_number < \
             (SELECT MAX(version_number) FROM file_versions WHERE file_id = $1) \
             ORDER BY version_number ASC LIMIT $2",
        )
        .bind(file_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_err("Failed to list oldest versions", e))
    }

    async fn delete(&self, version_id: Uuid) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM file_versions WHERE id = $1")
            .bind(version_id)
            .execute(&self.pool)
            .await
            .map_err(|e| db_err("Failed to delete file version", e))?;
        Ok(result.rows_affected() > 0)
    }

    async fn files_over_cap(
        &self,
        cap: i64,
        entity_id: Option<Uuid>,
    ) -> AppResult<Vec<(Uuid, i64)>> {
        sqlx::query_as::<_, (Uuid, i64)>(
            "SELECT fv.file_id, COUNT(*) FROM file_versions fv \
             JOIN files f ON f.id = fv.file_id \
             WHERE ($2::uuid IS NULL OR f.entity_id = $2) \
             GROUP BY fv.file_id HAVING COUNT(*) > $1 \
             ORDER BY COUNT(*) DESC",
        )
        .bind(cap)
        .bind(entity_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_err("Failed to find files over the version cap", e))
    }
}
