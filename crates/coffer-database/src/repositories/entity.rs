//! Entity repository — ownership rows and quota accounting.

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use coffer_core::result::AppResult;
use coffer_core::types::pagination::{PageRequest, PageResponse};
use coffer_entity::entity::{CreateEntity, Entity};

use super::db_err;
use coffer_core::error::AppError;

/// Persistence operations for entities and their usage counters.
#[async_trait]
pub trait EntityRepository: Send + Sync + std::fmt::Debug + 'static {
    /// Find an entity by ID.
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Entity>>;

    /// Find an entity by its unique name.
    async fn find_by_name(&self, name: &str) -> AppResult<Option<Entity>>;

    /// Create a new entity.
    async fn create(&self, data: &CreateEntity) -> AppResult<Entity>;

    /// List entities with pagination, newest first.
    async fn list(&self, page: &PageRequest) -> AppResult<PageResponse<Entity>>;

    /// Delete an entity. Returns `true` if a row was removed.
    async fn delete(&self, id: Uuid) -> AppResult<bool>;

    /// Atomically reserve usage against the quota.
    ///
    /// Applies `size_delta`/`file_delta` only if the resulting total stays
    /// within `quota_bytes`; returns `false` when the quota refuses. This
    /// is the compare-and-swap that closes the check-then-write race.
    async fn try_reserve_usage(
        &self,
        id: Uuid,
        size_delta: i64,
        file_delta: i64,
    ) -> AppResult<bool>;

    /// Unconditionally adjust usage counters (floored at zero), used to
    /// release a reservation after a downstream failure or a delete.
    async fn release_usage(&self, id: Uuid, size_delta: i64, file_delta: i64) -> AppResult<()>;
}

/// PostgreSQL-backed entity repository.
#[derive(Debug, Clone)]
pub struct PgEntityRepository {
    pool: PgPool,
}

impl PgEntityRepository {
    /// Create a new entity repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EntityRepository for PgEntityRepository {
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Entity>> {
        sqlx::query_as::<_, Entity>("SELECT * FROM entities WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| db_err("Failed to find entity", e))
    }

    async fn find_by_name(&self, name: &str) -> AppResult<Option<Entity>> {
        sqlx::query_as::<_, Entity>("SELECT * FROM entities WHERE name = $1")
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| db_err("Failed to find entity by name", e))
    }

    async fn create(&self, data: &CreateEntity) -> AppResult<Entity> {
        sqlx::query_as::<_, Entity>(
            "INSERT INTO entities (name, quota_bytes) VALUES ($1, $2) RETURNING *",
        )
        .bind(&data.name)
        .bind(data.quota_bytes)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if e.as_database_error()
                .is_some_and(|d| d.is_unique_violation())
            {
                AppError::conflict(format!("An entity named '{}' already exists", data.name))
            } else {
                db_err("Failed to create entity", e)
            }
        })
    }

    async fn list(&self, page: &PageRequest) -> AppResult<PageResponse<Entity>> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM entities")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| db_err("Failed to count entities", e))?;

        let entities = sqlx::query_as::<_, Entity>(
            "SELECT * FROM entities ORDER BY created_at DESC LIMIT $1 OFFSET $2",
        )
        .bind(page.limit() as i64)
        .bind(page.offset() as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_err("Failed to list entities", e))?;

        Ok(PageResponse::new(
            entities,
            page.page,
            page.page_size,
            total as u64,
        ))
    }

    async fn delete(&self, id: Uuid) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM entities WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| db_err("Failed to delete entity", e))?;
        Ok(result.rows_affected() > 0)
    }

    async fn try_reserve_usage(
        &self,
        id: Uuid,
        size_delta: i64,
        file_delta: i64,
    ) -> AppResult<bool> {
        let reserved = sqlx::query_scalar::<_, Uuid>(
            "UPDATE entities \
             SET total_size_bytes = total_size_bytes + $2, \
                 file_count = file_count + $3, \
                 updated_at = NOW() \
             WHERE id = $1 \
               AND total_size_bytes + $2 <= quota_bytes \
               AND total_size_bytes + $2 >= 0 \
               AND file_count + $3 >= 0 \
             RETURNING id",
        )
        .bind(id)
        .bind(size_delta)
        .bind(file_delta)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_err("Failed to reserve entity usage", e))?;

        Ok(reserved.is_some())
    }

    async fn release_usage(&self, id: Uuid, size_delta: i64, file_delta: i64) -> AppResult<()> {
        sqlx::query(
            "UPDATE entities \
             SET total_size_bytes = GREATEST(total_size_bytes + $2, 0), \
                 file_count = GREATEST(file_count + $3, 0), \
                 updated_at = NOW() \
             WHERE id = $1",
        )
        .bind(id)
        .bind(size_delta)
        .bind(file_delta)
        .execute(&self.pool)
        .await
        .map_err(|e| db_err("Failed to release entity usage", e))?;
        Ok(())
    }
}
