//! Owning-entity model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// The unit of ownership to which files and a quota belong.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Entity {
    /// Unique entity identifier.
    pub id: Uuid,
    /// Human-readable name, unique across the system.
    pub name: String,
    /// Number of files currently owned.
    pub file_count: i64,
    /// Total size of current file content in bytes.
    pub total_size_bytes: i64,
    /// Storage quota in bytes.
    pub quota_bytes: i64,
    /// When the entity was created.
    pub created_at: DateTime<Utc>,
    /// When the entity was last updated.
    pub updated_at: DateTime<Utc>,
}

impl Entity {
    /// Remaining quota in bytes (zero when exhausted).
    pub fn remaining_quota(&self) -> i64 {
        (self.quota_bytes - self.total_size_bytes).max(0)
    }

    /// Whether adding `delta` bytes would exceed the quota.
    pub fn would_exceed_quota(&self, delta: i64) -> bool {
        self.total_size_bytes + delta > self.quota_bytes
    }
}

/// Data required to create a new entity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateEntity {
    /// Entity name.
    pub name: String,
    /// Storage quota in bytes.
    pub quota_bytes: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entity(total: i64, quota: i64) -> Entity {
        Entity {
            id: Uuid::nil(),
            name: "test".into(),
            file_count: 0,
            total_size_bytes: total,
            quota_bytes: quota,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_quota_math() {
        let e = entity(6, 10);
        assert_eq!(e.remaining_quota(), 4);
        assert!(!e.would_exceed_quota(4));
        assert!(e.would_exceed_quota(5));

        let over = entity(12, 10);
        assert_eq!(over.remaining_quota(), 0);
    }
}
