//! In-memory cache implementation using the moka crate.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use moka::future::Cache;
use tracing::debug;

use coffer_core::config::cache::MemoryCacheConfig;
use coffer_core::result::AppResult;
use coffer_core::traits::cache::CacheProvider;

/// In-memory cache provider using moka, with ordered indexes kept in a
/// dashmap. Used as the default provider and as the test backend.
#[derive(Debug, Clone)]
pub struct MemoryCacheProvider {
    /// The underlying moka cache.
    cache: Cache<String, String>,
    /// Default TTL for entries.
    default_ttl: Duration,
    /// Ordered indexes: index key → (member → score).
    indexes: Arc<dashmap::DashMap<String, HashMap<String, f64>>>,
}

impl MemoryCacheProvider {
    /// Create a new in-memory cache from configuration.
    pub fn new(config: &MemoryCacheConfig, default_ttl_seconds: u64) -> Self {
        let cache = Cache::builder()
            .max_capacity(config.max_capacity)
            .time_to_live(Duration::from_secs(config.time_to_live_seconds))
            .build();

        Self {
            cache,
            default_ttl: Duration::from_secs(default_ttl_seconds),
            indexes: Arc::new(dashmap::DashMap::new()),
        }
    }
}

#[async_trait]
impl CacheProvider for MemoryCacheProvider {
    async fn get(&self, key: &str) -> AppResult<Option<String>> {
        Ok(self.cache.get(key).await)
    }

    async fn set(&self, key: &str, value: &str, _ttl: Duration) -> AppResult<()> {
        // moka enforces TTL at cache level, set at construction time.
        self.cache.insert(key.to_string(), value.to_string()).await;
        Ok(())
    }

    async fn set_default(&self, key: &str, value: &str) -> AppResult<()> {
        self.set(key, value, self.default_ttl).await
    }

    async fn delete(&self, key: &str) -> AppResult<()> {
        self.cache.remove(key).await;
        // An ordered index is addressed like any other key in Redis;
        // mirror that here.
        self.indexes.remove(key);
        Ok(())
    }

    async fn exists(&self, key: &str) -> AppResult<bool> {
        Ok(self.cache.contains_key(key))
    }

    async fn delete_pattern(&self, pattern: &str) -> AppResult<u64> {
        // Moka doesn't support pattern scanning, so we iterate over a
        // prefix derived from the glob.
        let prefix = pattern.trim_end_matches('*');
        let keys_to_remove: Vec<String> = self
            .cache
            .iter()
            .filter(|entry| entry.0.starts_with(prefix))
            .map(|entry| entry.0.to_string())
            .collect();

        let mut count = 0u64;
        for key in keys_to_remove {
            self.cache.remove(&key).await;
            count += 1;
        }
        self.indexes.retain(|key, _| !key.starts_with(prefix));

        debug!(pattern, count, "Deleted keys matching pattern");
        Ok(count)
    }

    async fn expire(&self, key: &str, _ttl: Duration) -> AppResult<bool> {
        // Per-entry TTL changes are not supported; re-insert to refresh
        // the entry's position in the cache-level TTL window.
        if let Some(val) = self.cache.get(key).await {
            self.cache.insert(key.to_string(), val).await;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    async fn index_add(&self, index: &str, member: &str, score: f64) -> AppResult<()> {
        self.indexes
            .entry(index.to_string())
            .or_default()
            .insert(member.to_string(), score);
        Ok(())
    }

    async fn index_remove(&self, index: &str, members: &[String]) -> AppResult<()> {
        if let Some(mut map) = self.indexes.get_mut(index) {
            for member in members {
                map.remove(member);
            }
        }
        Ok(())
    }

    async fn index_oldest(&self, index: &str, count: u64) -> AppResult<Vec<String>> {
        let Some(map) = self.indexes.get(index) else {
            return Ok(Vec::new());
        };
        let mut members: Vec<(String, f64)> =
            map.iter().map(|(k, v)| (k.clone(), *v)).collect();
        members.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));
        Ok(members
            .into_iter()
            .take(count as usize)
            .map(|(k, _)| k)
            .collect())
    }

    async fn index_len(&self, index: &str) -> AppResult<u64> {
        Ok(self.indexes.get(index).map(|m| m.len() as u64).unwrap_or(0))
    }

    async fn health_check(&self) -> AppResult<bool> {
        Ok(true)
    }

    async fn flush_all(&self) -> AppResult<()> {
        self.cache.invalidate_all();
        self.indexes.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_provider() -> MemoryCacheProvider {
        let config = MemoryCacheConfig {
            max_capacity: 1000,
            time_to_live_seconds: 60,
        };
        MemoryCacheProvider::new(&config, 60)
    }

    #[tokio::test]
    async fn test_set_get_delete() {
        let provider = make_provider();
        provider
            .set("key1", "value1", Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(
            provider.get("key1").await.unwrap(),
            Some("value1".to_string())
        );

        provider.delete("key1").await.unwrap();
        assert_eq!(provider.get("key1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_delete_pattern() {
        let provider = make_provider();
        for key in ["ns:a", "ns:b", "other:c"] {
            provider
                .set(key, "v", Duration::from_secs(60))
                .await
                .unwrap();
        }
        let removed = provider.delete_pattern("ns:*").await.unwrap();
        assert_eq!(removed, 2);
        assert!(provider.exists("other:c").await.unwrap());
    }

    #[tokio::test]
    async fn test_index_ordering() {
        let provider = make_provider();
        provider.index_add("idx", "newest", 30.0).await.unwrap();
        provider.index_add("idx", "oldest", 10.0).await.unwrap();
        provider.index_add("idx", "middle", 20.0).await.unwrap();

        assert_eq!(provider.index_len("idx").await.unwrap(), 3);
        let oldest = provider.index_oldest("idx", 2).await.unwrap();
        assert_eq!(oldest, vec!["oldest".to_string(), "middle".to_string()]);

        provider
            .index_remove("idx", &["oldest".to_string()])
            .await
            .unwrap();
        assert_eq!(provider.index_len("idx").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_json_roundtrip() {
        let provider = make_provider();
        let data = serde_json::json!({"name": "test", "count": 42});
        provider
            .set_json("json_key", &data, Duration::from_secs(60))
            .await
            .unwrap();
        let result: Option<serde_json::Value> = provider.get_json("json_key").await.unwrap();
        assert_eq!(result, Some(data));
    }
}
