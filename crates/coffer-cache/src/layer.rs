//! Namespaced cache layer with approximate-LRU eviction.
//!
//! Callers read and write explicitly under a namespace — the layer is not
//! read-through. Every set and get-hit re-scores the key in the
//! namespace's ordered index (member → last-access millis); writes run an
//! opportunistic size check and evict the oldest ~20% of the namespace
//! budget when the index grows past `max_entries × cleanup_threshold`.
//! The index compensates for a cache backend with no eviction visibility.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, warn};

use coffer_core::result::AppResult;
use coffer_core::traits::cache::CacheProvider;

use crate::keys;
use crate::stats::CacheStats;

/// Fraction of the namespace budget removed by one eviction sweep.
const EVICT_FRACTION: f64 = 0.2;

/// Namespaced, statistics-counting cache layer over a [`CacheProvider`].
#[derive(Debug, Clone)]
pub struct NamespaceCache {
    /// The underlying provider.
    provider: Arc<dyn CacheProvider>,
    /// Injected per-process statistics registry.
    stats: Arc<CacheStats>,
    /// Default TTL applied when a call does not override it.
    default_ttl: Duration,
    /// Soft cap on keys tracked per namespace.
    max_entries: u64,
    /// Fraction of the cap at which the eviction sweep runs.
    cleanup_threshold: f64,
}

impl NamespaceCache {
    /// Create a new namespaced layer.
    pub fn new(
        provider: Arc<dyn CacheProvider>,
        stats: Arc<CacheStats>,
        default_ttl: Duration,
        max_entries: u64,
        cleanup_threshold: f64,
    ) -> Self {
        Self {
            provider,
            stats,
            default_ttl,
            max_entries,
            cleanup_threshold,
        }
    }

    /// The injected statistics registry.
    pub fn stats(&self) -> &Arc<CacheStats> {
        &self.stats
    }

    /// Get a value. A hit re-scores the key in the LRU index.
    pub async fn get(&self, namespace: &str, key: &str) -> AppResult<Option<String>> {
        let full_key = keys::namespaced(namespace, key);
        match self.provider.get(&full_key).await {
            Ok(Some(value)) => {
                self.stats.record_hit();
                self.touch(namespace, key).await;
                Ok(Some(value))
            }
            Ok(None) => {
                self.stats.record_miss();
                Ok(None)
            }
            Err(e) => {
                self.stats.record_error();
                Err(e)
            }
        }
    }

    /// Get and deserialize a JSON value.
    pub async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        namespace: &str,
        key: &str,
    ) -> AppResult<Option<T>> {
        match self.get(namespace, key).await? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    /// Set a value, re-score it, and opportunistically evict.
    pub async fn set(
        &self,
        namespace: &str,
        key: &str,
        value: &str,
        ttl: Option<Duration>,
    ) -> AppResult<()> {
        let full_key = keys::namespaced(namespace, key);
        let ttl = ttl.unwrap_or(self.default_ttl);
        if let Err(e) = self.provider.set(&full_key, value, ttl).await {
            self.stats.record_error();
            return Err(e);
        }
        self.stats.record_set();
        self.touch(namespace, key).await;
        self.maybe_evict(namespace).await;
        Ok(())
    }

    /// Serialize and set a JSON value.
    pub async fn set_json<T: serde::Serialize>(
        &self,
        namespace: &str,
        key: &str,
        value: &T,
        ttl: Option<Duration>,
    ) -> AppResult<()> {
        let raw = serde_json::to_string(value)?;
        self.set(namespace, key, &raw, ttl).await
    }

    /// Delete one key (value + index membership).
    pub async fn delete(&self, namespace: &str, key: &str) -> AppResult<()> {
        let full_key = keys::namespaced(namespace, key);
        if let Err(e) = self.provider.delete(&full_key).await {
            self.stats.record_error();
            return Err(e);
        }
        self.stats.record_delete();
        let _ = self
            .provider
            .index_remove(&keys::lru_index(namespace), &[key.to_string()])
            .await;
        Ok(())
    }

    /// Check whether a key exists.
    pub async fn exists(&self, namespace: &str, key: &str) -> AppResult<bool> {
        self.provider
            .exists(&keys::namespaced(namespace, key))
            .await
    }

    /// Override the TTL of an existing key.
    pub async fn expire(&self, namespace: &str, key: &str, ttl: Duration) -> AppResult<bool> {
        self.provider
            .expire(&keys::namespaced(namespace, key), ttl)
            .await
    }

    /// Invalidate one key, or the whole namespace when `key` is `None`.
    ///
    /// Entries are removed, never rewritten in place.
    pub async fn invalidate(&self, namespace: &str, key: Option<&str>) -> AppResult<u64> {
        match key {
            Some(key) => {
                self.delete(namespace, key).await?;
                Ok(1)
            }
            None => {
                let removed = self
                    .provider
                    .delete_pattern(&keys::namespace_pattern(namespace))
                    .await?;
                self.provider.delete(&keys::lru_index(namespace)).await?;
                if removed > 0 {
                    self.stats.record_delete();
                }
                debug!(namespace, removed, "Invalidated cache namespace");
                Ok(removed)
            }
        }
    }

    /// Re-score a key in its namespace index; index failures are tolerated.
    async fn touch(&self, namespace: &str, key: &str) {
        let score = Utc::now().timestamp_millis() as f64;
        if let Err(e) = self
            .provider
            .index_add(&keys::lru_index(namespace), key, score)
            .await
        {
            self.stats.record_error();
            debug!(namespace, key, error = %e, "Failed to update LRU index");
        }
    }

    /// Evict the oldest ~20% of the namespace budget once the index grows
    /// past `max_entries × cleanup_threshold`.
    async fn maybe_evict(&self, namespace: &str) {
        let index = keys::lru_index(namespace);
        let len = match self.provider.index_len(&index).await {
            Ok(len) => len,
            Err(e) => {
                self.stats.record_error();
                debug!(namespace, error = %e, "Failed to read LRU index length");
                return;
            }
        };

        let watermark = (self.max_entries as f64 * self.cleanup_threshold) as u64;
        if len <= watermark {
            return;
        }

        let evict_count = ((self.max_entries as f64 * EVICT_FRACTION).ceil() as u64).max(1);
        let victims = match self.provider.index_oldest(&index, evict_count).await {
            Ok(victims) => victims,
            Err(e) => {
                self.stats.record_error();
                debug!(namespace, error = %e, "Failed to read LRU victims");
                return;
            }
        };
        if victims.is_empty() {
            return;
        }

        let mut evicted = 0u64;
        for victim in &victims {
            let full_key = keys::namespaced(namespace, victim);
            match self.provider.delete(&full_key).await {
                Ok(()) => evicted += 1,
                Err(e) => {
                    self.stats.record_error();
                    warn!(namespace, key = %victim, error = %e, "Eviction delete failed");
                }
            }
        }
        let _ = self.provider.index_remove(&index, &victims).await;
        self.stats.record_evictions(evicted);
        debug!(namespace, evicted, len, "LRU eviction sweep completed");
    }
}
