//! # coffer-cache
//!
//! Cache provider implementations for Coffer plus the namespaced
//! approximate-LRU layer the engine caches through:
//!
//! - **memory**: In-process cache using [moka](https://crates.io/crates/moka)
//! - **redis**: Redis-backed cache using the [redis](https://crates.io/crates/redis) crate
//!
//! The provider is selected at runtime based on configuration.

pub mod keys;
pub mod layer;
#[cfg(feature = "memory")]
pub mod memory;
pub mod provider;
#[cfg(feature = "redis-backend")]
pub mod redis;
pub mod stats;

pub use layer::NamespaceCache;
pub use provider::CacheManager;
pub use stats::{CacheStats, CacheStatsSnapshot};
