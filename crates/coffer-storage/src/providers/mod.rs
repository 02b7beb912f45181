//! Object-store provider implementations.

#[cfg(feature = "local")]
pub mod local;
#[cfg(feature = "s3")]
pub mod s3;

#[cfg(feature = "local")]
pub use local::LocalObjectStore;
#[cfg(feature = "s3")]
pub use s3::S3ObjectStore;

use std::sync::Arc;

use coffer_core::config::storage::StorageConfig;
use coffer_core::error::AppError;
use coffer_core::result::AppResult;
use coffer_core::traits::object_store::ObjectStore;
use tracing::info;

/// Build the configured object-store provider.
pub async fn from_config(config: &StorageConfig) -> AppResult<Arc<dyn ObjectStore>> {
    match config.provider.as_str() {
        #[cfg(feature = "local")]
        "local" => {
            info!(root = %config.local.root_path, "Initializing local object store");
            let store = local::LocalObjectStore::new(&config.local.root_path).await?;
            Ok(Arc::new(store))
        }
        #[cfg(feature = "s3")]
        "s3" => {
            info!(
                endpoint = %config.s3.endpoint,
                region = %config.s3.region,
                "Initializing S3 object store"
            );
            let store = s3::S3ObjectStore::connect(&config.s3).await?;
            Ok(Arc::new(store))
        }
        other => Err(AppError::configuration(format!(
            "Unknown storage provider: '{other}'. Supported: local, s3"
        ))),
    }
}
