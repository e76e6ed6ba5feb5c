#[cfg(feature = "storage-local")]
use crate::LocalStorage;
#[cfg(feature = "storage-s3")]
use crate::S3Storage;
use crate::{MemoryStorage, Storage, StorageBackend, StorageError, StorageResult};
use hearth_core::MediaConfig;
use std::sync::Arc;

/// Create a storage backend based on configuration
pub async fn create_storage(config: &MediaConfig) -> StorageResult<Arc<dyn Storage>> {
    match config.storage_backend {
        #[cfg(feature = "storage-s3")]
        StorageBackend::S3 => {
            let storage = S3Storage::new(
                config.s3_region.clone(),
                config.s3_endpoint.clone(),
                config.public_base_url.clone(),
            )?;
            Ok(Arc::new(storage))
        }

        #[cfg(not(feature = "storage-s3"))]
        StorageBackend::S3 => Err(StorageError::ConfigError(
            "S3 storage backend not available (storage-s3 feature not enabled)".to_string(),
        )),

        #[cfg(feature = "storage-local")]
        StorageBackend::Local => {
            let base_path = config.local_storage_path.clone().ok_or_else(|| {
                StorageError::ConfigError("HEARTH_LOCAL_STORAGE_PATH not configured".to_string())
            })?;
            let base_url = config
                .public_base_url
                .clone()
                .or_else(|| config.local_storage_base_url.clone())
                .ok_or_else(|| {
                    StorageError::ConfigError(
                        "HEARTH_LOCAL_STORAGE_BASE_URL not configured".to_string(),
                    )
                })?;

            let storage = LocalStorage::new(base_path, base_url).await?;
            Ok(Arc::new(storage))
        }

        #[cfg(not(feature = "storage-local"))]
        StorageBackend::Local => Err(StorageError::ConfigError(
            "Local storage backend not available (storage-local feature not enabled)".to_string(),
        )),

        StorageBackend::Memory => {
            tracing::warn!("Using in-memory object store; uploads are lost on exit");
            let storage = match config.public_base_url.clone() {
                Some(base_url) => MemoryStorage::new(base_url),
                None => MemoryStorage::default(),
            };
            Ok(Arc::new(storage))
        }
    }
}
