//! Storage uploader: persists one processed file and returns its public URL.

use crate::keys::{extension_for, generate_object_key};
use crate::Storage;
use bytes::Bytes;
use hearth_core::AppError;
use std::sync::Arc;

/// A stored object, as reported back to the coordinator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedObject {
    pub bucket: String,
    pub key: String,
    pub public_url: String,
    pub size_bytes: usize,
}

/// Writes processed files to the object store under collision-resistant keys.
///
/// There is no retry here. Each call generates a new key, so a caller that
/// retries never collides with an earlier attempt.
#[derive(Clone)]
pub struct StorageUploader {
    storage: Arc<dyn Storage>,
    cache_control: String,
}

impl StorageUploader {
    pub fn new(storage: Arc<dyn Storage>, cache_control: impl Into<String>) -> Self {
        Self {
            storage,
            cache_control: cache_control.into(),
        }
    }

    /// Upload `data` to `bucket`.
    ///
    /// `compressed` forces the `.jpg` extension; otherwise the extension comes
    /// from `original_name`.
    #[allow(clippy::too_many_arguments)]
    pub async fn upload(
        &self,
        data: Bytes,
        content_type: &str,
        original_name: &str,
        bucket: &str,
        field_label: &str,
        compressed: bool,
    ) -> Result<UploadedObject, AppError> {
        let extension = extension_for(original_name, content_type, compressed);
        let key = generate_object_key(field_label, &extension);
        let size_bytes = data.len();

        tracing::debug!(
            bucket = %bucket,
            key = %key,
            original_name = %original_name,
            size_bytes = size_bytes,
            "Uploading media object"
        );

        let result = self
            .storage
            .put(bucket, &key, data, content_type, &self.cache_control)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, bucket = %bucket, key = %key, "Failed to upload to storage");
                AppError::UploadFailure(format!("{}: {}", original_name, e))
            })?;

        Ok(UploadedObject {
            bucket: bucket.to_string(),
            key: result.key,
            public_url: result.public_url,
            size_bytes,
        })
    }

    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.storage
    }
}
