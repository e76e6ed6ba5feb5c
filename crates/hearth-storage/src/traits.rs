//! Storage abstraction trait
//!
//! This module defines the Storage trait that all object store backends must implement.

use crate::StorageBackend;
use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Delete failed: {0}")]
    DeleteFailed(String),

    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("Storage backend error: {0}")]
    BackendError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Outcome of a successful put
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PutResult {
    pub key: String,
    pub public_url: String,
}

/// Object store abstraction
///
/// Every call is self-contained: a backend holds no per-request session, so a
/// single `Arc<dyn Storage>` is shared by all requests in the process.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Write `data` under `bucket/key` in one atomic put.
    async fn put(
        &self,
        bucket: &str,
        key: &str,
        data: Bytes,
        content_type: &str,
        cache_control: &str,
    ) -> StorageResult<PutResult>;

    /// Remove the given keys. Keys that do not exist are not an error.
    async fn remove(&self, bucket: &str, keys: &[String]) -> StorageResult<()>;

    /// Public URL for an object. Must end in `/{key}`.
    fn url_for(&self, bucket: &str, key: &str) -> String;

    /// Check if an object exists
    async fn exists(&self, bucket: &str, key: &str) -> StorageResult<bool>;

    /// Get the storage backend type
    fn backend_type(&self) -> StorageBackend;
}

/// Reject bucket names and keys that could escape their namespace.
pub(crate) fn validate_segment(kind: &str, value: &str) -> StorageResult<()> {
    if value.is_empty()
        || value.contains("..")
        || value.contains('/')
        || value.contains('\\')
    {
        return Err(StorageError::InvalidKey(format!(
            "{} '{}' is not a single path segment",
            kind, value
        )));
    }
    Ok(())
}
