//! Storage deleter: removes stored objects given their public URL or key.

use crate::keys::key_from_url;
use crate::Storage;
use futures::stream::{self, StreamExt};
use hearth_core::AppError;
use std::sync::Arc;

const DELETE_CONCURRENCY: usize = 8;

/// One object to remove in a batch, tagged with the caller's identifier.
#[derive(Debug, Clone)]
pub struct DeletionTarget<K> {
    pub id: K,
    pub bucket: String,
    /// Public URL or bare key.
    pub location: String,
}

/// Per-item result of [`StorageDeleter::delete_many`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeletionOutcome {
    Deleted,
    Failed(String),
}

impl DeletionOutcome {
    pub fn is_deleted(&self) -> bool {
        matches!(self, DeletionOutcome::Deleted)
    }
}

/// Removes objects from the object store.
///
/// Whether a failure matters is the caller's decision; this type only reports it.
#[derive(Clone)]
pub struct StorageDeleter {
    storage: Arc<dyn Storage>,
}

impl StorageDeleter {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    /// Delete one object. A missing object counts as deleted.
    pub async fn delete(&self, url_or_key: &str, bucket: &str) -> Result<(), AppError> {
        let key = key_from_url(url_or_key).map_err(|e| AppError::DeletionFailure(e.to_string()))?;

        self.storage
            .remove(bucket, std::slice::from_ref(&key))
            .await
            .map_err(|e| {
                AppError::DeletionFailure(format!("{}/{}: {}", bucket, key, e))
            })
    }

    /// Attempt every deletion and report each outcome in input order.
    ///
    /// Never fails as a whole; a failed item does not stop the others.
    pub async fn delete_many<K>(
        &self,
        targets: Vec<DeletionTarget<K>>,
    ) -> Vec<(K, DeletionOutcome)>
    where
        K: Send,
    {
        stream::iter(targets)
            .map(|target| async move {
                let outcome = match self.delete(&target.location, &target.bucket).await {
                    Ok(()) => DeletionOutcome::Deleted,
                    Err(e) => DeletionOutcome::Failed(e.to_string()),
                };
                (target.id, outcome)
            })
            .buffered(DELETE_CONCURRENCY)
            .collect()
            .await
    }
}
