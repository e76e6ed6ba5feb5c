//! Media lifecycle coordination: create/attach batches and best-effort deletion.
//!
//! Object storage and the entity store are never coupled transactionally. The
//! ordering rules are what keep them consistent enough:
//!
//! - rows are written only after every upload of a batch succeeded, so a row
//!   always points at an object that was written;
//! - rows are deleted even when the object could not be, so a failed delete
//!   leaves an orphaned object, never a dangling row.

use bytes::Bytes;
use futures::future::try_join_all;
use hearth_core::models::{MediaAsset, NewMediaFile};
use hearth_core::{AppError, MediaConfig, ParentFailurePolicy};
use hearth_db::EntityStore;
use hearth_processing::{CompressionSettings, IntakePolicy, SizeBudgetCompressor};
use hearth_storage::{
    DeletionOutcome, DeletionTarget, Storage, StorageDeleter, StorageUploader, UploadedObject,
};
use std::sync::Arc;
use tokio::sync::Semaphore;
use uuid::Uuid;

use crate::report::{DeletionReport, MediaDeletion};

/// A parent created together with its media.
#[derive(Debug, Clone)]
pub struct CreatedParent {
    pub parent_id: Uuid,
    pub media: Vec<MediaAsset>,
}

/// Why a batch failed: one of its files, or recording the rows (`file: None`).
#[derive(Debug)]
struct BatchFailure {
    file: Option<String>,
    error: AppError,
}

/// Compress-then-upload for a single file. Cloned into each per-file task.
#[derive(Clone)]
struct FilePipeline {
    compressor: SizeBudgetCompressor,
    uploader: StorageUploader,
    encode_permits: Arc<Semaphore>,
    bucket: String,
    upload_retries: u32,
}

impl FilePipeline {
    async fn run(self, file: NewMediaFile) -> Result<UploadedObject, BatchFailure> {
        let name = file.original_name.clone();
        self.process(file).await.map_err(|error| BatchFailure {
            file: Some(name),
            error,
        })
    }

    async fn process(&self, file: NewMediaFile) -> Result<UploadedObject, AppError> {
        let (data, content_type, compressed) = self.compress(file.data, file.content_type).await?;

        let mut attempt = 0;
        loop {
            let result = self
                .uploader
                .upload(
                    data.clone(),
                    &content_type,
                    &file.original_name,
                    &self.bucket,
                    &file.field_label,
                    compressed,
                )
                .await;

            match result {
                Ok(uploaded) => return Ok(uploaded),
                Err(e) if attempt < self.upload_retries => {
                    attempt += 1;
                    tracing::warn!(
                        error = %e,
                        file = %file.original_name,
                        attempt = attempt,
                        max_retries = self.upload_retries,
                        "Upload failed, retrying with a fresh key"
                    );
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn compress(
        &self,
        data: Bytes,
        content_type: String,
    ) -> Result<(Bytes, String, bool), AppError> {
        let _permit = self
            .encode_permits
            .acquire()
            .await
            .map_err(|_| AppError::Internal("encode pool closed".to_string()))?;

        let compressor = self.compressor;
        let outcome = tokio::task::spawn_blocking(move || compressor.compress(data, &content_type))
            .await
            .map_err(|e| AppError::Internal(format!("compression task failed: {}", e)))??;

        let compressed = outcome.applied();
        Ok((outcome.data, outcome.content_type, compressed))
    }
}

/// Coordinates media batches and deletions across object storage and the
/// entity store.
#[derive(Clone)]
pub struct MediaLifecycleCoordinator {
    store: Arc<dyn EntityStore>,
    deleter: StorageDeleter,
    pipeline: FilePipeline,
    intake: IntakePolicy,
    failure_policy: ParentFailurePolicy,
}

impl MediaLifecycleCoordinator {
    pub fn new(config: &MediaConfig, storage: Arc<dyn Storage>, store: Arc<dyn EntityStore>) -> Self {
        let compressor = SizeBudgetCompressor::new(CompressionSettings {
            budget_bytes: config.compression_budget_bytes,
            max_width: config.compression_max_width,
        });

        Self {
            store,
            deleter: StorageDeleter::new(storage.clone()),
            pipeline: FilePipeline {
                compressor,
                uploader: StorageUploader::new(storage, config.cache_control.clone()),
                encode_permits: Arc::new(Semaphore::new(config.max_concurrent_encodes.max(1))),
                bucket: config.default_bucket.clone(),
                upload_retries: config.upload_retries,
            },
            intake: IntakePolicy::from_config(config),
            failure_policy: config.parent_failure_policy,
        }
    }

    pub fn bucket(&self) -> &str {
        &self.pipeline.bucket
    }

    /// Create a parent row and attach `files` to it.
    ///
    /// The parent is created before any file is processed, even for an empty
    /// batch. If a file then fails, or the rows cannot be recorded, no media
    /// rows are written and the error carries the parent id; objects uploaded
    /// before the failure are left in storage.
    pub async fn create_with_media(
        &self,
        fields: serde_json::Value,
        files: Vec<NewMediaFile>,
    ) -> Result<CreatedParent, AppError> {
        self.intake.validate_batch(&files)?;

        let parent_id = self.store.create_parent(fields).await?;
        tracing::info!(parent_id = %parent_id, files = files.len(), "Parent created");

        match self.store_batch(parent_id, files).await {
            Ok(media) => Ok(CreatedParent { parent_id, media }),
            Err(failure) => {
                let parent_retained = match self.failure_policy {
                    ParentFailurePolicy::Retain => true,
                    ParentFailurePolicy::Remove => !self.remove_parent_after_failure(parent_id).await,
                };
                Err(batch_failed(parent_id, parent_retained, failure))
            }
        }
    }

    /// Attach `files` to an existing parent. Existing media are untouched.
    pub async fn add_media(
        &self,
        parent_id: Uuid,
        files: Vec<NewMediaFile>,
    ) -> Result<Vec<MediaAsset>, AppError> {
        self.intake.validate_batch(&files)?;

        if self.store.find_parent(parent_id).await?.is_none() {
            return Err(AppError::NotFound(format!("parent {}", parent_id)));
        }

        self.store_batch(parent_id, files)
            .await
            .map_err(|failure| batch_failed(parent_id, true, failure))
    }

    /// Delete one media asset. The row is removed even if the object is not.
    pub async fn delete_media(&self, media_id: Uuid) -> Result<MediaDeletion, AppError> {
        let asset = self
            .store
            .find_media(media_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("media {}", media_id)))?;

        let storage = match self.deleter.delete(&asset.storage_path, &asset.bucket).await {
            Ok(()) => DeletionOutcome::Deleted,
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    media_id = %media_id,
                    storage_path = %asset.storage_path,
                    "Failed to delete media object; it is now orphaned"
                );
                DeletionOutcome::Failed(e.to_string())
            }
        };

        self.store.delete_media(media_id).await?;
        tracing::info!(media_id = %media_id, parent_id = %asset.parent_id, "Media deleted");

        Ok(MediaDeletion { media_id, storage })
    }

    /// Delete a parent, all its media rows and, best-effort, their objects.
    pub async fn delete_parent(&self, parent_id: Uuid) -> Result<DeletionReport, AppError> {
        if self.store.find_parent(parent_id).await?.is_none() {
            return Err(AppError::NotFound(format!("parent {}", parent_id)));
        }

        let assets = self.store.find_media_by_parent(parent_id).await?;
        let targets = assets
            .into_iter()
            .map(|asset| DeletionTarget {
                id: asset.id,
                bucket: asset.bucket,
                location: asset.storage_path,
            })
            .collect();

        let outcomes = self.deleter.delete_many(targets).await;
        for (media_id, outcome) in &outcomes {
            if let DeletionOutcome::Failed(reason) = outcome {
                tracing::warn!(
                    media_id = %media_id,
                    parent_id = %parent_id,
                    reason = %reason,
                    "Failed to delete media object; it is now orphaned"
                );
            }
        }

        let media_rows_deleted = self.store.delete_media_by_parent(parent_id).await?;
        self.store.delete_parent(parent_id).await?;

        let report = DeletionReport {
            parent_id,
            outcomes,
            media_rows_deleted,
        };
        tracing::info!(
            parent_id = %parent_id,
            media_rows_deleted = media_rows_deleted,
            objects_deleted = report.deleted_count(),
            objects_orphaned = report.failed_count(),
            "Parent deleted"
        );

        Ok(report)
    }

    /// Process every file concurrently, then insert all rows at once.
    async fn store_batch(
        &self,
        parent_id: Uuid,
        files: Vec<NewMediaFile>,
    ) -> Result<Vec<MediaAsset>, BatchFailure> {
        if files.is_empty() {
            return Ok(Vec::new());
        }

        let handles = files.into_iter().map(|file| {
            let name = file.original_name.clone();
            let handle = tokio::spawn(self.pipeline.clone().run(file));
            async move {
                handle.await.unwrap_or_else(|e| {
                    Err(BatchFailure {
                        file: Some(name),
                        error: AppError::Internal(format!("upload task failed: {}", e)),
                    })
                })
            }
        });

        // First failure wins. Tasks still running are detached, not cancelled.
        let uploaded = try_join_all(handles).await?;

        let paths: Vec<String> = uploaded.into_iter().map(|u| u.public_url).collect();
        let media = self
            .store
            .bulk_insert_media(parent_id, &self.pipeline.bucket, &paths)
            .await
            .map_err(|e| {
                tracing::error!(
                    error = %e,
                    parent_id = %parent_id,
                    orphaned_objects = paths.len(),
                    "Failed to record uploaded media"
                );
                BatchFailure { file: None, error: e }
            })?;

        tracing::info!(parent_id = %parent_id, count = media.len(), "Media attached");
        Ok(media)
    }

    /// Returns whether the parent row is gone.
    async fn remove_parent_after_failure(&self, parent_id: Uuid) -> bool {
        match self.store.delete_parent(parent_id).await {
            Ok(_) => true,
            Err(e) => {
                tracing::error!(
                    error = %e,
                    parent_id = %parent_id,
                    "Failed to remove parent after media batch failure"
                );
                false
            }
        }
    }
}

fn batch_failed(parent_id: Uuid, parent_retained: bool, failure: BatchFailure) -> AppError {
    tracing::warn!(
        parent_id = %parent_id,
        parent_retained = parent_retained,
        file = ?failure.file,
        error = %failure.error,
        "Media batch failed"
    );
    AppError::MediaBatchFailed {
        parent_id,
        parent_retained,
        file: failure.file,
        reason: failure.error.to_string(),
    }
}
