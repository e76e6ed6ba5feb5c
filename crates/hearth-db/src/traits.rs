use async_trait::async_trait;
use hearth_core::models::{MediaAsset, ParentEntity};
use hearth_core::AppError;
use uuid::Uuid;

/// Persistence seam used by the lifecycle coordinator.
///
/// Every method is a single atomic operation against the backing store. The
/// store knows nothing about object storage; URLs in `storage_path` are opaque.
#[async_trait]
pub trait EntityStore: Send + Sync {
    /// Insert a parent row and return its id.
    async fn create_parent(&self, fields: serde_json::Value) -> Result<Uuid, AppError>;

    async fn find_parent(&self, id: Uuid) -> Result<Option<ParentEntity>, AppError>;

    /// Insert one media row per path, all or nothing, preserving input order.
    async fn bulk_insert_media(
        &self,
        parent_id: Uuid,
        bucket: &str,
        storage_paths: &[String],
    ) -> Result<Vec<MediaAsset>, AppError>;

    /// All media of a parent, oldest first.
    async fn find_media_by_parent(&self, parent_id: Uuid) -> Result<Vec<MediaAsset>, AppError>;

    async fn find_media(&self, id: Uuid) -> Result<Option<MediaAsset>, AppError>;

    /// Returns whether a row was deleted.
    async fn delete_media(&self, id: Uuid) -> Result<bool, AppError>;

    /// Returns the number of rows deleted.
    async fn delete_media_by_parent(&self, parent_id: Uuid) -> Result<u64, AppError>;

    /// Returns whether a row was deleted.
    async fn delete_parent(&self, id: Uuid) -> Result<bool, AppError>;
}
