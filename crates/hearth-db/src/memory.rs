//! In-memory entity store for tests and dry runs.

use async_trait::async_trait;
use chrono::Utc;
use hearth_core::models::{MediaAsset, ParentEntity};
use hearth_core::AppError;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use uuid::Uuid;

use crate::traits::EntityStore;

#[derive(Default)]
struct State {
    parents: HashMap<Uuid, ParentEntity>,
    // Insertion order doubles as creation order.
    media: Vec<MediaAsset>,
    fail_inserts: bool,
}

#[derive(Clone, Default)]
pub struct MemoryEntityStore {
    state: Arc<Mutex<State>>,
}

impl MemoryEntityStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Make `bulk_insert_media` fail until cleared.
    pub fn set_fail_inserts(&self, fail: bool) {
        self.state().fail_inserts = fail;
    }

    pub fn parent_count(&self) -> usize {
        self.state().parents.len()
    }

    pub fn media_count(&self) -> usize {
        self.state().media.len()
    }
}

#[async_trait]
impl EntityStore for MemoryEntityStore {
    async fn create_parent(&self, fields: serde_json::Value) -> Result<Uuid, AppError> {
        let parent = ParentEntity {
            id: Uuid::new_v4(),
            fields,
            created_at: Utc::now(),
        };
        let id = parent.id;
        self.state().parents.insert(id, parent);
        Ok(id)
    }

    async fn find_parent(&self, id: Uuid) -> Result<Option<ParentEntity>, AppError> {
        Ok(self.state().parents.get(&id).cloned())
    }

    async fn bulk_insert_media(
        &self,
        parent_id: Uuid,
        bucket: &str,
        storage_paths: &[String],
    ) -> Result<Vec<MediaAsset>, AppError> {
        let mut state = self.state();
        if state.fail_inserts {
            return Err(AppError::Internal("injected insert failure".to_string()));
        }
        if !state.parents.contains_key(&parent_id) {
            return Err(AppError::NotFound(format!("parent {}", parent_id)));
        }

        let now = Utc::now();
        let assets: Vec<MediaAsset> = storage_paths
            .iter()
            .map(|path| MediaAsset {
                id: Uuid::new_v4(),
                parent_id,
                storage_path: path.clone(),
                bucket: bucket.to_string(),
                created_at: now,
            })
            .collect();
        state.media.extend(assets.iter().cloned());
        Ok(assets)
    }

    async fn find_media_by_parent(&self, parent_id: Uuid) -> Result<Vec<MediaAsset>, AppError> {
        Ok(self
            .state()
            .media
            .iter()
            .filter(|m| m.parent_id == parent_id)
            .cloned()
            .collect())
    }

    async fn find_media(&self, id: Uuid) -> Result<Option<MediaAsset>, AppError> {
        Ok(self.state().media.iter().find(|m| m.id == id).cloned())
    }

    async fn delete_media(&self, id: Uuid) -> Result<bool, AppError> {
        let mut state = self.state();
        let before = state.media.len();
        state.media.retain(|m| m.id != id);
        Ok(state.media.len() < before)
    }

    async fn delete_media_by_parent(&self, parent_id: Uuid) -> Result<u64, AppError> {
        let mut state = self.state();
        let before = state.media.len();
        state.media.retain(|m| m.parent_id != parent_id);
        Ok((before - state.media.len()) as u64)
    }

    async fn delete_parent(&self, id: Uuid) -> Result<bool, AppError> {
        let mut state = self.state();
        let removed = state.parents.remove(&id).is_some();
        // Mirrors ON DELETE CASCADE.
        state.media.retain(|m| m.parent_id != id);
        Ok(removed)
    }
}
