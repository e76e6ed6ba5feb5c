//! In-memory object store.
//!
//! Used by tests and dry runs. Failures can be injected per key so batch and
//! best-effort policies can be exercised without a network.

use crate::traits::{validate_segment, PutResult, Storage, StorageError, StorageResult};
use crate::StorageBackend;
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

/// An object held by [`MemoryStorage`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub data: Bytes,
    pub content_type: String,
    pub cache_control: String,
}

#[derive(Default)]
struct MemoryState {
    objects: HashMap<(String, String), StoredObject>,
    failing_put_fragments: Vec<String>,
    failing_next_puts: usize,
    failing_remove_keys: HashSet<String>,
    put_attempts: usize,
}

#[derive(Clone)]
pub struct MemoryStorage {
    base_url: String,
    state: Arc<Mutex<MemoryState>>,
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new("memory://objects")
    }
}

impl MemoryStorage {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            state: Arc::new(Mutex::new(MemoryState::default())),
        }
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Make every put whose key contains `fragment` fail.
    pub fn fail_puts_containing(&self, fragment: impl Into<String>) {
        self.state().failing_put_fragments.push(fragment.into());
    }

    /// Make the next `count` puts fail regardless of key.
    pub fn fail_next_puts(&self, count: usize) {
        self.state().failing_next_puts = count;
    }

    /// Make removal of `key` fail in any bucket.
    pub fn fail_removes_for(&self, key: impl Into<String>) {
        self.state().failing_remove_keys.insert(key.into());
    }

    /// Clear injected failures.
    pub fn heal(&self) {
        let mut state = self.state();
        state.failing_put_fragments.clear();
        state.failing_next_puts = 0;
        state.failing_remove_keys.clear();
    }

    pub fn object(&self, bucket: &str, key: &str) -> Option<StoredObject> {
        self.state()
            .objects
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
    }

    pub fn keys(&self, bucket: &str) -> Vec<String> {
        let mut keys: Vec<String> = self
            .state()
            .objects
            .keys()
            .filter(|(b, _)| b == bucket)
            .map(|(_, k)| k.clone())
            .collect();
        keys.sort();
        keys
    }

    pub fn object_count(&self) -> usize {
        self.state().objects.len()
    }

    /// Number of puts attempted, including failed ones.
    pub fn put_attempts(&self) -> usize {
        self.state().put_attempts
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn put(
        &self,
        bucket: &str,
        key: &str,
        data: Bytes,
        content_type: &str,
        cache_control: &str,
    ) -> StorageResult<PutResult> {
        validate_segment("bucket", bucket)?;
        validate_segment("key", key)?;

        let mut state = self.state();
        state.put_attempts += 1;

        let transient = state.failing_next_puts > 0;
        if transient {
            state.failing_next_puts -= 1;
        }

        if transient
            || state
                .failing_put_fragments
                .iter()
                .any(|fragment| key.contains(fragment.as_str()))
        {
            return Err(StorageError::UploadFailed(format!(
                "injected failure for {}/{}",
                bucket, key
            )));
        }

        state.objects.insert(
            (bucket.to_string(), key.to_string()),
            StoredObject {
                data,
                content_type: content_type.to_string(),
                cache_control: cache_control.to_string(),
            },
        );
        drop(state);

        Ok(PutResult {
            key: key.to_string(),
            public_url: self.url_for(bucket, key),
        })
    }

    async fn remove(&self, bucket: &str, keys: &[String]) -> StorageResult<()> {
        validate_segment("bucket", bucket)?;
        let mut state = self.state();

        if let Some(key) = keys.iter().find(|k| state.failing_remove_keys.contains(*k)) {
            return Err(StorageError::DeleteFailed(format!(
                "injected failure for {}/{}",
                bucket, key
            )));
        }

        for key in keys {
            state.objects.remove(&(bucket.to_string(), key.clone()));
        }
        Ok(())
    }

    fn url_for(&self, bucket: &str, key: &str) -> String {
        format!("{}/{}/{}", self.base_url.trim_end_matches('/'), bucket, key)
    }

    async fn exists(&self, bucket: &str, key: &str) -> StorageResult<bool> {
        Ok(self
            .state()
            .objects
            .contains_key(&(bucket.to_string(), key.to_string())))
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Memory
    }
}
