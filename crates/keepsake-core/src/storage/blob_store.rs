use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use async_trait::async_trait;

use super::StoreError;

/// Uniform contract over a persistence medium holding one opaque blob per key.
///
/// Every implementation gives identical semantics: one key maps to at most one
/// current blob, blobs are always read and written whole, and `exists` never
/// mutates state or reports a merely-absent key as an error.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Retrieve the blob for a key, or `NotFound`.
    async fn load(&self, key: &str) -> Result<Vec<u8>, StoreError>;

    /// Create or replace the blob for a key.
    async fn save(&self, key: &str, blob: &[u8]) -> Result<(), StoreError>;

    /// Remove the blob for a key. Whether an absent key is `NotFound` or a
    /// silent success is fixed per implementation.
    async fn delete(&self, key: &str) -> Result<(), StoreError>;

    /// True iff a `load` of this key would succeed.
    async fn exists(&self, key: &str) -> Result<bool, StoreError>;
}

/// In-memory blob store for tests and smoke runs. Clones share the same map,
/// so a test can keep a handle and inspect exactly what a wrapper wrote.
/// Deleting an absent key is `NotFound`.
#[derive(Debug, Default, Clone)]
pub struct InMemoryBlobStore {
    inner: Arc<Mutex<HashMap<String, Vec<u8>>>>,
}

impl InMemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw bytes currently stored for a key, bypassing the contract.
    pub fn raw(&self, key: &str) -> Option<Vec<u8>> {
        self.inner.lock().ok()?.get(key).cloned()
    }

    fn with_map<T>(
        &self,
        f: impl FnOnce(&mut HashMap<String, Vec<u8>>) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let mut map = self.inner.lock().map_err(|err| StoreError::Backend {
            reason: format!("lock poisoned: {err}"),
        })?;
        f(&mut map)
    }
}

#[async_trait]
impl BlobStore for InMemoryBlobStore {
    async fn load(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        self.with_map(|map| {
            map.get(key)
                .cloned()
                .ok_or_else(|| StoreError::not_found(key))
        })
    }

    async fn save(&self, key: &str, blob: &[u8]) -> Result<(), StoreError> {
        self.with_map(|map| {
            map.insert(key.to_string(), blob.to_vec());
            Ok(())
        })
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.with_map(|map| {
            map.remove(key)
                .map(|_| ())
                .ok_or_else(|| StoreError::not_found(key))
        })
    }

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        self.with_map(|map| Ok(map.contains_key(key)))
    }
}
