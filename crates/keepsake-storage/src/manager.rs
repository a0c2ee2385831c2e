use async_trait::async_trait;
use keepsake_core::storage::{BlobStore, StoreError};
use tracing::{debug, instrument};

use crate::cipher::Encryptor;

/// Composes one backend with zero-or-one encryptor and presents the same
/// blob contract to callers.
///
/// With an encryptor every save encrypts and every load decrypts; without one
/// bytes pass through untouched. The choice is fixed at construction.
pub struct StorageManager<S: BlobStore> {
    store: S,
    encryptor: Option<Encryptor>,
}

impl<S: BlobStore> StorageManager<S> {
    pub fn new(store: S, encryptor: Option<Encryptor>) -> Self {
        Self { store, encryptor }
    }

    pub fn plain(store: S) -> Self {
        Self::new(store, None)
    }

    pub fn encrypted(store: S, encryptor: Encryptor) -> Self {
        Self::new(store, Some(encryptor))
    }

    /// The wrapped backend, for diagnostics.
    pub fn backend(&self) -> &S {
        &self.store
    }
}

#[async_trait]
impl<S: BlobStore> BlobStore for StorageManager<S> {
    #[instrument(skip_all, fields(key = %key))]
    async fn load(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        let stored = self.store.load(key).await?;
        match &self.encryptor {
            Some(encryptor) => encryptor.decrypt(&stored),
            None => Ok(stored),
        }
    }

    #[instrument(skip_all, fields(key = %key, len = blob.len()))]
    async fn save(&self, key: &str, blob: &[u8]) -> Result<(), StoreError> {
        match &self.encryptor {
            Some(encryptor) => {
                let envelope = encryptor.encrypt(blob)?;
                debug!(stored_len = envelope.len(), "saving encrypted blob");
                self.store.save(key, &envelope).await
            }
            None => self.store.save(key, blob).await,
        }
    }

    #[instrument(skip_all, fields(key = %key))]
    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.store.delete(key).await
    }

    #[instrument(skip_all, fields(key = %key))]
    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        self.store.exists(key).await
    }
}
