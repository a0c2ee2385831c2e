use async_trait::async_trait;
use keepsake_core::storage::{BlobStore, StoreError};
use mongodb::{
    bson::{doc, spec::BinarySubtype, Binary},
    Client, Collection,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::redact::redact_credentials;

/// Documents `{ _id: key, data: <binary> }` in one collection.
///
/// Deletes are idempotent: removing an absent key succeeds.
#[derive(Debug, Clone)]
pub struct MongoBackend {
    collection: Collection<BlobDocument>,
}

/// Stored shape of one blob.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlobDocument {
    #[serde(rename = "_id")]
    pub key: String,
    pub data: Binary,
}

impl BlobDocument {
    pub fn new(key: &str, blob: &[u8]) -> Self {
        Self {
            key: key.to_string(),
            data: Binary {
                subtype: BinarySubtype::Generic,
                bytes: blob.to_vec(),
            },
        }
    }
}

impl MongoBackend {
    /// Build a client for `uri`. The driver connects lazily on first use.
    pub async fn connect(uri: &str, database: &str, collection: &str) -> Result<Self, StoreError> {
        let client = Client::with_uri_str(uri)
            .await
            .map_err(|err| StoreError::Backend {
                reason: format!("connect to {}: {err}", redact_credentials(uri)),
            })?;
        debug!(database, collection, "mongo backend ready");
        Ok(Self::from_collection(
            client.database(database).collection(collection),
        ))
    }

    pub fn from_collection(collection: Collection<BlobDocument>) -> Self {
        Self { collection }
    }

    pub fn namespace(&self) -> String {
        self.collection.namespace().to_string()
    }
}

#[async_trait]
impl BlobStore for MongoBackend {
    #[instrument(skip_all, fields(key = %key))]
    async fn load(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        self.collection
            .find_one(doc! { "_id": key })
            .await
            .map_err(StoreError::backend)?
            .map(|document| document.data.bytes)
            .ok_or_else(|| StoreError::not_found(key))
    }

    #[instrument(skip_all, fields(key = %key))]
    async fn save(&self, key: &str, blob: &[u8]) -> Result<(), StoreError> {
        self.collection
            .replace_one(doc! { "_id": key }, BlobDocument::new(key, blob))
            .upsert(true)
            .await
            .map_err(StoreError::backend)?;
        Ok(())
    }

    #[instrument(skip_all, fields(key = %key))]
    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.collection
            .delete_one(doc! { "_id": key })
            .await
            .map_err(StoreError::backend)?;
        Ok(())
    }

    #[instrument(skip_all, fields(key = %key))]
    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        let count = self
            .collection
            .count_documents(doc! { "_id": key })
            .limit(1)
            .await
            .map_err(StoreError::backend)?;
        Ok(count > 0)
    }
}
