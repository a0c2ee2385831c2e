//! The four storage media behind the blob contract.

mod file;
mod mongo;
mod postgres;
mod s3;

use async_trait::async_trait;
use keepsake_core::storage::{BlobStore, StoreError};

pub use file::FileBackend;
pub use mongo::{BlobDocument, MongoBackend};
pub use postgres::PostgresBackend;
pub(crate) use postgres::validate_table_name;
pub use s3::S3Backend;

use crate::{redact::display_path, selector::StorageKind};

/// Closed set of backends, chosen once at startup by [`crate::open_backend`].
pub enum Backend {
    File(FileBackend),
    Postgres(PostgresBackend),
    Mongo(MongoBackend),
    S3(S3Backend),
}

impl Backend {
    pub fn kind(&self) -> StorageKind {
        match self {
            Backend::File(_) => StorageKind::File,
            Backend::Postgres(_) => StorageKind::Postgres,
            Backend::Mongo(_) => StorageKind::Mongo,
            Backend::S3(_) => StorageKind::S3,
        }
    }

    /// Human-readable location of the data, free of credentials.
    pub fn describe(&self) -> String {
        match self {
            Backend::File(b) => format!("file: {}", display_path(b.root())),
            Backend::Postgres(b) => format!("postgres table: {}", b.table()),
            Backend::Mongo(b) => format!("mongodb collection: {}", b.namespace()),
            Backend::S3(b) => format!("s3 bucket: {}", b.bucket()),
        }
    }

    fn store(&self) -> &dyn BlobStore {
        match self {
            Backend::File(b) => b,
            Backend::Postgres(b) => b,
            Backend::Mongo(b) => b,
            Backend::S3(b) => b,
        }
    }
}

#[async_trait]
impl BlobStore for Backend {
    async fn load(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        self.store().load(key).await
    }

    async fn save(&self, key: &str, blob: &[u8]) -> Result<(), StoreError> {
        self.store().save(key, blob).await
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.store().delete(key).await
    }

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        self.store().exists(key).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn delegates_to_the_selected_backend() {
        let dir = tempfile::tempdir().expect("tempdir");
        let backend = Backend::File(FileBackend::new(dir.path()).expect("file backend"));

        assert_eq!(backend.kind(), StorageKind::File);
        assert!(backend.describe().starts_with("file: "));

        backend.save("k", b"v").await.expect("save");
        assert_eq!(std::fs::read(dir.path().join("k")).expect("read"), b"v");
        assert!(backend.exists("k").await.expect("exists"));
    }
}
