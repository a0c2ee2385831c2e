mod blob_store;
mod error;

pub use blob_store::{BlobStore, InMemoryBlobStore};
pub use error::StoreError;
