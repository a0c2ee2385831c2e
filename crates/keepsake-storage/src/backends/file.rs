use std::{
    fs,
    io::{self, Write},
    path::{Path, PathBuf},
};

use async_trait::async_trait;
use keepsake_core::storage::{BlobStore, StoreError};
use tempfile::NamedTempFile;
use tracing::{debug, instrument};

/// One file per key under a fixed base directory.
///
/// Saves go through a temp file in the same directory that is renamed over
/// the target, so a failed save never leaves a half-written blob. Deleting an
/// absent key is `NotFound`. Concurrent writers to one key are not
/// coordinated; the last rename wins.
#[derive(Debug, Clone)]
pub struct FileBackend {
    root: PathBuf,
}

impl FileBackend {
    /// Open the store, creating the base directory if needed.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|err| StoreError::Backend {
            reason: format!("create {}: {err}", root.display()),
        })?;
        debug!(root = %root.display(), "file backend ready");
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StoreError> {
        validate_file_key(key)?;
        Ok(self.root.join(key))
    }
}

#[async_trait]
impl BlobStore for FileBackend {
    #[instrument(skip_all, fields(key = %key))]
    async fn load(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        let path = self.path_for(key)?;
        fs::read(&path).map_err(|err| map_io(key, err))
    }

    #[instrument(skip_all, fields(key = %key))]
    async fn save(&self, key: &str, blob: &[u8]) -> Result<(), StoreError> {
        let path = self.path_for(key)?;
        write_atomic(&self.root, &path, blob)
    }

    #[instrument(skip_all, fields(key = %key))]
    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let path = self.path_for(key)?;
        fs::remove_file(path).map_err(|err| map_io(key, err))
    }

    #[instrument(skip_all, fields(key = %key))]
    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        let path = self.path_for(key)?;
        match fs::metadata(path) {
            Ok(meta) => Ok(meta.is_file()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(StoreError::backend(err)),
        }
    }
}

fn write_atomic(dir: &Path, path: &Path, blob: &[u8]) -> Result<(), StoreError> {
    let mut tmp = NamedTempFile::new_in(dir).map_err(StoreError::backend)?;
    tmp.write_all(blob).map_err(StoreError::backend)?;
    tmp.as_file().sync_all().map_err(StoreError::backend)?;
    tmp.persist(path).map_err(|e| StoreError::backend(e.error))?;
    Ok(())
}

/// Keys must name exactly one file directly under the base directory.
fn validate_file_key(key: &str) -> Result<(), StoreError> {
    let invalid = key.is_empty()
        || key == "."
        || key == ".."
        || key.contains(['/', '\\', '\0']);
    if invalid {
        return Err(StoreError::InvalidResourceKey {
            key: key.to_string(),
        });
    }
    Ok(())
}

fn map_io(key: &str, err: io::Error) -> StoreError {
    if err.kind() == io::ErrorKind::NotFound {
        StoreError::not_found(key)
    } else {
        StoreError::backend(err)
    }
}
