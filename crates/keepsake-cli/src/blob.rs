use std::{
    fs,
    io::{Read, Write},
    path::Path,
};

use color_eyre::{eyre::bail, Result};
use keepsake_core::storage::BlobStore;
use tempfile::NamedTempFile;

/// Copy the blob stored under `key` into `out`.
pub async fn get<S: BlobStore>(store: &S, key: &str, out: &mut impl Write) -> Result<()> {
    let blob = store.load(key).await?;
    out.write_all(&blob)?;
    out.flush()?;
    Ok(())
}

/// Store everything readable from `input` under `key`.
pub async fn put<S: BlobStore>(store: &S, key: &str, input: &mut impl Read) -> Result<usize> {
    let mut blob = Vec::new();
    input.read_to_end(&mut blob)?;
    store.save(key, &blob).await?;
    Ok(blob.len())
}

/// Write the blob to `path` atomically; a failed load leaves `path` untouched.
pub async fn get_to_path<S: BlobStore>(store: &S, key: &str, path: &Path) -> Result<()> {
    let blob = store.load(key).await?;
    let dir = path
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(&blob)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path)?;
    Ok(())
}

pub async fn put_from_path<S: BlobStore>(store: &S, key: &str, path: &Path) -> Result<usize> {
    let mut file = fs::File::open(path)?;
    put(store, key, &mut file).await
}

/// Save, load and delete a probe blob, failing if anything differs.
pub async fn health<S: BlobStore>(store: &S) -> Result<()> {
    let probe_key = "keepsake-health-probe";
    let payload = b"ok";
    store.save(probe_key, payload).await?;
    let round_trip = store.load(probe_key).await?;
    store.delete(probe_key).await?;

    if round_trip != payload {
        bail!("storage round-trip failed");
    }
    if store.exists(probe_key).await? {
        bail!("probe still present after delete");
    }
    Ok(())
}
