use color_eyre::{eyre::WrapErr, Result};
use keepsake_storage::{
    open_backend,
    redact::{display_path, redact_credentials},
    resolve_key, Backend, Encryptor, ResolvedKey, StorageKind, StorageManager, StorageSettings,
};
use tracing::info;

use crate::config::Config;

/// The process-wide storage handle, built once and passed to whoever needs it.
pub type Store = StorageManager<Backend>;

/// Resolve the encryption key, open the configured backend and compose them.
/// A key that cannot be resolved aborts before any storage is touched.
pub async fn store_from_config(config: &Config) -> Result<Store> {
    let resolved = resolve_key(&config.encryption).wrap_err("failed to initialize encryption key")?;
    let backend = open_backend(&config.storage)
        .await
        .wrap_err_with(|| format!("failed to initialize {} storage", config.storage.kind))?;

    log_startup(&config.storage, &backend, resolved.as_ref());

    let encryptor = resolved
        .as_ref()
        .map(|resolved| Encryptor::from_key(&resolved.key))
        .transpose()?;
    Ok(StorageManager::new(backend, encryptor))
}

fn log_startup(settings: &StorageSettings, backend: &Backend, resolved: Option<&ResolvedKey>) {
    info!(kind = %settings.kind, location = %backend.describe(), "storage initialized");
    match settings.kind {
        StorageKind::File => info!(data_file = %settings.data_file, "file storage"),
        StorageKind::S3 => info!(region = %settings.s3_region, "s3 storage"),
        StorageKind::Mongo => info!(uri = %redact_credentials(&settings.mongo_uri), "mongodb storage"),
        StorageKind::Postgres => {
            let dsn = settings.postgres_dsn.as_deref().unwrap_or_default();
            info!(dsn = %redact_credentials(dsn), "postgres storage")
        }
    }

    match resolved {
        Some(resolved) => {
            let path = resolved
                .path
                .as_deref()
                .map(display_path)
                .unwrap_or_else(|| "(inline)".to_string());
            info!(
                key_path = %path,
                origin = resolved.origin.label(),
                preview = %resolved.key.preview(),
                "encryption enabled"
            );
        }
        None => info!("encryption disabled; blobs are stored as plaintext"),
    }
}
