use std::{
    fs,
    path::{Path, PathBuf},
};

use color_eyre::{eyre::WrapErr, Result};
use dirs::config_dir;
use keepsake_storage::{
    redact::redact_credentials, EncryptionSettings, StorageKind, StorageSettings,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// User-level configuration loaded from `~/.config/keepsake/config.toml` (platform-specific),
/// then overridden by `KEEPSAKE_*` environment variables.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    pub storage: StorageSettings,
    pub encryption: EncryptionSettings,
}

/// Load config from the default path and the process environment.
pub fn load() -> Result<Config> {
    let mut config = load_from_path(default_path()?)?;
    config.apply_overrides(|name| std::env::var(name).ok())?;
    Ok(config)
}

/// Load config from a given path; if missing or empty, return defaults.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<Config> {
    let path = path.as_ref();
    if !path.exists() {
        return Ok(Config::default());
    }
    let contents = fs::read_to_string(path)?;
    if contents.trim().is_empty() {
        return Ok(Config::default());
    }
    let cfg: Config =
        toml::from_str(&contents).wrap_err_with(|| format!("parsing {}", path.display()))?;
    Ok(cfg)
}

/// Resolve the default config path (platform aware).
pub fn default_path() -> Result<PathBuf> {
    let base = config_dir().ok_or_else(|| color_eyre::eyre::eyre!("no config dir available"))?;
    Ok(base.join("keepsake").join("config.toml"))
}

impl Config {
    /// Apply `KEEPSAKE_*` overrides. Unset and empty variables are ignored.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        let var = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());
        let storage = &mut self.storage;

        if let Some(kind) = var("KEEPSAKE_STORAGE_TYPE") {
            storage.kind = kind.parse::<StorageKind>()?;
            debug!(%kind, "config: KEEPSAKE_STORAGE_TYPE");
        }
        if let Some(path) = var("KEEPSAKE_DATA_PATH") {
            storage.data_path = Some(PathBuf::from(path));
        }
        if let Some(file) = var("KEEPSAKE_DATA_FILE") {
            storage.data_file = file;
        }
        if let Some(bucket) = var("KEEPSAKE_S3_BUCKET") {
            storage.s3_bucket = Some(bucket);
        }
        if let Some(region) = var("KEEPSAKE_S3_REGION") {
            storage.s3_region = region;
        }
        if let Some(endpoint) = var("KEEPSAKE_S3_ENDPOINT") {
            storage.s3_endpoint = Some(endpoint);
        }
        if let Some(uri) = var("KEEPSAKE_MONGO_URI") {
            debug!(uri = %redact_credentials(&uri), "config: KEEPSAKE_MONGO_URI");
            storage.mongo_uri = uri;
        }
        if let Some(db) = var("KEEPSAKE_MONGO_DB") {
            storage.mongo_database = db;
        }
        if let Some(collection) = var("KEEPSAKE_MONGO_COLLECTION") {
            storage.mongo_collection = collection;
        }
        if let Some(dsn) = var("KEEPSAKE_POSTGRES_DSN") {
            debug!(dsn = %redact_credentials(&dsn), "config: KEEPSAKE_POSTGRES_DSN");
            storage.postgres_dsn = Some(dsn);
        }
        if let Some(table) = var("KEEPSAKE_POSTGRES_TABLE") {
            storage.postgres_table = table;
        }

        let encryption = &mut self.encryption;
        if let Some(path) = var("KEEPSAKE_KEY_PATH") {
            encryption.key_path = Some(PathBuf::from(path));
        }
        if let Some(key) = var("KEEPSAKE_ENCRYPTION_KEY") {
            encryption.key_hex = Some(key);
        }
        if let Some(flag) = var("KEEPSAKE_ENCRYPTION") {
            encryption.enabled = !matches!(
                flag.trim().to_ascii_lowercase().as_str(),
                "off" | "false" | "0" | "no"
            );
        }
        Ok(())
    }
}

/// Write the given config to disk, creating parent directories as needed.
/// An existing file is left untouched to avoid clobbering user edits.
pub fn write_default_if_missing(config: &Config) -> Result<PathBuf> {
    write_to_path_if_missing(config, &default_path()?)
}

fn write_to_path_if_missing(config: &Config, path: &Path) -> Result<PathBuf> {
    if path.exists() {
        return Ok(path.to_path_buf());
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let body = toml::to_string_pretty(config)?;
    fs::write(path, body)?;
    Ok(path.to_path_buf())
}
