//! Backend selection: map operator configuration to a constructed backend.

use std::{fmt, path::PathBuf, str::FromStr};

use keepsake_core::storage::StoreError;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::backends::{
    validate_table_name, Backend, FileBackend, MongoBackend, PostgresBackend, S3Backend,
};

/// Which medium holds the blobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum StorageKind {
    #[default]
    File,
    S3,
    Mongo,
    Postgres,
}

impl StorageKind {
    pub fn as_str(self) -> &'static str {
        match self {
            StorageKind::File => "file",
            StorageKind::S3 => "s3",
            StorageKind::Mongo => "mongodb",
            StorageKind::Postgres => "postgres",
        }
    }
}

impl FromStr for StorageKind {
    type Err = StoreError;

    fn from_str(tag: &str) -> Result<Self, Self::Err> {
        match tag.trim().to_ascii_lowercase().as_str() {
            "" | "file" => Ok(StorageKind::File),
            "s3" => Ok(StorageKind::S3),
            "mongodb" | "mongo" => Ok(StorageKind::Mongo),
            "postgres" | "postgresql" | "pg" => Ok(StorageKind::Postgres),
            other => Err(StoreError::config(format!(
                "unsupported storage type: {other} (supported: file, s3, mongodb, postgres)"
            ))),
        }
    }
}

impl TryFrom<String> for StorageKind {
    type Error = StoreError;

    fn try_from(tag: String) -> Result<Self, Self::Error> {
        tag.parse()
    }
}

impl From<StorageKind> for String {
    fn from(kind: StorageKind) -> Self {
        kind.as_str().to_string()
    }
}

impl fmt::Display for StorageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Connection parameters for every backend; only the selected kind's fields are consulted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    pub kind: StorageKind,
    /// Base directory for the file backend; the platform data dir when unset.
    pub data_path: Option<PathBuf>,
    /// Name of the top-level blob the application stores.
    pub data_file: String,
    pub s3_bucket: Option<String>,
    pub s3_region: String,
    pub s3_endpoint: Option<String>,
    pub mongo_uri: String,
    pub mongo_database: String,
    pub mongo_collection: String,
    pub postgres_dsn: Option<String>,
    pub postgres_table: String,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            kind: StorageKind::File,
            data_path: None,
            data_file: "data.json".to_string(),
            s3_bucket: None,
            s3_region: "us-east-1".to_string(),
            s3_endpoint: None,
            mongo_uri: "mongodb://localhost:27017".to_string(),
            mongo_database: "keepsake".to_string(),
            mongo_collection: "blobs".to_string(),
            postgres_dsn: None,
            postgres_table: "keepsake_blobs".to_string(),
        }
    }
}

impl StorageSettings {
    /// Check the selected backend's parameters without touching the medium.
    pub fn validate(&self) -> Result<(), StoreError> {
        match self.kind {
            StorageKind::File => {
                self.file_root()?;
            }
            StorageKind::S3 => {
                required("s3_bucket", self.s3_bucket.as_deref())?;
                required("s3_region", Some(self.s3_region.as_str()))?;
            }
            StorageKind::Mongo => {
                required("mongo_uri", Some(self.mongo_uri.as_str()))?;
                required("mongo_database", Some(self.mongo_database.as_str()))?;
                required("mongo_collection", Some(self.mongo_collection.as_str()))?;
            }
            StorageKind::Postgres => {
                required("postgres_dsn", self.postgres_dsn.as_deref())?;
                validate_table_name(&self.postgres_table)?;
            }
        }
        Ok(())
    }

    /// Base directory for the file backend.
    pub fn file_root(&self) -> Result<PathBuf, StoreError> {
        match &self.data_path {
            Some(path) if !path.as_os_str().is_empty() => Ok(path.clone()),
            _ => dirs::data_dir()
                .map(|dir| dir.join("keepsake"))
                .ok_or_else(|| StoreError::config("data_path unset and no platform data dir available")),
        }
    }
}

/// Whether and how blobs are encrypted at rest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EncryptionSettings {
    pub enabled: bool,
    /// Inline 64-character hex key; takes precedence over the key file.
    pub key_hex: Option<String>,
    /// Key file location; `~/.keepsake/key` when unset.
    pub key_path: Option<PathBuf>,
}

impl Default for EncryptionSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            key_hex: None,
            key_path: None,
        }
    }
}

/// Validate the settings for the selected kind, then construct its backend.
pub async fn open_backend(settings: &StorageSettings) -> Result<Backend, StoreError> {
    settings.validate()?;
    info!(kind = %settings.kind, "initializing storage backend");

    let backend = match settings.kind {
        StorageKind::File => Backend::File(FileBackend::new(settings.file_root()?)?),
        StorageKind::S3 => {
            let bucket = required("s3_bucket", settings.s3_bucket.as_deref())?;
            Backend::S3(
                S3Backend::connect(bucket, &settings.s3_region, settings.s3_endpoint.as_deref())
                    .await,
            )
        }
        StorageKind::Mongo => Backend::Mongo(
            MongoBackend::connect(
                &settings.mongo_uri,
                &settings.mongo_database,
                &settings.mongo_collection,
            )
            .await?,
        ),
        StorageKind::Postgres => {
            let dsn = required("postgres_dsn", settings.postgres_dsn.as_deref())?;
            Backend::Postgres(PostgresBackend::connect(dsn, &settings.postgres_table).await?)
        }
    };
    Ok(backend)
}

fn required<'a>(name: &str, value: Option<&'a str>) -> Result<&'a str, StoreError> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| StoreError::config(format!("{name} is required for this storage type")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_every_supported_tag() {
        let cases = [
            ("", StorageKind::File),
            ("file", StorageKind::File),
            ("S3", StorageKind::S3),
            ("mongo", StorageKind::Mongo),
            ("mongodb", StorageKind::Mongo),
            ("pg", StorageKind::Postgres),
            ("postgresql", StorageKind::Postgres),
            (" Postgres ", StorageKind::Postgres),
        ];
        for (tag, expected) in cases {
            assert_eq!(tag.parse::<StorageKind>().expect(tag), expected);
        }
    }

    #[test]
    fn rejects_unknown_tag() {
        let err = "redis".parse::<StorageKind>().expect_err("unknown");
        assert!(matches!(err, StoreError::Config { .. }));
        assert!(err.to_string().contains("redis"));
    }

    #[test]
    fn s3_requires_bucket() {
        let settings = StorageSettings {
            kind: StorageKind::S3,
            ..StorageSettings::default()
        };
        let err = settings.validate().expect_err("no bucket");
        assert!(err.to_string().contains("s3_bucket"));

        let blank = StorageSettings {
            s3_bucket: Some("  ".into()),
            ..settings.clone()
        };
        assert!(blank.validate().is_err());

        let ok = StorageSettings {
            s3_bucket: Some("todo-data".into()),
            ..settings
        };
        ok.validate().expect("bucket set");
    }

    #[test]
    fn postgres_requires_dsn_and_safe_table() {
        let settings = StorageSettings {
            kind: StorageKind::Postgres,
            ..StorageSettings::default()
        };
        assert!(settings.validate().is_err());

        let unsafe_table = StorageSettings {
            postgres_dsn: Some("postgres://app@localhost/todo".into()),
            postgres_table: "blobs; DROP TABLE users".into(),
            ..settings.clone()
        };
        assert!(matches!(
            unsafe_table.validate(),
            Err(StoreError::Config { .. })
        ));

        let ok = StorageSettings {
            postgres_dsn: Some("postgres://app@localhost/todo".into()),
            ..settings
        };
        ok.validate().expect("valid postgres settings");
    }

    #[test]
    fn mongo_requires_collection() {
        let settings = StorageSettings {
            kind: StorageKind::Mongo,
            mongo_collection: String::new(),
            ..StorageSettings::default()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn settings_deserialize_with_defaults() {
        let settings: StorageSettings = toml::from_str(
            r#"
            kind = "pg"
            postgres_dsn = "postgres://app:secret@db/todo"
            "#,
        )
        .expect("parse");
        assert_eq!(settings.kind, StorageKind::Postgres);
        assert_eq!(settings.postgres_table, "keepsake_blobs");
        assert_eq!(settings.data_file, "data.json");

        let err = toml::from_str::<StorageSettings>(r#"kind = "tape""#);
        assert!(err.is_err());
    }

    #[tokio::test]
    async fn opens_file_backend_at_configured_path() {
        let dir = tempfile::tempdir().expect("tempdir");
        let settings = StorageSettings {
            data_path: Some(dir.path().join("data")),
            ..StorageSettings::default()
        };

        let backend = open_backend(&settings).await.expect("open");
        assert_eq!(backend.kind(), StorageKind::File);
        assert!(dir.path().join("data").is_dir());
    }

    #[tokio::test]
    async fn open_fails_fast_on_missing_parameters() {
        let settings = StorageSettings {
            kind: StorageKind::S3,
            ..StorageSettings::default()
        };
        assert!(matches!(
            open_backend(&settings).await,
            Err(StoreError::Config { .. })
        ));
    }
}
