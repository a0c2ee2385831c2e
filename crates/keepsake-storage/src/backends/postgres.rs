use async_trait::async_trait;
use keepsake_core::storage::{BlobStore, StoreError};
use tokio_postgres::{Client, NoTls};
use tracing::{debug, error, instrument};

use crate::redact::redact_credentials;

/// Longest identifier Postgres keeps without truncation.
const MAX_IDENTIFIER_LEN: usize = 63;

/// Rows of `(key PRIMARY KEY, data BYTEA)` in one operator-configured table.
///
/// The table name is interpolated into SQL once, at construction, after
/// validation; keys and blobs are always bound parameters. Deleting an absent
/// key is `NotFound`.
pub struct PostgresBackend {
    client: Client,
    table: String,
    statements: Statements,
}

/// SQL text for one table, fixed at construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Statements {
    pub create: String,
    pub select: String,
    pub upsert: String,
    pub delete: String,
    pub exists: String,
}

impl Statements {
    pub(crate) fn for_table(table: &str) -> Result<Self, StoreError> {
        validate_table_name(table)?;
        Ok(Self {
            create: format!(
                "CREATE TABLE IF NOT EXISTS {table} (key VARCHAR(255) PRIMARY KEY, data BYTEA NOT NULL)"
            ),
            select: format!("SELECT data FROM {table} WHERE key = $1"),
            upsert: format!(
                "INSERT INTO {table} (key, data) VALUES ($1, $2) \
                 ON CONFLICT (key) DO UPDATE SET data = EXCLUDED.data"
            ),
            delete: format!("DELETE FROM {table} WHERE key = $1"),
            exists: format!("SELECT EXISTS(SELECT 1 FROM {table} WHERE key = $1)"),
        })
    }
}

impl PostgresBackend {
    /// Connect, then create the table if it does not exist yet.
    pub async fn connect(dsn: &str, table: &str) -> Result<Self, StoreError> {
        let statements = Statements::for_table(table)?;

        let (client, connection) = tokio_postgres::connect(dsn, NoTls)
            .await
            .map_err(|err| StoreError::Backend {
                reason: format!("connect to {}: {err}", redact_credentials(dsn)),
            })?;
        tokio::spawn(async move {
            if let Err(err) = connection.await {
                error!("postgres connection closed: {err}");
            }
        });

        client
            .batch_execute(&statements.create)
            .await
            .map_err(|err| StoreError::Backend {
                reason: format!("create table {table}: {err}"),
            })?;
        debug!(table, "postgres backend ready");

        Ok(Self {
            client,
            table: table.to_string(),
            statements,
        })
    }

    pub fn table(&self) -> &str {
        &self.table
    }
}

#[async_trait]
impl BlobStore for PostgresBackend {
    #[instrument(skip_all, fields(key = %key))]
    async fn load(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        let row = self
            .client
            .query_opt(&self.statements.select, &[&key])
            .await
            .map_err(StoreError::backend)?
            .ok_or_else(|| StoreError::not_found(key))?;
        row.try_get::<_, Vec<u8>>(0).map_err(StoreError::backend)
    }

    #[instrument(skip_all, fields(key = %key))]
    async fn save(&self, key: &str, blob: &[u8]) -> Result<(), StoreError> {
        self.client
            .execute(&self.statements.upsert, &[&key, &blob])
            .await
            .map_err(StoreError::backend)?;
        Ok(())
    }

    #[instrument(skip_all, fields(key = %key))]
    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let removed = self
            .client
            .execute(&self.statements.delete, &[&key])
            .await
            .map_err(StoreError::backend)?;
        if removed == 0 {
            return Err(StoreError::not_found(key));
        }
        Ok(())
    }

    #[instrument(skip_all, fields(key = %key))]
    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        let row = self
            .client
            .query_one(&self.statements.exists, &[&key])
            .await
            .map_err(StoreError::backend)?;
        row.try_get::<_, bool>(0).map_err(StoreError::backend)
    }
}

/// Accept `table` or `schema.table`, each part `[A-Za-z_][A-Za-z0-9_]*`.
pub(crate) fn validate_table_name(name: &str) -> Result<(), StoreError> {
    let parts: Vec<&str> = name.split('.').collect();
    let valid = parts.len() <= 2 && parts.iter().all(|part| is_identifier(part));
    if !valid {
        return Err(StoreError::config(format!(
            "postgres table name {name:?} must be a plain identifier (optionally schema-qualified)"
        )));
    }
    Ok(())
}

fn is_identifier(part: &str) -> bool {
    let mut chars = part.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    part.len() <= MAX_IDENTIFIER_LEN
        && (first.is_ascii_alphabetic() || first == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_plain_and_schema_qualified_names() {
        for name in ["todo_data", "_blobs", "app.blobs", "Blobs2"] {
            validate_table_name(name).unwrap_or_else(|e| panic!("{name}: {e}"));
        }
    }

    #[test]
    fn rejects_names_that_could_inject_sql() {
        for name in [
            "",
            "blobs; DROP TABLE users",
            "blobs--",
            "1blobs",
            "a.b.c",
            "\"quoted\"",
            "app.",
            &"x".repeat(64),
        ] {
            let err = validate_table_name(name).expect_err(name);
            assert!(matches!(err, StoreError::Config { .. }), "{name}");
        }
    }

    #[test]
    fn statements_bind_keys_as_parameters() {
        let statements = Statements::for_table("todo_data").expect("valid table");
        assert_eq!(statements.select, "SELECT data FROM todo_data WHERE key = $1");
        assert!(statements.upsert.contains("VALUES ($1, $2)"));
        assert!(statements.upsert.contains("ON CONFLICT (key) DO UPDATE"));
        assert!(statements.create.contains("key VARCHAR(255) PRIMARY KEY"));
        assert!(statements.create.contains("data BYTEA NOT NULL"));
        assert_eq!(statements.delete, "DELETE FROM todo_data WHERE key = $1");
    }

    #[tokio::test]
    async fn connect_rejects_invalid_table_before_dialing() {
        // No server is listening; validation must fail first.
        let result = PostgresBackend::connect("postgres://nobody@127.0.0.1:1/none", "bad name").await;
        assert!(matches!(result, Err(StoreError::Config { .. })));
    }
}
