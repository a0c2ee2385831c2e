//! Live-server tests; run with `KEEPSAKE_TEST_POSTGRES_DSN` set and `cargo test -- --ignored`.

use keepsake_core::{
    conformance,
    storage::{BlobStore, StoreError},
};
use keepsake_storage::{backends::PostgresBackend, Encryptor, StorageManager};

const TABLE: &str = "keepsake_conformance";

async fn backend() -> PostgresBackend {
    let dsn = std::env::var("KEEPSAKE_TEST_POSTGRES_DSN")
        .expect("KEEPSAKE_TEST_POSTGRES_DSN must be set");
    PostgresBackend::connect(&dsn, TABLE)
        .await
        .expect("connect to test postgres")
}

#[tokio::test]
#[ignore = "requires KEEPSAKE_TEST_POSTGRES_DSN"]
async fn satisfies_backend_contract() {
    let backend = backend().await;
    conformance::run_all(&backend).await;
}

#[tokio::test]
#[ignore = "requires KEEPSAKE_TEST_POSTGRES_DSN"]
async fn delete_of_missing_row_is_not_found() {
    let backend = backend().await;
    let err = backend
        .delete("postgres-never-written")
        .await
        .expect_err("no row");
    assert!(matches!(err, StoreError::NotFound { .. }));
}

#[tokio::test]
#[ignore = "requires KEEPSAKE_TEST_POSTGRES_DSN"]
async fn keys_are_bound_not_interpolated() {
    let backend = backend().await;
    let hostile = "x'); DROP TABLE keepsake_conformance; --";
    backend.save(hostile, b"still here").await.expect("save");
    assert_eq!(backend.load(hostile).await.expect("load"), b"still here");
    backend.delete(hostile).await.expect("delete");
}

#[tokio::test]
#[ignore = "requires KEEPSAKE_TEST_POSTGRES_DSN"]
async fn encrypted_manager_round_trips_through_postgres() {
    let backend = backend().await;
    let manager = StorageManager::encrypted(backend, Encryptor::new(&[3u8; 32]).expect("key"));
    manager.save("postgres-encrypted", b"hello").await.expect("save");
    assert_eq!(
        manager.load("postgres-encrypted").await.expect("load"),
        b"hello"
    );
    assert_ne!(
        manager
            .backend()
            .load("postgres-encrypted")
            .await
            .expect("raw load"),
        b"hello"
    );
}
