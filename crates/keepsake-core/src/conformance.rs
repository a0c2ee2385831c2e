//! Contract checks every [`BlobStore`] implementation must pass.
//!
//! Each check uses its own keys so the whole suite can run against one shared
//! (possibly remote, possibly dirty) store instance.

use crate::storage::{BlobStore, StoreError};

/// Run every contract check against `store`.
pub async fn run_all<S: BlobStore + ?Sized>(store: &S) {
    save_then_load_round_trips(store).await;
    exists_tracks_save_and_delete(store).await;
    load_after_delete_is_not_found(store).await;
    load_of_missing_key_is_not_found(store).await;
    save_replaces_previous_blob(store).await;
    empty_blob_round_trips(store).await;
}

pub async fn save_then_load_round_trips<S: BlobStore + ?Sized>(store: &S) {
    store.save("a", &[1, 2, 3]).await.expect("save a");
    assert_eq!(store.load("a").await.expect("load a"), vec![1, 2, 3]);
}

pub async fn exists_tracks_save_and_delete<S: BlobStore + ?Sized>(store: &S) {
    let key = "conformance-exists";
    clear(store, key).await;

    assert!(!store.exists(key).await.expect("exists before save"));
    store.save(key, b"present").await.expect("save");
    assert!(store.exists(key).await.expect("exists after save"));
    store.delete(key).await.expect("delete");
    assert!(!store.exists(key).await.expect("exists after delete"));
}

pub async fn load_after_delete_is_not_found<S: BlobStore + ?Sized>(store: &S) {
    let key = "conformance-delete";
    store.save(key, &[1, 2, 3]).await.expect("save");
    store.delete(key).await.expect("delete");

    let err = store.load(key).await.expect_err("load after delete");
    assert!(
        matches!(err, StoreError::NotFound { .. }),
        "expected NotFound, got {err:?}"
    );
}

pub async fn load_of_missing_key_is_not_found<S: BlobStore + ?Sized>(store: &S) {
    let err = store.load("missing").await.expect_err("load missing");
    assert!(
        matches!(err, StoreError::NotFound { .. }),
        "expected NotFound, got {err:?}"
    );
}

pub async fn save_replaces_previous_blob<S: BlobStore + ?Sized>(store: &S) {
    let key = "conformance-upsert";
    store.save(key, b"first").await.expect("first save");
    store.save(key, b"second").await.expect("second save");
    assert_eq!(store.load(key).await.expect("load"), b"second");
}

pub async fn empty_blob_round_trips<S: BlobStore + ?Sized>(store: &S) {
    let key = "conformance-empty";
    store.save(key, &[]).await.expect("save empty");
    assert!(store.exists(key).await.expect("exists"));
    assert!(store.load(key).await.expect("load empty").is_empty());
}

async fn clear<S: BlobStore + ?Sized>(store: &S, key: &str) {
    match store.delete(key).await {
        Ok(()) | Err(StoreError::NotFound { .. }) => {}
        Err(err) => panic!("could not clear {key}: {err}"),
    }
}
