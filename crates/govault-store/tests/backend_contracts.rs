//! Contract tests for the StorageBackend capability set against the local
//! filesystem backend and the in-memory fake.

mod common;

use std::sync::{Arc, Mutex};

use common::{p, run_all};
use govault_store::fakes::MemoryBackend;
use govault_store::{LocalBackend, StorageBackend, StorageError};

#[tokio::test]
async fn memory_backend_satisfies_contract() {
    run_all(|| {
        let backend: Arc<dyn StorageBackend> = Arc::new(MemoryBackend::default());
        std::future::ready(backend)
    })
    .await;
}

#[tokio::test]
async fn local_backend_satisfies_contract() {
    let dirs = Mutex::new(Vec::new());
    run_all(|| {
        let dir = tempfile::tempdir().unwrap();
        let backend: Arc<dyn StorageBackend> = Arc::new(LocalBackend::new(dir.path()).unwrap());
        dirs.lock().unwrap().push(dir);
        std::future::ready(backend)
    })
    .await;
}

#[tokio::test]
async fn memory_backend_detects_tampering() {
    let backend = MemoryBackend::default();
    let path = p("receipts/s/r.json");
    backend.write(&path, b"honest").await.unwrap();
    assert!(backend.tamper(&path, b"forged"));

    let err = backend.read(&path).await.unwrap_err();
    assert!(matches!(err, StorageError::IntegrityMismatch { .. }));
    assert!(err.to_string().contains("hash mismatch"));
}

#[tokio::test]
async fn local_backend_detects_tampering_of_raw_content() {
    let dir = tempfile::tempdir().unwrap();
    let backend = LocalBackend::new(dir.path()).unwrap();
    let path = p("receipts/s/r.json");
    backend.write(&path, b"{\"amount\":10}").await.unwrap();

    std::fs::write(dir.path().join("receipts/s/r.json"), b"{\"amount\":99}").unwrap();

    let err = backend.read(&path).await.unwrap_err();
    assert!(err.to_string().contains("hash mismatch"));
}

#[tokio::test]
async fn local_backend_data_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = p("manifests/2.0.0.json");
    LocalBackend::new(dir.path())
        .unwrap()
        .write(&path, b"persisted")
        .await
        .unwrap();

    let reopened = LocalBackend::new(dir.path()).unwrap();
    assert_eq!(reopened.read(&path).await.unwrap(), b"persisted");
}
