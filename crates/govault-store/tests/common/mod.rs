//! Shared contract suite for the StorageBackend capability set.
//!
//! Every conforming backend must pass these.

use std::future::Future;
use std::sync::Arc;

use govault_store::{StorageBackend, StorageError, StoragePath};

pub fn p(raw: &str) -> StoragePath {
    StoragePath::new(raw).unwrap()
}

async fn contract_round_trip(backend: Arc<dyn StorageBackend>) {
    let path = p("receipts/session-1/receipt-1.json");
    backend.write(&path, b"{\"a\":1}").await.unwrap();
    assert_eq!(backend.read(&path).await.unwrap(), b"{\"a\":1}");
}

async fn contract_overwrite_last_writer_wins(backend: Arc<dyn StorageBackend>) {
    let path = p("manifests/1.0.0.json");
    backend.write(&path, b"first").await.unwrap();
    backend.write(&path, b"second").await.unwrap();
    assert_eq!(backend.read(&path).await.unwrap(), b"second");
}

async fn contract_missing_is_not_found(backend: Arc<dyn StorageBackend>) {
    let err = backend.read(&p("nope/missing.json")).await.unwrap_err();
    assert!(matches!(err, StorageError::NotFound { .. }));
    assert!(!backend.exists(&p("nope/missing.json")).await.unwrap());
}

async fn contract_list_prefix(backend: Arc<dyn StorageBackend>) {
    backend.write(&p("receipts/s1/a.json"), b"a").await.unwrap();
    backend.write(&p("receipts/s1/b.json"), b"b").await.unwrap();
    backend.write(&p("receipts/s2/c.json"), b"c").await.unwrap();
    backend.write(&p("manifests/1.json"), b"m").await.unwrap();

    let s1: Vec<String> = backend
        .list("receipts/s1/")
        .await
        .unwrap()
        .into_iter()
        .map(String::from)
        .collect();
    assert_eq!(s1, vec!["receipts/s1/a.json", "receipts/s1/b.json"]);

    let all_receipts = backend.list("receipts/").await.unwrap();
    assert_eq!(all_receipts.len(), 3);

    // Partial segment prefixes match on the logical key string.
    let partial = backend.list("receipts/s").await.unwrap();
    assert_eq!(partial.len(), 3);
}

async fn contract_list_unmatched_prefix_is_empty_success(backend: Arc<dyn StorageBackend>) {
    backend.write(&p("a/b.json"), b"x").await.unwrap();
    assert!(backend.list("zzz/").await.unwrap().is_empty());
    assert!(backend.list("a/b.jsonx").await.unwrap().is_empty());
}

async fn contract_delete(backend: Arc<dyn StorageBackend>) {
    let path = p("tmp/x.json");
    backend.write(&path, b"x").await.unwrap();
    assert!(backend.exists(&path).await.unwrap());
    backend.delete(&path).await.unwrap();
    assert!(!backend.exists(&path).await.unwrap());
    backend.delete(&path).await.unwrap();
}

async fn contract_binary_content(backend: Arc<dyn StorageBackend>) {
    let data: Vec<u8> = (0u8..=255).collect();
    let path = p("blobs/all-bytes.bin");
    backend.write(&path, &data).await.unwrap();
    assert_eq!(backend.read(&path).await.unwrap(), data);
}

async fn contract_health(backend: Arc<dyn StorageBackend>) {
    let health = backend.health_check().await;
    assert!(health.healthy, "{:?}", health.message);
    assert_eq!(health.backend, backend.name());
}

/// Run every contract, each against a fresh backend from `make`.
pub async fn run_all<F, Fut>(make: F)
where
    F: Fn() -> Fut,
    Fut: Future<Output = Arc<dyn StorageBackend>>,
{
    contract_round_trip(make().await).await;
    contract_overwrite_last_writer_wins(make().await).await;
    contract_missing_is_not_found(make().await).await;
    contract_list_prefix(make().await).await;
    contract_list_unmatched_prefix_is_empty_success(make().await).await;
    contract_delete(make().await).await;
    contract_binary_content(make().await).await;
    contract_health(make().await).await;
}
