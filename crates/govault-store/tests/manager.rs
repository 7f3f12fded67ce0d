//! Storage manager behaviour: primary-authoritative writes, best-effort
//! backups, and health aggregation that survives failing backends.

use std::sync::Arc;
use std::time::{Duration, Instant};

use govault_store::fakes::{HangingBackend, MemoryBackend, UnavailableBackend};
use govault_store::{BackendRole, StorageBackend, StorageError, StorageManager, StoragePath};

fn p(raw: &str) -> StoragePath {
    StoragePath::new(raw).unwrap()
}

#[tokio::test]
async fn write_replicates_to_all_backups() {
    let primary = Arc::new(MemoryBackend::new("primary"));
    let b1 = Arc::new(MemoryBackend::new("b1"));
    let b2 = Arc::new(MemoryBackend::new("b2"));
    let manager = StorageManager::new(primary.clone(), vec![b1.clone(), b2.clone()]);

    let report = manager.write(&p("k.json"), b"v").await.unwrap();
    assert!(report.fully_replicated());
    assert_eq!(b1.read(&p("k.json")).await.unwrap(), b"v");
    assert_eq!(b2.read(&p("k.json")).await.unwrap(), b"v");
}

#[tokio::test]
async fn backup_failure_never_fails_the_write() {
    let primary = Arc::new(MemoryBackend::new("primary"));
    let healthy_backup = Arc::new(MemoryBackend::new("healthy"));
    let manager = StorageManager::new(
        primary.clone(),
        vec![
            Arc::new(UnavailableBackend::new("down")),
            healthy_backup.clone(),
        ],
    );

    let report = manager.write(&p("receipts/s/r.json"), b"data").await.unwrap();
    assert_eq!(report.backup_failures.len(), 1);
    assert_eq!(report.backup_failures[0].backend, "down");
    assert!(report.backup_failures[0].error.contains("unavailable"));

    assert_eq!(manager.read(&p("receipts/s/r.json")).await.unwrap(), b"data");
    assert!(healthy_backup.exists(&p("receipts/s/r.json")).await.unwrap());
}

#[tokio::test]
async fn primary_failure_fails_the_write_even_if_backups_succeed() {
    let backup = Arc::new(MemoryBackend::new("backup"));
    let manager = StorageManager::new(
        Arc::new(UnavailableBackend::new("primary")),
        vec![backup.clone()],
    );

    let err = manager.write(&p("k.json"), b"v").await.unwrap_err();
    assert!(matches!(err, StorageError::BackendUnavailable { .. }));
    // Backups are still attempted best-effort.
    assert!(backup.exists(&p("k.json")).await.unwrap());
}

#[tokio::test]
async fn hung_backup_is_bounded_by_replication_timeout() {
    let manager = StorageManager::new(
        Arc::new(MemoryBackend::new("primary")),
        vec![Arc::new(HangingBackend::new("stuck"))],
    )
    .with_replication_timeout(Duration::from_millis(50));

    let report = manager.write(&p("k.json"), b"v").await.unwrap();
    assert_eq!(report.backup_failures.len(), 1);
    assert!(report.backup_failures[0].error.contains("timed out"));
}

#[tokio::test]
async fn reads_come_from_primary_only() {
    let primary = Arc::new(MemoryBackend::new("primary"));
    let backup = Arc::new(MemoryBackend::new("backup"));
    backup.write(&p("only-in-backup.json"), b"x").await.unwrap();
    let manager = StorageManager::new(primary, vec![backup]);

    assert!(matches!(
        manager.read(&p("only-in-backup.json")).await,
        Err(StorageError::NotFound { .. })
    ));
    assert!(!manager.exists(&p("only-in-backup.json")).await.unwrap());
    assert!(manager.list("").await.unwrap().is_empty());
}

#[tokio::test]
async fn tampered_primary_content_is_rejected() {
    let primary = Arc::new(MemoryBackend::new("primary"));
    let manager = StorageManager::new(primary.clone(), vec![]);
    manager.write(&p("m.json"), b"original").await.unwrap();
    primary.tamper(&p("m.json"), b"altered");

    let err = manager.read(&p("m.json")).await.unwrap_err();
    assert!(err.to_string().contains("hash mismatch"));
}

#[tokio::test]
async fn health_check_all_reports_every_backend_in_order() {
    let manager = StorageManager::new(
        Arc::new(MemoryBackend::new("primary")),
        vec![
            Arc::new(UnavailableBackend::new("down")),
            Arc::new(MemoryBackend::new("up")),
        ],
    );

    let results = manager.health_check_all().await;
    let names: Vec<&str> = results.iter().map(|r| r.health.backend.as_str()).collect();
    assert_eq!(names, vec!["primary", "down", "up"]);
    assert_eq!(results[0].role, BackendRole::Primary);
    assert_eq!(results[1].role, BackendRole::Backup);
    assert!(results[0].health.healthy);
    assert!(!results[1].health.healthy);
    assert!(results[2].health.healthy);
}

#[tokio::test]
async fn hung_backend_health_times_out_without_blocking_others() {
    let manager = StorageManager::new(
        Arc::new(HangingBackend::new("stuck")),
        vec![Arc::new(MemoryBackend::new("up"))],
    )
    .with_health_timeout(Duration::from_millis(100));

    let started = Instant::now();
    let results = manager.health_check_all().await;
    assert!(started.elapsed() < Duration::from_secs(5));

    assert_eq!(results.len(), 2);
    assert!(!results[0].health.healthy);
    assert!(results[0]
        .health
        .message
        .as_deref()
        .unwrap()
        .contains("timed out"));
    assert!(results[1].health.healthy);
}

#[tokio::test]
async fn managed_health_serializes_flat() {
    let manager = StorageManager::new(Arc::new(MemoryBackend::new("primary")), vec![]);
    let results = manager.health_check_all().await;
    let json = serde_json::to_value(&results[0]).unwrap();
    assert_eq!(json["role"], "primary");
    assert_eq!(json["backend"], "primary");
    assert_eq!(json["healthy"], true);
}

#[tokio::test]
async fn configured_local_root_is_not_created_by_health_checks() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("unmounted/volume");
    let manager =
        StorageManager::from_config(&govault_store::StorageConfig::local(&root)).unwrap();

    let results = manager.health_check_all().await;
    assert_eq!(results.len(), 1);
    assert!(!results[0].health.healthy);
    assert!(!root.exists());
}
