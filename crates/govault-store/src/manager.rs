//! Storage manager: one primary backend plus best-effort backups.
//!
//! The primary is authoritative. Writes and deletes go to the primary and are
//! then replicated to every backup; a backup failure is logged and reported
//! in the [`WriteReport`] but never changes the outcome. Backups provide
//! redundancy, not consistency: there is no quorum and no read failover.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::backend::{BackendHealth, StorageBackend};
use crate::config::{BackendId, StorageConfig};
use crate::error::{StorageError, StorageResult};
use crate::github::GithubBackend;
use crate::local::LocalBackend;
use crate::object_store::ObjectStoreBackend;
use crate::obs;
use crate::path::StoragePath;

/// Default bound on a single backend health probe.
pub const DEFAULT_HEALTH_TIMEOUT: Duration = Duration::from_secs(5);

/// Default bound on a single backup write.
pub const DEFAULT_REPLICATION_TIMEOUT: Duration = Duration::from_secs(30);

/// Position of a backend in the manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendRole {
    Primary,
    Backup,
}

/// Health entry for one managed backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagedHealth {
    pub role: BackendRole,
    #[serde(flatten)]
    pub health: BackendHealth,
}

/// A backup that did not accept a replicated operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupFailure {
    pub backend: String,
    pub error: String,
}

/// Outcome of a successful primary write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteReport {
    pub path: StoragePath,
    pub backup_failures: Vec<BackupFailure>,
}

impl WriteReport {
    /// Whether every backup accepted the write.
    pub fn fully_replicated(&self) -> bool {
        self.backup_failures.is_empty()
    }
}

/// Build the backend selected by `id` from its configuration section.
pub fn build_backend(id: &str, config: &StorageConfig) -> StorageResult<Arc<dyn StorageBackend>> {
    let backend_id: BackendId = id.parse()?;
    let missing = || StorageError::MissingBackendConfig(backend_id.to_string());

    let backend: Arc<dyn StorageBackend> = match backend_id {
        BackendId::Local => {
            let local = config.local.as_ref().ok_or_else(missing)?;
            Arc::new(LocalBackend::open(local.path.clone()))
        }
        BackendId::ObjectStore => {
            let settings = config.object_store.clone().ok_or_else(missing)?;
            Arc::new(ObjectStoreBackend::new(settings)?)
        }
        BackendId::Github => {
            let settings = config.github.clone().ok_or_else(missing)?;
            Arc::new(GithubBackend::new(settings)?)
        }
    };
    Ok(backend)
}

/// Operation replicated to backups.
#[derive(Clone, Copy)]
enum Replication<'c> {
    Write(&'c [u8]),
    Delete,
}

/// Routes storage operations across a primary and its backups.
pub struct StorageManager {
    primary: Arc<dyn StorageBackend>,
    backups: Vec<Arc<dyn StorageBackend>>,
    health_timeout: Duration,
    replication_timeout: Duration,
}

impl StorageManager {
    pub fn new(primary: Arc<dyn StorageBackend>, backups: Vec<Arc<dyn StorageBackend>>) -> Self {
        Self {
            primary,
            backups,
            health_timeout: DEFAULT_HEALTH_TIMEOUT,
            replication_timeout: DEFAULT_REPLICATION_TIMEOUT,
        }
    }

    /// Resolve `primary` / `backup` identifiers against the configured sections.
    pub fn from_config(config: &StorageConfig) -> StorageResult<Self> {
        let primary = build_backend(&config.primary, config)?;
        let backups = config
            .backup
            .iter()
            .map(|id| build_backend(id, config))
            .collect::<StorageResult<Vec<_>>>()?;

        info!(
            primary = %config.primary,
            backups = ?config.backup,
            "storage manager configured"
        );
        Ok(Self::new(primary, backups)
            .with_replication_timeout(Duration::from_millis(config.replication_timeout_ms)))
    }

    /// Bound each backend health probe.
    pub fn with_health_timeout(mut self, timeout: Duration) -> Self {
        self.health_timeout = timeout;
        self
    }

    /// Bound each backup write/delete.
    pub fn with_replication_timeout(mut self, timeout: Duration) -> Self {
        self.replication_timeout = timeout;
        self
    }

    pub fn primary(&self) -> &Arc<dyn StorageBackend> {
        &self.primary
    }

    pub fn backups(&self) -> &[Arc<dyn StorageBackend>] {
        &self.backups
    }

    /// Write to the primary, then replicate to every backup.
    ///
    /// Succeeds if and only if the primary write succeeds.
    pub async fn write(&self, path: &StoragePath, content: &[u8]) -> StorageResult<WriteReport> {
        let primary = self.primary.write(path, content).await;
        let backup_failures = self.replicate(path, Replication::Write(content)).await;

        match primary {
            Ok(()) => {
                obs::emit_write_completed(
                    self.primary.name(),
                    path.as_str(),
                    content.len(),
                    backup_failures.len(),
                );
                Ok(WriteReport {
                    path: path.clone(),
                    backup_failures,
                })
            }
            Err(e) => {
                warn!(
                    backend = %self.primary.name(),
                    path = %path,
                    error = %e,
                    "primary write failed"
                );
                Err(e)
            }
        }
    }

    /// Read from the primary only, verified against its integrity tag.
    pub async fn read(&self, path: &StoragePath) -> StorageResult<Vec<u8>> {
        self.primary.read(path).await
    }

    pub async fn exists(&self, path: &StoragePath) -> StorageResult<bool> {
        self.primary.exists(path).await
    }

    /// Delete from the primary, then best-effort from every backup.
    pub async fn delete(&self, path: &StoragePath) -> StorageResult<Vec<BackupFailure>> {
        let primary = self.primary.delete(path).await;
        let backup_failures = self.replicate(path, Replication::Delete).await;
        primary.map(|()| backup_failures)
    }

    pub async fn list(&self, prefix: &str) -> StorageResult<Vec<StoragePath>> {
        self.primary.list(prefix).await
    }

    async fn replicate(&self, path: &StoragePath, op: Replication<'_>) -> Vec<BackupFailure> {
        let timeout = self.replication_timeout;
        let attempts = self.backups.iter().map(|backend| async move {
            let attempt = async {
                match op {
                    Replication::Write(content) => backend.write(path, content).await,
                    Replication::Delete => backend.delete(path).await,
                }
            };
            let outcome = match tokio::time::timeout(timeout, attempt).await {
                Ok(outcome) => outcome,
                Err(_) => Err(StorageError::BackendUnavailable {
                    backend: backend.name().to_string(),
                    reason: format!("timed out after {}ms", timeout.as_millis()),
                }),
            };
            (backend.name().to_string(), outcome)
        });

        join_all(attempts)
            .await
            .into_iter()
            .filter_map(|(backend, outcome)| {
                outcome.err().map(|e| {
                    obs::emit_backup_failed(&backend, path.as_str(), &e);
                    BackupFailure {
                        backend,
                        error: e.to_string(),
                    }
                })
            })
            .collect()
    }

    /// Probe every backend concurrently, one entry per backend in configured
    /// order (primary first). A failing or hung backend yields an unhealthy
    /// entry and never prevents the others from reporting.
    pub async fn health_check_all(&self) -> Vec<ManagedHealth> {
        let timeout = self.health_timeout;
        let roles = std::iter::once((BackendRole::Primary, &self.primary))
            .chain(self.backups.iter().map(|b| (BackendRole::Backup, b)));

        let probes = roles.map(|(role, backend)| {
            let backend = Arc::clone(backend);
            async move {
                let name = backend.name().to_string();
                let started = Instant::now();
                let mut task = tokio::spawn(async move { backend.health_check().await });

                let health = match tokio::time::timeout(timeout, &mut task).await {
                    Ok(Ok(health)) => health,
                    Ok(Err(join_error)) => BackendHealth::unhealthy(
                        &name,
                        started.elapsed(),
                        format!("health check aborted: {}", join_error),
                    ),
                    Err(_) => {
                        task.abort();
                        BackendHealth::unhealthy(
                            &name,
                            started.elapsed(),
                            format!("health check timed out after {}ms", timeout.as_millis()),
                        )
                    }
                };
                obs::emit_backend_health(&health.backend, health.healthy, health.latency_ms);
                ManagedHealth { role, health }
            }
        });

        join_all(probes).await
    }
}
