//! Built-in health probes.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::Deserialize;

use govault_store::{BackendRole, StorageConfig, StorageManager};

use super::{ComponentHealth, HealthProbe};
use crate::config::{validate_config, ChainConfig, GovaultConfig};
use crate::ledger::LedgerClient;

/// Registry file expected inside the governance directory.
pub const REGISTRY_FILE: &str = "registry.json";

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

// ---------------------------------------------------------------------------
// ConfigProbe
// ---------------------------------------------------------------------------

/// Validates the configuration shape and value ranges.
pub struct ConfigProbe {
    config: GovaultConfig,
}

impl ConfigProbe {
    pub fn new(config: GovaultConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl HealthProbe for ConfigProbe {
    fn name(&self) -> &str {
        "config"
    }

    async fn check(&self) -> Vec<ComponentHealth> {
        let started = Instant::now();
        let validation = validate_config(&self.config);
        let component = if validation.is_valid() {
            ComponentHealth::ok("config").with_message(format!("version {}", self.config.version))
        } else {
            ComponentHealth::failed("config", validation.to_string())
        };
        vec![component.with_latency(elapsed_ms(started))]
    }
}

// ---------------------------------------------------------------------------
// GovernanceProbe
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct GovernanceRegistry {
    #[serde(default)]
    contract_address: String,
    #[serde(default)]
    network: Option<String>,
}

/// Checks that the governance registry is present and names a contract.
pub struct GovernanceProbe {
    dir: PathBuf,
}

impl GovernanceProbe {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    async fn inspect(dir: &Path) -> Result<String, String> {
        let meta = tokio::fs::metadata(dir)
            .await
            .map_err(|e| format!("governance directory {} not accessible: {}", dir.display(), e))?;
        if !meta.is_dir() {
            return Err(format!("{} is not a directory", dir.display()));
        }

        let registry_path = dir.join(REGISTRY_FILE);
        let raw = tokio::fs::read(&registry_path)
            .await
            .map_err(|e| format!("{} not readable: {}", registry_path.display(), e))?;
        let registry: GovernanceRegistry = serde_json::from_slice(&raw)
            .map_err(|e| format!("{} is not valid JSON: {}", registry_path.display(), e))?;

        if registry.contract_address.trim().is_empty() {
            return Err(format!("{} has no contract_address", registry_path.display()));
        }
        Ok(match registry.network {
            Some(network) => format!("registry {} on {}", registry.contract_address, network),
            None => format!("registry {}", registry.contract_address),
        })
    }
}

#[async_trait]
impl HealthProbe for GovernanceProbe {
    fn name(&self) -> &str {
        "governance"
    }

    async fn check(&self) -> Vec<ComponentHealth> {
        let started = Instant::now();
        let component = match Self::inspect(&self.dir).await {
            Ok(message) => ComponentHealth::ok("governance").with_message(message),
            Err(message) => ComponentHealth::failed("governance", message),
        };
        vec![component.with_latency(elapsed_ms(started))]
    }
}

// ---------------------------------------------------------------------------
// StorageProbe
// ---------------------------------------------------------------------------

/// Probes every configured backend; one `storage:<name>` entry each.
pub struct StorageProbe {
    manager: Result<Arc<StorageManager>, String>,
}

impl StorageProbe {
    pub fn new(manager: Arc<StorageManager>) -> Self {
        Self { manager: Ok(manager) }
    }

    /// Build the manager from settings. A construction failure is reported
    /// as an unhealthy `storage` entry when the probe runs.
    ///
    /// Backend probes get slightly less than `timeout` so that their own
    /// timeout entries win over the orchestrator's.
    pub fn from_config(config: &StorageConfig, timeout: Duration) -> Self {
        let manager = StorageManager::from_config(config)
            .map(|m| Arc::new(m.with_health_timeout(timeout.saturating_sub(timeout / 10))))
            .map_err(|e| e.to_string());
        Self { manager }
    }
}

#[async_trait]
impl HealthProbe for StorageProbe {
    fn name(&self) -> &str {
        "storage"
    }

    async fn check(&self) -> Vec<ComponentHealth> {
        let manager = match &self.manager {
            Ok(manager) => manager,
            Err(reason) => return vec![ComponentHealth::failed("storage", reason.clone())],
        };

        manager
            .health_check_all()
            .await
            .into_iter()
            .map(|entry| {
                let role = match entry.role {
                    BackendRole::Primary => "primary",
                    BackendRole::Backup => "backup",
                };
                let name = format!("storage:{}", entry.health.backend);
                let message = match entry.health.message {
                    Some(m) => format!("{}: {}", role, m),
                    None => role.to_string(),
                };
                ComponentHealth {
                    name,
                    healthy: entry.health.healthy,
                    message: Some(message),
                    latency_ms: Some(entry.health.latency_ms),
                }
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// LedgerProbe
// ---------------------------------------------------------------------------

/// Checks ledger connectivity with `eth_blockNumber`, and the chain id when
/// one is configured.
pub struct LedgerProbe {
    client: Result<LedgerClient, String>,
    expected_chain_id: Option<u64>,
}

impl LedgerProbe {
    pub fn new(chain: &ChainConfig, timeout: Duration) -> Self {
        Self {
            client: LedgerClient::new(chain, timeout).map_err(|e| e.to_string()),
            expected_chain_id: chain.chain_id,
        }
    }

    async fn inspect(&self, client: &LedgerClient) -> Result<String, String> {
        let block = client.block_number().await.map_err(|e| e.to_string())?;
        if let Some(expected) = self.expected_chain_id {
            let actual = client.chain_id().await.map_err(|e| e.to_string())?;
            if actual != expected {
                return Err(format!(
                    "chain id mismatch: expected {}, endpoint reports {}",
                    expected, actual
                ));
            }
        }
        Ok(format!("block {} via {}", block, client.rpc_url()))
    }
}

#[async_trait]
impl HealthProbe for LedgerProbe {
    fn name(&self) -> &str {
        "ledger"
    }

    async fn check(&self) -> Vec<ComponentHealth> {
        let started = Instant::now();
        let outcome = match &self.client {
            Ok(client) => self.inspect(client).await,
            Err(reason) => Err(reason.clone()),
        };
        let component = match outcome {
            Ok(message) => ComponentHealth::ok("ledger").with_message(message),
            Err(message) => ComponentHealth::failed("ledger", message),
        };
        vec![component.with_latency(elapsed_ms(started))]
    }
}
