//! Healthcheck orchestration.
//!
//! A run is a short pipeline: validate configuration, check the governance
//! registry, probe storage backends, probe the ledger, assemble a report.
//! Probes run concurrently, each raced against a timeout, and a failing
//! probe only ever produces failed component entries.

mod orchestrator;
mod probes;
mod report;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use orchestrator::{
    run_healthcheck, run_quick_healthcheck, HealthMode, Healthcheck, HealthcheckOptions,
};
pub use probes::{ConfigProbe, GovernanceProbe, LedgerProbe, StorageProbe, REGISTRY_FILE};
pub use report::HealthReport;

/// Health of one component in a report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub name: String,
    pub healthy: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
}

impl ComponentHealth {
    pub fn ok(name: impl Into<String>) -> Self {
        ComponentHealth {
            name: name.into(),
            healthy: true,
            message: None,
            latency_ms: None,
        }
    }

    pub fn failed(name: impl Into<String>, message: impl Into<String>) -> Self {
        ComponentHealth {
            name: name.into(),
            healthy: false,
            message: Some(message.into()),
            latency_ms: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_latency(mut self, latency_ms: u64) -> Self {
        self.latency_ms = Some(latency_ms);
        self
    }
}

/// One step of the healthcheck pipeline.
///
/// `check` must not fail: problems are reported as unhealthy entries. A
/// probe may report several components (one per storage backend, say).
#[async_trait]
pub trait HealthProbe: Send + Sync {
    /// Component name used when the probe itself times out or panics.
    fn name(&self) -> &str;

    async fn check(&self) -> Vec<ComponentHealth>;
}
