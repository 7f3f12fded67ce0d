use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use futures::future::join_all;
use tracing::{debug, Instrument};

use super::probes::{ConfigProbe, GovernanceProbe, LedgerProbe, StorageProbe};
use super::{ComponentHealth, HealthProbe, HealthReport};
use crate::config::GovaultConfig;
use crate::obs;

/// Which pipeline a run uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthMode {
    /// Every probe, including network-bound ones unless skipped.
    Full,
    /// Local checks only, bounded by the quick budget.
    Quick,
}

impl HealthMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            HealthMode::Full => "full",
            HealthMode::Quick => "quick",
        }
    }
}

/// Knobs for a full run.
#[derive(Debug, Clone, Default)]
pub struct HealthcheckOptions {
    pub skip_chain: bool,
    pub skip_storage: bool,
    /// Overrides `health.probe_timeout_ms`.
    pub probe_timeout: Option<Duration>,
}

/// An assembled probe set ready to run.
pub struct Healthcheck {
    mode: HealthMode,
    timeout: Duration,
    probes: Vec<Arc<dyn HealthProbe>>,
}

impl Healthcheck {
    /// Empty probe set. Each probe added later is bounded by `timeout`.
    pub fn new(mode: HealthMode, timeout: Duration) -> Self {
        Self {
            mode,
            timeout,
            probes: Vec::new(),
        }
    }

    pub fn with_probe(mut self, probe: impl HealthProbe + 'static) -> Self {
        self.probes.push(Arc::new(probe));
        self
    }

    /// Full pipeline: config, governance, storage, ledger.
    ///
    /// The ledger probe is only built when a `[chain]` section exists.
    pub fn from_config(config: &GovaultConfig, options: &HealthcheckOptions) -> Self {
        let timeout = options
            .probe_timeout
            .unwrap_or_else(|| Duration::from_millis(config.health.probe_timeout_ms));

        let mut check = Self::new(HealthMode::Full, timeout)
            .with_probe(ConfigProbe::new(config.clone()))
            .with_probe(GovernanceProbe::new(&config.governance_dir));

        if options.skip_storage {
            debug!("storage probe skipped");
        } else {
            check = check.with_probe(StorageProbe::from_config(&config.storage, timeout));
        }

        match (&config.chain, options.skip_chain) {
            (Some(chain), false) => check = check.with_probe(LedgerProbe::new(chain, timeout)),
            (None, false) => debug!("no [chain] section; ledger probe not configured"),
            (_, true) => debug!("ledger probe skipped"),
        }
        check
    }

    /// Quick pipeline: pure and local-file checks only.
    pub fn quick(config: &GovaultConfig) -> Self {
        Self::new(
            HealthMode::Quick,
            Duration::from_millis(config.health.quick_budget_ms),
        )
        .with_probe(ConfigProbe::new(config.clone()))
        .with_probe(GovernanceProbe::new(&config.governance_dir))
    }

    pub fn mode(&self) -> HealthMode {
        self.mode
    }

    /// Names of the probes in pipeline order.
    pub fn probe_names(&self) -> Vec<&str> {
        self.probes.iter().map(|p| p.name()).collect()
    }

    /// Run every probe concurrently and assemble the report.
    ///
    /// Components keep pipeline order. A probe that times out or panics
    /// becomes a single failed entry under its own name.
    pub async fn run(&self) -> HealthReport {
        let timestamp = Utc::now();
        let started = Instant::now();
        let mode = self.mode.as_str();

        let components = self
            .run_probes()
            .instrument(obs::healthcheck_span(mode))
            .await;

        let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        let report = HealthReport::new(timestamp, duration_ms, components);

        let _span = obs::HealthcheckSpan::enter(mode);
        for c in &report.components {
            obs::emit_component(&c.name, c.healthy, c.latency_ms);
        }
        obs::emit_report(
            mode,
            report.healthy,
            report.duration_ms,
            report.components.len(),
            report.failed_components().count(),
        );
        report
    }

    async fn run_probes(&self) -> Vec<ComponentHealth> {
        let timeout = self.timeout;
        let runs = self.probes.iter().map(|probe| {
            let probe = Arc::clone(probe);
            async move {
                let name = probe.name().to_string();
                let started = Instant::now();
                let mut task = tokio::spawn(async move { probe.check().await });

                match tokio::time::timeout(timeout, &mut task).await {
                    Ok(Ok(components)) => components,
                    Ok(Err(join_error)) => {
                        obs::emit_probe_aborted(&name, &join_error);
                        vec![ComponentHealth::failed(
                            name,
                            format!("probe aborted: {}", join_error),
                        )]
                    }
                    Err(_) => {
                        task.abort();
                        let timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
                        obs::emit_probe_timeout(&name, timeout_ms);
                        let elapsed =
                            u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
                        vec![ComponentHealth::failed(
                            name,
                            format!("probe timed out after {}ms", timeout_ms),
                        )
                        .with_latency(elapsed)]
                    }
                }
            }
        });

        join_all(runs).await.into_iter().flatten().collect()
    }
}

/// Full healthcheck.
pub async fn run_healthcheck(config: &GovaultConfig, options: &HealthcheckOptions) -> HealthReport {
    Healthcheck::from_config(config, options).run().await
}

/// Quick healthcheck: no network-bound probes.
pub async fn run_quick_healthcheck(config: &GovaultConfig) -> HealthReport {
    Healthcheck::quick(config).run().await
}
