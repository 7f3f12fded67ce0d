//! Govault Core: validated configuration and operational health
//!
//! ## Key Components
//!
//! - `GovaultConfig` / `validate_config`: explicit configuration struct and a
//!   pure validator that reports every issue at once
//! - `Healthcheck`: concurrent probe pipeline (config, governance registry,
//!   storage backends, ledger) producing a `HealthReport`
//! - `LedgerClient`: minimal JSON-RPC client used by the ledger probe
//! - `telemetry` / `obs`: tracing initialisation and structured health events

pub mod config;
mod error;
pub mod health;
pub mod ledger;
pub mod obs;
pub mod telemetry;

pub use config::{
    validate_config, ApprovalConfig, ChainConfig, ConfigValidation, GovaultConfig, HealthConfig,
    SUPPORTED_VERSION,
};
pub use error::{ConfigError, ConfigResult, LedgerError, LedgerResult};
pub use health::{
    run_healthcheck, run_quick_healthcheck, ComponentHealth, ConfigProbe, GovernanceProbe,
    HealthMode, HealthProbe, HealthReport, Healthcheck, HealthcheckOptions, LedgerProbe,
    StorageProbe,
};
pub use ledger::LedgerClient;
