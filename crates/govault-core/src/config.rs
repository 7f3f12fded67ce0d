//! Govault configuration.
//!
//! Parsed from TOML (or JSON, by extension) into an explicit struct with
//! documented defaults, then checked by [`validate_config`], a pure function
//! that reports every problem it finds instead of stopping at the first.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use govault_store::{BackendId, StorageConfig};

use crate::error::{ConfigError, ConfigResult};

/// The only configuration version this release understands.
pub const SUPPORTED_VERSION: &str = "0.5";

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GovaultConfig {
    pub version: String,
    #[serde(default)]
    pub storage: StorageConfig,
    pub approval: ApprovalConfig,
    /// Directory holding the governance registry (`registry.json`).
    #[serde(default = "default_governance_dir")]
    pub governance_dir: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chain: Option<ChainConfig>,
    #[serde(default)]
    pub health: HealthConfig,
}

/// Approval rate limits. Signed so that non-positive input survives parsing
/// and is rejected by validation with a proper message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalConfig {
    pub max_approvals_per_hour: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_approvals_per_day: Option<i64>,
}

/// External ledger connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainConfig {
    /// JSON-RPC endpoint.
    pub rpc_url: String,
    /// Expected chain id; checked by the ledger probe when set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chain_id: Option<u64>,
}

/// Healthcheck timing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthConfig {
    /// Per-probe timeout for full runs.
    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,
    /// Per-probe timeout for quick runs.
    #[serde(default = "default_quick_budget_ms")]
    pub quick_budget_ms: u64,
}

impl Default for HealthConfig {
    fn default() -> Self {
        HealthConfig {
            probe_timeout_ms: default_probe_timeout_ms(),
            quick_budget_ms: default_quick_budget_ms(),
        }
    }
}

fn default_governance_dir() -> PathBuf {
    PathBuf::from("governance")
}

fn default_probe_timeout_ms() -> u64 {
    5_000
}

fn default_quick_budget_ms() -> u64 {
    500
}

impl GovaultConfig {
    /// Minimal valid configuration with a local primary at `storage_path`.
    pub fn local(storage_path: impl Into<PathBuf>, governance_dir: impl Into<PathBuf>) -> Self {
        GovaultConfig {
            version: SUPPORTED_VERSION.to_string(),
            storage: StorageConfig::local(storage_path),
            approval: ApprovalConfig {
                max_approvals_per_hour: 10,
                max_approvals_per_day: None,
            },
            governance_dir: governance_dir.into(),
            chain: None,
            health: HealthConfig::default(),
        }
    }

    /// Load from a file. `.json` files are parsed as JSON, anything else as TOML.
    ///
    /// Loading only checks shape; call [`validate_config`] for value rules.
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Load {
            path: path.to_path_buf(),
            source,
        })?;

        let is_json = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("json"));

        let parsed = if is_json {
            serde_json::from_str(&raw).map_err(|e| e.to_string())
        } else {
            toml::from_str(&raw).map_err(|e| e.to_string())
        };
        parsed.map_err(|reason| ConfigError::Parse {
            path: path.to_path_buf(),
            reason,
        })
    }

    pub fn from_toml_str(raw: &str) -> ConfigResult<Self> {
        toml::from_str(raw).map_err(|e| ConfigError::Parse {
            path: PathBuf::from("<inline>"),
            reason: e.to_string(),
        })
    }
}

/// Outcome of [`validate_config`].
#[derive(Debug, Default)]
pub struct ConfigValidation {
    pub errors: Vec<ConfigError>,
}

impl ConfigValidation {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// First error, if any. Callers that only need pass/fail use this.
    pub fn into_result(self) -> ConfigResult<()> {
        match self.errors.into_iter().next() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl fmt::Display for ConfigValidation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.errors.is_empty() {
            return write!(f, "configuration valid");
        }
        let issues: Vec<String> = self.errors.iter().map(ToString::to_string).collect();
        write!(f, "{}", issues.join("; "))
    }
}

/// Check value rules. Pure: no I/O, no environment access.
pub fn validate_config(config: &GovaultConfig) -> ConfigValidation {
    let mut errors = Vec::new();

    if config.version != SUPPORTED_VERSION {
        errors.push(ConfigError::UnsupportedVersion {
            found: config.version.clone(),
            expected: SUPPORTED_VERSION,
        });
    }

    if config.approval.max_approvals_per_hour <= 0 {
        errors.push(ConfigError::invalid(
            "approval.max_approvals_per_hour",
            format!(
                "must be a positive integer, got {}",
                config.approval.max_approvals_per_hour
            ),
        ));
    }
    if let Some(per_day) = config.approval.max_approvals_per_day {
        if per_day <= 0 {
            errors.push(ConfigError::invalid(
                "approval.max_approvals_per_day",
                format!("must be a positive integer, got {}", per_day),
            ));
        }
    }

    validate_storage(&config.storage, &mut errors);

    if let Some(chain) = &config.chain {
        if !(chain.rpc_url.starts_with("http://") || chain.rpc_url.starts_with("https://")) {
            errors.push(ConfigError::invalid(
                "chain.rpc_url",
                format!("must be an http(s) URL, got '{}'", chain.rpc_url),
            ));
        }
    }

    if config.health.probe_timeout_ms == 0 {
        errors.push(ConfigError::invalid("health.probe_timeout_ms", "must be non-zero"));
    }
    if config.health.quick_budget_ms == 0 {
        errors.push(ConfigError::invalid("health.quick_budget_ms", "must be non-zero"));
    }

    ConfigValidation { errors }
}

fn validate_storage(storage: &StorageConfig, errors: &mut Vec<ConfigError>) {
    let mut check_id = |field: &str, raw: &str| match raw.parse::<BackendId>() {
        Ok(id) if !storage.has_section(id) => errors.push(ConfigError::invalid(
            field,
            format!("backend '{}' has no [storage.{}] section", raw, section_name(id)),
        )),
        Ok(_) => {}
        Err(e) => errors.push(ConfigError::invalid(field, e.to_string())),
    };

    check_id("storage.primary", &storage.primary);
    for (i, backup) in storage.backup.iter().enumerate() {
        check_id(&format!("storage.backup[{}]", i), backup);
    }

    if storage.backup.iter().any(|b| b == &storage.primary) {
        errors.push(ConfigError::invalid(
            "storage.backup",
            format!("must not repeat the primary backend '{}'", storage.primary),
        ));
    }
    if storage.replication_timeout_ms == 0 {
        errors.push(ConfigError::invalid(
            "storage.replication_timeout_ms",
            "must be non-zero",
        ));
    }
}

fn section_name(id: BackendId) -> &'static str {
    match id {
        BackendId::Local => "local",
        BackendId::ObjectStore => "object_store",
        BackendId::Github => "github",
    }
}
