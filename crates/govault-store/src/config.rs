//! Storage configuration shape.
//!
//! Backend identifiers stay plain strings here; they are resolved against the
//! configured backend sections when a [`StorageManager`](crate::StorageManager)
//! is constructed.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::StorageError;

/// Known backend identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendId {
    Local,
    ObjectStore,
    Github,
}

impl BackendId {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendId::Local => "local",
            BackendId::ObjectStore => "object-store",
            BackendId::Github => "github",
        }
    }
}

impl fmt::Display for BackendId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendId {
    type Err = StorageError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "local" => Ok(BackendId::Local),
            "object-store" => Ok(BackendId::ObjectStore),
            "github" => Ok(BackendId::Github),
            other => Err(StorageError::UnknownBackend(other.to_string())),
        }
    }
}

/// Local filesystem backend settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalBackendConfig {
    /// Root directory of the store.
    pub path: PathBuf,
}

/// REST object store settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectStoreConfig {
    /// Base URL, e.g. `https://objects.example.com`.
    pub endpoint: String,
    pub bucket: String,
    /// Key prefix inside the bucket.
    #[serde(default)]
    pub prefix: String,
    /// Bearer token (falls back to `GOVAULT_OBJECT_STORE_TOKEN`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

/// Hosted git repository (GitHub contents API) settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GithubConfig {
    pub owner: String,
    pub repo: String,
    #[serde(default = "default_branch")]
    pub branch: String,
    /// Directory inside the repository that acts as the store root.
    #[serde(default)]
    pub base_path: String,
    /// API token (falls back to `GOVAULT_GITHUB_TOKEN`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(default = "default_github_api")]
    pub api_url: String,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

impl GithubConfig {
    pub fn new(owner: &str, repo: &str) -> Self {
        GithubConfig {
            owner: owner.to_string(),
            repo: repo.to_string(),
            branch: default_branch(),
            base_path: String::new(),
            token: None,
            api_url: default_github_api(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

/// Storage section of the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Identifier of the authoritative backend.
    pub primary: String,
    /// Identifiers of best-effort backup backends, in order.
    #[serde(default)]
    pub backup: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local: Option<LocalBackendConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object_store: Option<ObjectStoreConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub github: Option<GithubConfig>,
    /// Upper bound on each backup write before it is reported as failed.
    #[serde(default = "default_replication_timeout_ms")]
    pub replication_timeout_ms: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig {
            primary: BackendId::Local.to_string(),
            backup: Vec::new(),
            local: Some(LocalBackendConfig {
                path: PathBuf::from(".govault/storage"),
            }),
            object_store: None,
            github: None,
            replication_timeout_ms: default_replication_timeout_ms(),
        }
    }
}

impl StorageConfig {
    /// Local-only configuration rooted at `path`.
    pub fn local(path: impl Into<PathBuf>) -> Self {
        StorageConfig {
            local: Some(LocalBackendConfig { path: path.into() }),
            ..Self::default()
        }
    }

    /// Whether the settings section for `id` is present.
    pub fn has_section(&self, id: BackendId) -> bool {
        match id {
            BackendId::Local => self.local.is_some(),
            BackendId::ObjectStore => self.object_store.is_some(),
            BackendId::Github => self.github.is_some(),
        }
    }
}

fn default_branch() -> String {
    "main".to_string()
}

fn default_github_api() -> String {
    "https://api.github.com".to_string()
}

fn default_request_timeout_ms() -> u64 {
    10_000
}

fn default_replication_timeout_ms() -> u64 {
    30_000
}
