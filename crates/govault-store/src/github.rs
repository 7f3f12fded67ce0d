//! Hosted git repository backend (GitHub contents API).
//!
//! Every write is a commit on the configured branch. The payload lives at
//! `<base_path>/<key>` and its integrity tag is committed next to the store
//! root at `<base_path>/.integrity/<key>.sha256`.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use reqwest::{RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::debug;

use govault_canonical::digest_bytes;

use crate::backend::{check_integrity, BackendHealth, StorageBackend};
use crate::config::GithubConfig;
use crate::error::{StorageError, StorageResult};
use crate::path::{StoragePath, INTEGRITY_DIR};

const TOKEN_ENV: &str = "GOVAULT_GITHUB_TOKEN";
const API_VERSION: &str = "2022-11-28";

/// File entry returned by the contents API.
#[derive(Debug, Deserialize)]
struct ContentsFile {
    sha: String,
    #[serde(default)]
    content: String,
}

#[derive(Debug, Serialize)]
struct PutContents<'a> {
    message: String,
    content: String,
    branch: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    sha: Option<String>,
}

#[derive(Debug, Serialize)]
struct DeleteContents<'a> {
    message: String,
    sha: String,
    branch: &'a str,
}

#[derive(Debug, Deserialize)]
struct TreeEntry {
    path: String,
    #[serde(rename = "type")]
    kind: String,
}

#[derive(Debug, Deserialize)]
struct TreeResponse {
    #[serde(default)]
    tree: Vec<TreeEntry>,
}

/// Decode the base64 body of a contents API file (GitHub wraps it at 60 columns).
pub fn decode_content(encoded: &str) -> Result<Vec<u8>, base64::DecodeError> {
    let compact: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();
    STANDARD.decode(compact)
}

/// GitHub-repository-backed storage.
pub struct GithubBackend {
    name: String,
    config: GithubConfig,
    http_client: reqwest::Client,
}

impl GithubBackend {
    /// Create a backend from settings. The token falls back to
    /// `GOVAULT_GITHUB_TOKEN` when not configured.
    pub fn new(mut config: GithubConfig) -> StorageResult<Self> {
        if config.token.is_none() {
            config.token = std::env::var(TOKEN_ENV).ok();
        }
        let http_client = reqwest::Client::builder()
            .user_agent(concat!("govault-store/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()
            .map_err(|e| StorageError::BackendUnavailable {
                backend: "github".to_string(),
                reason: format!("failed to build HTTP client: {}", e),
            })?;

        Ok(GithubBackend {
            name: "github".to_string(),
            config,
            http_client,
        })
    }

    /// Override the name reported in logs and health entries.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    fn base_path(&self) -> &str {
        self.config.base_path.trim_matches('/')
    }

    /// Repository path of a logical key (payload or tag key).
    pub fn repo_path(&self, key: &str) -> String {
        match self.base_path() {
            "" => key.to_string(),
            base => format!("{}/{}", base, key),
        }
    }

    /// Logical key of a repository path, if it belongs to this store's payloads.
    pub fn logical_key(&self, repo_path: &str) -> Option<String> {
        let rel = match self.base_path() {
            "" => repo_path,
            base => repo_path.strip_prefix(base)?.strip_prefix('/')?,
        };
        if rel.split('/').next() == Some(INTEGRITY_DIR) {
            return None;
        }
        Some(rel.to_string())
    }

    fn repo_url(&self) -> String {
        format!(
            "{}/repos/{}/{}",
            self.config.api_url.trim_end_matches('/'),
            self.config.owner,
            self.config.repo
        )
    }

    fn contents_url(&self, key: &str) -> String {
        format!("{}/contents/{}", self.repo_url(), self.repo_path(key))
    }

    fn request(&self, builder: RequestBuilder) -> RequestBuilder {
        let builder = builder
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", API_VERSION);
        match &self.config.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    fn unavailable(&self, reason: impl std::fmt::Display) -> StorageError {
        StorageError::BackendUnavailable {
            backend: self.name.clone(),
            reason: reason.to_string(),
        }
    }

    async fn get_file(&self, key: &str) -> StorageResult<Option<ContentsFile>> {
        let response = self
            .request(self.http_client.get(self.contents_url(key)))
            .query(&[("ref", self.config.branch.as_str())])
            .send()
            .await
            .map_err(|e| self.unavailable(e))?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                let file = response.json().await.map_err(|e| self.unavailable(e))?;
                Ok(Some(file))
            }
            status => Err(self.unavailable(format!("GET contents {} returned {}", key, status))),
        }
    }

    async fn put_file(&self, key: &str, data: &[u8]) -> StorageResult<()> {
        let existing = self.get_file(key).await?.map(|f| f.sha);
        let body = PutContents {
            message: format!("govault: write {}", key),
            content: STANDARD.encode(data),
            branch: &self.config.branch,
            sha: existing,
        };

        let response = self
            .request(self.http_client.put(self.contents_url(key)))
            .json(&body)
            .send()
            .await
            .map_err(|e| self.unavailable(e))?;

        if !response.status().is_success() {
            return Err(self.unavailable(format!(
                "PUT contents {} returned {}",
                key,
                response.status()
            )));
        }
        Ok(())
    }

    async fn delete_file(&self, key: &str) -> StorageResult<()> {
        let Some(existing) = self.get_file(key).await? else {
            return Ok(());
        };
        let body = DeleteContents {
            message: format!("govault: delete {}", key),
            sha: existing.sha,
            branch: &self.config.branch,
        };

        let response = self
            .request(self.http_client.delete(self.contents_url(key)))
            .json(&body)
            .send()
            .await
            .map_err(|e| self.unavailable(e))?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(()),
            status if status.is_success() => Ok(()),
            status => Err(self.unavailable(format!("DELETE contents {} returned {}", key, status))),
        }
    }
}

#[async_trait]
impl StorageBackend for GithubBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn write(&self, path: &StoragePath, content: &[u8]) -> StorageResult<()> {
        let tag = digest_bytes(content);
        self.put_file(path.as_str(), content).await?;
        self.put_file(&path.tag_key(), tag.as_str().as_bytes()).await?;
        debug!(backend = %self.name, path = %path, bytes = content.len(), "committed object");
        Ok(())
    }

    async fn read(&self, path: &StoragePath) -> StorageResult<Vec<u8>> {
        let file = self
            .get_file(path.as_str())
            .await?
            .ok_or_else(|| StorageError::NotFound {
                path: path.to_string(),
            })?;
        let content = decode_content(&file.content).map_err(|e| self.unavailable(e))?;

        let tag = match self.get_file(&path.tag_key()).await? {
            Some(tag_file) => {
                let raw = decode_content(&tag_file.content).map_err(|e| self.unavailable(e))?;
                Some(String::from_utf8_lossy(&raw).into_owned())
            }
            None => None,
        };

        check_integrity(&self.name, path, &content, tag.as_deref())?;
        Ok(content)
    }

    async fn exists(&self, path: &StoragePath) -> StorageResult<bool> {
        Ok(self.get_file(path.as_str()).await?.is_some())
    }

    async fn delete(&self, path: &StoragePath) -> StorageResult<()> {
        self.delete_file(path.as_str()).await?;
        self.delete_file(&path.tag_key()).await
    }

    async fn list(&self, prefix: &str) -> StorageResult<Vec<StoragePath>> {
        let url = format!("{}/git/trees/{}", self.repo_url(), self.config.branch);
        let response = self
            .request(self.http_client.get(url))
            .query(&[("recursive", "1")])
            .send()
            .await
            .map_err(|e| self.unavailable(e))?;

        match response.status() {
            // Empty repository or missing branch: nothing stored yet.
            StatusCode::NOT_FOUND | StatusCode::CONFLICT => return Ok(Vec::new()),
            status if !status.is_success() => {
                return Err(self.unavailable(format!("GET tree returned {}", status)))
            }
            _ => {}
        }

        let tree: TreeResponse = response.json().await.map_err(|e| self.unavailable(e))?;
        let mut paths: Vec<StoragePath> = tree
            .tree
            .into_iter()
            .filter(|entry| entry.kind == "blob")
            .filter_map(|entry| self.logical_key(&entry.path))
            .filter(|key| key.starts_with(prefix))
            .filter_map(|key| StoragePath::new(key).ok())
            .collect();
        paths.sort();
        Ok(paths)
    }

    async fn health_check(&self) -> BackendHealth {
        let started = Instant::now();
        let outcome: StorageResult<()> = async {
            let response = self
                .request(self.http_client.get(self.repo_url()))
                .send()
                .await
                .map_err(|e| self.unavailable(e))?;
            if response.status().is_success() {
                Ok(())
            } else {
                Err(self.unavailable(format!("repository lookup returned {}", response.status())))
            }
        }
        .await;
        BackendHealth::from_probe(&self.name, started, outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend(base_path: &str) -> GithubBackend {
        let mut cfg = GithubConfig::new("stevedores-org", "governance");
        cfg.base_path = base_path.to_string();
        cfg.token = Some("t".to_string());
        GithubBackend::new(cfg).unwrap()
    }

    #[test]
    fn test_contents_url_includes_base_path() {
        let b = backend("/vault/");
        assert_eq!(
            b.contents_url("receipts/s1/r1.json"),
            "https://api.github.com/repos/stevedores-org/governance/contents/vault/receipts/s1/r1.json"
        );
    }

    #[test]
    fn test_tag_lives_under_base_path() {
        let b = backend("vault");
        let path = StoragePath::new("manifests/1.0.0.json").unwrap();
        assert_eq!(
            b.repo_path(&path.tag_key()),
            "vault/.integrity/manifests/1.0.0.json.sha256"
        );
    }

    #[test]
    fn test_logical_key_filters_foreign_and_tag_paths() {
        let b = backend("vault");
        assert_eq!(
            b.logical_key("vault/receipts/s1/r1.json").as_deref(),
            Some("receipts/s1/r1.json")
        );
        assert_eq!(b.logical_key("vault/.integrity/receipts/s1/r1.json.sha256"), None);
        assert_eq!(b.logical_key("vaulted/other.json"), None);
        assert_eq!(b.logical_key("README.md"), None);
    }

    #[test]
    fn test_logical_key_without_base_path() {
        let b = backend("");
        assert_eq!(b.logical_key("a/b.json").as_deref(), Some("a/b.json"));
        assert_eq!(b.logical_key(".integrity/a/b.json.sha256"), None);
    }

    #[test]
    fn test_decode_wrapped_content() {
        let original = format!(r#"{{"receipt_id":"r1","long":"{}"}}"#, "x".repeat(55));
        let encoded = STANDARD.encode(&original);
        let wrapped: String = encoded
            .as_bytes()
            .chunks(60)
            .map(|c| format!("{}\n", std::str::from_utf8(c).unwrap()))
            .collect();
        assert!(wrapped.lines().count() > 1);
        assert_eq!(decode_content(&wrapped).unwrap(), original.as_bytes());
    }

    #[tokio::test]
    async fn test_unreachable_api_is_unhealthy() {
        let mut cfg = GithubConfig::new("o", "r");
        cfg.api_url = "http://127.0.0.1:9".to_string();
        let health = GithubBackend::new(cfg).unwrap().health_check().await;
        assert!(!health.healthy);
        assert_eq!(health.backend, "github");
    }
}
