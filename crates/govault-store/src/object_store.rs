//! REST object store backend.
//!
//! Speaks a minimal object protocol:
//! - `PUT/GET/HEAD/DELETE {endpoint}/{bucket}/{prefix}/{key}`
//! - `GET {endpoint}/{bucket}?prefix=<p>` -> `{"keys": ["..."]}`
//!
//! The integrity tag travels as object metadata in the `x-govault-sha256`
//! header, so tampering with the object body is detected on read.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{RequestBuilder, StatusCode};
use serde::Deserialize;
use tracing::debug;

use govault_canonical::digest_bytes;

use crate::backend::{check_integrity, BackendHealth, StorageBackend};
use crate::config::ObjectStoreConfig;
use crate::error::{StorageError, StorageResult};
use crate::path::StoragePath;

/// Metadata header carrying the integrity tag.
pub const INTEGRITY_HEADER: &str = "x-govault-sha256";

const TOKEN_ENV: &str = "GOVAULT_OBJECT_STORE_TOKEN";

#[derive(Debug, Deserialize)]
struct ListResponse {
    #[serde(default)]
    keys: Vec<String>,
}

/// Object-store-backed storage.
pub struct ObjectStoreBackend {
    name: String,
    config: ObjectStoreConfig,
    http_client: reqwest::Client,
}

impl ObjectStoreBackend {
    /// Create a backend from settings. The token falls back to
    /// `GOVAULT_OBJECT_STORE_TOKEN` when not configured.
    pub fn new(mut config: ObjectStoreConfig) -> StorageResult<Self> {
        if config.token.is_none() {
            config.token = std::env::var(TOKEN_ENV).ok();
        }
        let http_client = reqwest::Client::builder()
            .user_agent(concat!("govault-store/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()
            .map_err(|e| StorageError::BackendUnavailable {
                backend: "object-store".to_string(),
                reason: format!("failed to build HTTP client: {}", e),
            })?;

        Ok(ObjectStoreBackend {
            name: "object-store".to_string(),
            config,
            http_client,
        })
    }

    /// Override the name reported in logs and health entries.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    fn bucket_url(&self) -> String {
        format!(
            "{}/{}",
            self.config.endpoint.trim_end_matches('/'),
            self.config.bucket
        )
    }

    fn key_prefix(&self) -> String {
        let prefix = self.config.prefix.trim_matches('/');
        if prefix.is_empty() {
            String::new()
        } else {
            format!("{}/", prefix)
        }
    }

    /// Full object key inside the bucket.
    pub fn object_key(&self, path: &StoragePath) -> String {
        format!("{}{}", self.key_prefix(), path)
    }

    fn object_url(&self, path: &StoragePath) -> String {
        format!("{}/{}", self.bucket_url(), self.object_key(path))
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.config.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    fn unavailable(&self, reason: impl std::fmt::Display) -> StorageError {
        StorageError::BackendUnavailable {
            backend: self.name.clone(),
            reason: reason.to_string(),
        }
    }

    async fn list_keys(&self, prefix: &str, limit: Option<usize>) -> StorageResult<Vec<String>> {
        let full_prefix = format!("{}{}", self.key_prefix(), prefix);
        let mut query = vec![("prefix", full_prefix)];
        if let Some(limit) = limit {
            query.push(("max-keys", limit.to_string()));
        }

        let response = self
            .authorized(self.http_client.get(self.bucket_url()).query(&query))
            .send()
            .await
            .map_err(|e| self.unavailable(e))?;

        if !response.status().is_success() {
            return Err(self.unavailable(format!("list returned {}", response.status())));
        }

        let listing: ListResponse = response.json().await.map_err(|e| self.unavailable(e))?;
        let store_prefix = self.key_prefix();
        Ok(listing
            .keys
            .into_iter()
            .filter_map(|k| k.strip_prefix(&store_prefix).map(str::to_string))
            .collect())
    }
}

#[async_trait]
impl StorageBackend for ObjectStoreBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn write(&self, path: &StoragePath, content: &[u8]) -> StorageResult<()> {
        let tag = digest_bytes(content);
        let response = self
            .authorized(self.http_client.put(self.object_url(path)))
            .header(INTEGRITY_HEADER, tag.as_str())
            .body(content.to_vec())
            .send()
            .await
            .map_err(|e| self.unavailable(e))?;

        if !response.status().is_success() {
            return Err(self.unavailable(format!("PUT {} returned {}", path, response.status())));
        }
        debug!(backend = %self.name, path = %path, bytes = content.len(), "wrote object");
        Ok(())
    }

    async fn read(&self, path: &StoragePath) -> StorageResult<Vec<u8>> {
        let response = self
            .authorized(self.http_client.get(self.object_url(path)))
            .send()
            .await
            .map_err(|e| self.unavailable(e))?;

        match response.status() {
            StatusCode::NOT_FOUND => {
                return Err(StorageError::NotFound {
                    path: path.to_string(),
                })
            }
            status if !status.is_success() => {
                return Err(self.unavailable(format!("GET {} returned {}", path, status)))
            }
            _ => {}
        }

        let tag = response
            .headers()
            .get(INTEGRITY_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let content = response.bytes().await.map_err(|e| self.unavailable(e))?;

        check_integrity(&self.name, path, &content, tag.as_deref())?;
        Ok(content.to_vec())
    }

    async fn exists(&self, path: &StoragePath) -> StorageResult<bool> {
        let response = self
            .authorized(self.http_client.head(self.object_url(path)))
            .send()
            .await
            .map_err(|e| self.unavailable(e))?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(false),
            status if status.is_success() => Ok(true),
            status => Err(self.unavailable(format!("HEAD {} returned {}", path, status))),
        }
    }

    async fn delete(&self, path: &StoragePath) -> StorageResult<()> {
        let response = self
            .authorized(self.http_client.delete(self.object_url(path)))
            .send()
            .await
            .map_err(|e| self.unavailable(e))?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(()),
            status if status.is_success() => Ok(()),
            status => Err(self.unavailable(format!("DELETE {} returned {}", path, status))),
        }
    }

    async fn list(&self, prefix: &str) -> StorageResult<Vec<StoragePath>> {
        let mut paths: Vec<StoragePath> = self
            .list_keys(prefix, None)
            .await?
            .into_iter()
            .filter(|k| k.starts_with(prefix))
            .filter_map(|k| StoragePath::new(k).ok())
            .collect();
        paths.sort();
        Ok(paths)
    }

    async fn health_check(&self) -> BackendHealth {
        let started = Instant::now();
        let outcome = self.list_keys("", Some(1)).await.map(|_| ());
        BackendHealth::from_probe(&self.name, started, outcome)
    }
}
