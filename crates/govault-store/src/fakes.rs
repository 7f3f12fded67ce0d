//! In-memory and fault-injecting backends (testing only)
//!
//! Provides `MemoryBackend`, `UnavailableBackend` and `HangingBackend` that
//! satisfy the `StorageBackend` contract without any external dependencies.

use std::collections::BTreeMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use govault_canonical::{digest_bytes, Digest};

use crate::backend::{check_integrity, BackendHealth, StorageBackend};
use crate::error::{StorageError, StorageResult};
use crate::path::StoragePath;

// ---------------------------------------------------------------------------
// MemoryBackend
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct StoredObject {
    content: Vec<u8>,
    tag: Digest,
}

/// In-memory backend backed by a `BTreeMap<key, (bytes, tag)>`.
#[derive(Debug)]
pub struct MemoryBackend {
    name: String,
    objects: Mutex<BTreeMap<String, StoredObject>>,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new("memory")
    }
}

impl MemoryBackend {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            objects: Mutex::new(BTreeMap::new()),
        }
    }

    /// Replace stored content while keeping the original tag.
    /// Returns `false` if nothing is stored at `path`.
    pub fn tamper(&self, path: &StoragePath, content: &[u8]) -> bool {
        let mut objects = self.objects.lock().unwrap();
        match objects.get_mut(path.as_str()) {
            Some(object) => {
                object.content = content.to_vec();
                true
            }
            None => false,
        }
    }

    /// Number of stored objects.
    pub fn len(&self) -> usize {
        self.objects.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl StorageBackend for MemoryBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn write(&self, path: &StoragePath, content: &[u8]) -> StorageResult<()> {
        let mut objects = self.objects.lock().unwrap();
        objects.insert(
            path.as_str().to_string(),
            StoredObject {
                content: content.to_vec(),
                tag: digest_bytes(content),
            },
        );
        Ok(())
    }

    async fn read(&self, path: &StoragePath) -> StorageResult<Vec<u8>> {
        let object = {
            let objects = self.objects.lock().unwrap();
            objects
                .get(path.as_str())
                .cloned()
                .ok_or_else(|| StorageError::NotFound {
                    path: path.to_string(),
                })?
        };
        check_integrity(&self.name, path, &object.content, Some(object.tag.as_str()))?;
        Ok(object.content)
    }

    async fn exists(&self, path: &StoragePath) -> StorageResult<bool> {
        let objects = self.objects.lock().unwrap();
        Ok(objects.contains_key(path.as_str()))
    }

    async fn delete(&self, path: &StoragePath) -> StorageResult<()> {
        let mut objects = self.objects.lock().unwrap();
        objects.remove(path.as_str());
        Ok(())
    }

    async fn list(&self, prefix: &str) -> StorageResult<Vec<StoragePath>> {
        let objects = self.objects.lock().unwrap();
        Ok(objects
            .keys()
            .filter(|k| k.starts_with(prefix))
            .filter_map(|k| StoragePath::new(k.clone()).ok())
            .collect())
    }

    async fn health_check(&self) -> BackendHealth {
        BackendHealth::healthy(&self.name, Duration::ZERO)
    }
}

// ---------------------------------------------------------------------------
// UnavailableBackend
// ---------------------------------------------------------------------------

/// Backend whose every operation fails as unreachable.
#[derive(Debug)]
pub struct UnavailableBackend {
    name: String,
}

impl UnavailableBackend {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    fn error(&self) -> StorageError {
        StorageError::BackendUnavailable {
            backend: self.name.clone(),
            reason: "connection refused".to_string(),
        }
    }
}

#[async_trait]
impl StorageBackend for UnavailableBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn write(&self, _path: &StoragePath, _content: &[u8]) -> StorageResult<()> {
        Err(self.error())
    }

    async fn read(&self, _path: &StoragePath) -> StorageResult<Vec<u8>> {
        Err(self.error())
    }

    async fn exists(&self, _path: &StoragePath) -> StorageResult<bool> {
        Err(self.error())
    }

    async fn delete(&self, _path: &StoragePath) -> StorageResult<()> {
        Err(self.error())
    }

    async fn list(&self, _prefix: &str) -> StorageResult<Vec<StoragePath>> {
        Err(self.error())
    }

    async fn health_check(&self) -> BackendHealth {
        BackendHealth::unhealthy(&self.name, Duration::ZERO, self.error().to_string())
    }
}

// ---------------------------------------------------------------------------
// HangingBackend
// ---------------------------------------------------------------------------

/// Backend whose operations never complete. Exercises timeouts.
#[derive(Debug)]
pub struct HangingBackend {
    name: String,
}

impl HangingBackend {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

#[async_trait]
impl StorageBackend for HangingBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn write(&self, _path: &StoragePath, _content: &[u8]) -> StorageResult<()> {
        std::future::pending().await
    }

    async fn read(&self, _path: &StoragePath) -> StorageResult<Vec<u8>> {
        std::future::pending().await
    }

    async fn exists(&self, _path: &StoragePath) -> StorageResult<bool> {
        std::future::pending().await
    }

    async fn delete(&self, _path: &StoragePath) -> StorageResult<()> {
        std::future::pending().await
    }

    async fn list(&self, _prefix: &str) -> StorageResult<Vec<StoragePath>> {
        std::future::pending().await
    }

    async fn health_check(&self) -> BackendHealth {
        std::future::pending().await
    }
}
