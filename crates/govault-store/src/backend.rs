//! Storage backend capability set.
//!
//! Every backend variant implements the same operations over the same
//! logical keys, and each one owns its integrity tags: the digest of the raw
//! content is stored at write time and re-checked on every read.
//!
//! Guarantees:
//! - `write` creates intermediate segments and overwrites (last writer wins).
//! - `read` never returns content whose digest disagrees with its tag.
//! - `list` with an unmatched prefix is an empty success.
//! - `health_check` never fails; problems are encoded in the result.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use govault_canonical::{digest_bytes, Digest};

use crate::error::{StorageError, StorageResult};
use crate::obs;
use crate::path::StoragePath;

/// Result of a single backend health probe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendHealth {
    /// Backend name.
    pub backend: String,
    pub healthy: bool,
    /// Elapsed probe time in milliseconds.
    pub latency_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl BackendHealth {
    pub fn healthy(backend: impl Into<String>, elapsed: Duration) -> Self {
        Self {
            backend: backend.into(),
            healthy: true,
            latency_ms: millis(elapsed),
            message: None,
        }
    }

    pub fn unhealthy(
        backend: impl Into<String>,
        elapsed: Duration,
        message: impl Into<String>,
    ) -> Self {
        Self {
            backend: backend.into(),
            healthy: false,
            latency_ms: millis(elapsed),
            message: Some(message.into()),
        }
    }

    /// Build from the outcome of a probe that started at `started`.
    pub fn from_probe(backend: &str, started: Instant, outcome: StorageResult<()>) -> Self {
        match outcome {
            Ok(()) => Self::healthy(backend, started.elapsed()),
            Err(e) => Self::unhealthy(backend, started.elapsed(), e.to_string()),
        }
    }
}

pub(crate) fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

/// Storage backend interface.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Name used in logs and health entries.
    fn name(&self) -> &str;

    /// Store `content` at `path` together with its integrity tag.
    async fn write(&self, path: &StoragePath, content: &[u8]) -> StorageResult<()>;

    /// Fetch content and verify it against the stored integrity tag.
    /// Returns `StorageError::NotFound` if absent and
    /// `StorageError::IntegrityMismatch` if the content was altered.
    async fn read(&self, path: &StoragePath) -> StorageResult<Vec<u8>>;

    /// Check whether content exists at `path`.
    async fn exists(&self, path: &StoragePath) -> StorageResult<bool>;

    /// Remove content and its tag. No-op if absent.
    async fn delete(&self, path: &StoragePath) -> StorageResult<()>;

    /// Logical keys starting with `prefix`, sorted.
    async fn list(&self, prefix: &str) -> StorageResult<Vec<StoragePath>>;

    /// Minimal round-trip probe.
    async fn health_check(&self) -> BackendHealth;
}

/// Compare freshly read content against its stored tag.
///
/// A missing or unparsable tag fails closed.
pub fn check_integrity(
    backend: &str,
    path: &StoragePath,
    content: &[u8],
    stored_tag: Option<&str>,
) -> StorageResult<()> {
    let computed = digest_bytes(content);
    let stored = stored_tag.map(str::trim);

    let matches = stored
        .and_then(|tag| tag.parse::<Digest>().ok())
        .is_some_and(|tag| tag == computed);
    if matches {
        return Ok(());
    }

    let stored = stored.unwrap_or("<missing>").to_string();
    obs::emit_integrity_mismatch(backend, path.as_str(), &stored, computed.as_str());
    Err(StorageError::IntegrityMismatch {
        path: path.to_string(),
        stored,
        computed: computed.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path() -> StoragePath {
        StoragePath::new("a/b.json").unwrap()
    }

    #[test]
    fn test_check_integrity_accepts_matching_tag() {
        let tag = digest_bytes(b"content");
        assert!(check_integrity("t", &path(), b"content", Some(tag.as_str())).is_ok());
    }

    #[test]
    fn test_check_integrity_tolerates_trailing_newline() {
        let tag = format!("{}\n", digest_bytes(b"content"));
        assert!(check_integrity("t", &path(), b"content", Some(&tag)).is_ok());
    }

    #[test]
    fn test_check_integrity_rejects_tampered_content() {
        let tag = digest_bytes(b"content");
        let err = check_integrity("t", &path(), b"c0ntent", Some(tag.as_str())).unwrap_err();
        assert!(err.to_string().contains("hash mismatch"));
    }

    #[test]
    fn test_check_integrity_fails_closed_without_tag() {
        let err = check_integrity("t", &path(), b"content", None).unwrap_err();
        match err {
            StorageError::IntegrityMismatch { stored, .. } => assert_eq!(stored, "<missing>"),
            other => panic!("expected IntegrityMismatch, got {other:?}"),
        }
    }

    #[test]
    fn test_backend_health_constructors() {
        let ok = BackendHealth::healthy("local", Duration::from_millis(3));
        assert!(ok.healthy);
        assert_eq!(ok.latency_ms, 3);
        assert!(ok.message.is_none());

        let bad = BackendHealth::unhealthy("local", Duration::from_millis(1), "down");
        assert!(!bad.healthy);
        assert_eq!(bad.message.as_deref(), Some("down"));
    }
}
