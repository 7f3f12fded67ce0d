use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Instant;

use async_trait::async_trait;
use tempfile::NamedTempFile;
use tracing::debug;

use govault_canonical::digest_bytes;

use crate::backend::{check_integrity, BackendHealth, StorageBackend};
use crate::error::{StorageError, StorageResult};
use crate::path::{prefix_dir, StoragePath, INTEGRITY_DIR};

const PROBE_FILE: &str = ".health-probe";

/// Filesystem-backed store rooted at a directory.
///
/// Layout: payload at `<root>/<path>`, tag at `<root>/.integrity/<path>.sha256`.
pub struct LocalBackend {
    name: String,
    root: PathBuf,
}

impl LocalBackend {
    /// Backend rooted at `root`, without touching the filesystem.
    ///
    /// Directories are created by the first write; until then a missing root
    /// reports unhealthy.
    pub fn open(root: impl Into<PathBuf>) -> Self {
        Self {
            name: "local".to_string(),
            root: root.into(),
        }
    }

    /// Provision `root` (and its tag directory) and open a backend on it.
    pub fn new(root: impl AsRef<Path>) -> StorageResult<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(root.join(INTEGRITY_DIR))?;
        Ok(Self::open(root))
    }

    /// Override the name reported in logs and health entries.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn payload_path(&self, path: &StoragePath) -> PathBuf {
        self.root.join(path.as_str())
    }

    fn tag_path(&self, path: &StoragePath) -> PathBuf {
        self.root.join(path.tag_key())
    }

    /// Temp files are staged in the tag directory, which `list` never
    /// reports, so no logical key is shadowed by an in-flight write.
    fn staging_dir(&self) -> PathBuf {
        self.root.join(INTEGRITY_DIR)
    }

    fn join_error(&self, e: tokio::task::JoinError) -> StorageError {
        StorageError::BackendUnavailable {
            backend: self.name.clone(),
            reason: format!("blocking task failed: {}", e),
        }
    }
}

/// Write via a temp file in `staging` (same filesystem), then rename over the target.
fn atomic_write(staging: &Path, target: &Path, data: &[u8]) -> StorageResult<()> {
    let dir = target.parent().ok_or_else(|| StorageError::InvalidPath {
        path: target.display().to_string(),
        reason: "path has no parent directory".to_string(),
    })?;
    fs::create_dir_all(dir)?;
    fs::create_dir_all(staging)?;

    let mut tmp = NamedTempFile::new_in(staging)?;
    tmp.write_all(data)?;
    tmp.as_file().sync_all()?;
    tmp.persist(target).map_err(|e| e.error)?;
    Ok(())
}

fn remove_if_present(path: &Path) -> StorageResult<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// Collect logical keys below `dir`, relative to `root`.
fn walk(root: &Path, dir: &Path, out: &mut Vec<String>) -> StorageResult<()> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e.into()),
    };

    for entry in entries {
        let entry = entry?;
        let path = entry.path();
        let file_type = entry.file_type()?;

        // Tags and in-flight temp files live here; they are not logical objects.
        if dir == root && entry.file_name() == INTEGRITY_DIR {
            continue;
        }

        if file_type.is_dir() {
            walk(root, &path, out)?;
        } else if file_type.is_file() {
            if let Ok(rel) = path.strip_prefix(root) {
                let key = rel
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy().into_owned())
                    .collect::<Vec<_>>()
                    .join("/");
                out.push(key);
            }
        }
    }
    Ok(())
}

#[async_trait]
impl StorageBackend for LocalBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn write(&self, path: &StoragePath, content: &[u8]) -> StorageResult<()> {
        let payload = self.payload_path(path);
        let tag_path = self.tag_path(path);
        let staging = self.staging_dir();
        let tag = digest_bytes(content);
        let data = content.to_vec();

        tokio::task::spawn_blocking(move || -> StorageResult<()> {
            atomic_write(&staging, &payload, &data)?;
            atomic_write(&staging, &tag_path, tag.as_str().as_bytes())
        })
        .await
        .map_err(|e| self.join_error(e))??;

        debug!(backend = %self.name, path = %path, bytes = content.len(), "wrote object");
        Ok(())
    }

    async fn read(&self, path: &StoragePath) -> StorageResult<Vec<u8>> {
        let content = match tokio::fs::read(self.payload_path(path)).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StorageError::NotFound {
                    path: path.to_string(),
                })
            }
            Err(e) => return Err(e.into()),
        };

        let tag = match tokio::fs::read_to_string(self.tag_path(path)).await {
            Ok(tag) => Some(tag),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => return Err(e.into()),
        };

        check_integrity(&self.name, path, &content, tag.as_deref())?;
        Ok(content)
    }

    async fn exists(&self, path: &StoragePath) -> StorageResult<bool> {
        match tokio::fs::metadata(self.payload_path(path)).await {
            Ok(meta) => Ok(meta.is_file()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, path: &StoragePath) -> StorageResult<()> {
        let payload = self.payload_path(path);
        let tag_path = self.tag_path(path);
        tokio::task::spawn_blocking(move || -> StorageResult<()> {
            remove_if_present(&payload)?;
            remove_if_present(&tag_path)
        })
        .await
        .map_err(|e| self.join_error(e))?
    }

    async fn list(&self, prefix: &str) -> StorageResult<Vec<StoragePath>> {
        let Some(dir) = prefix_dir(prefix) else {
            return Ok(Vec::new());
        };
        let root = self.root.clone();
        let start = if dir.is_empty() {
            root.clone()
        } else {
            root.join(dir)
        };

        let keys = tokio::task::spawn_blocking(move || -> StorageResult<Vec<String>> {
            let mut keys = Vec::new();
            walk(&root, &start, &mut keys)?;
            Ok(keys)
        })
        .await
        .map_err(|e| self.join_error(e))??;

        let mut paths: Vec<StoragePath> = keys
            .into_iter()
            .filter(|k| k.starts_with(prefix))
            .filter_map(|k| StoragePath::new(k).ok())
            .collect();
        paths.sort();
        Ok(paths)
    }

    async fn health_check(&self) -> BackendHealth {
        let started = Instant::now();
        let probe = self.root.join(INTEGRITY_DIR).join(PROBE_FILE);

        let outcome: StorageResult<()> = async {
            let meta = match tokio::fs::metadata(&self.root).await {
                Ok(meta) => meta,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    return Err(StorageError::BackendUnavailable {
                        backend: self.name.clone(),
                        reason: format!("root {} does not exist", self.root.display()),
                    })
                }
                Err(e) => return Err(e.into()),
            };
            if !meta.is_dir() {
                return Err(StorageError::BackendUnavailable {
                    backend: self.name.clone(),
                    reason: format!("{} is not a directory", self.root.display()),
                });
            }
            // The root exists; only the tag directory below it may be created.
            tokio::fs::create_dir_all(self.staging_dir()).await?;
            tokio::fs::write(&probe, b"ok").await?;
            let echoed = tokio::fs::read(&probe).await?;
            tokio::fs::remove_file(&probe).await?;
            if echoed != b"ok" {
                return Err(StorageError::BackendUnavailable {
                    backend: self.name.clone(),
                    reason: "probe file round-trip returned different bytes".to_string(),
                });
            }
            Ok(())
        }
        .await;

        BackendHealth::from_probe(&self.name, started, outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_backend() -> (tempfile::TempDir, LocalBackend) {
        let dir = tempfile::tempdir().unwrap();
        let backend = LocalBackend::new(dir.path()).unwrap();
        (dir, backend)
    }

    fn p(raw: &str) -> StoragePath {
        StoragePath::new(raw).unwrap()
    }

    #[tokio::test]
    async fn write_creates_payload_and_tag() {
        let (dir, backend) = make_backend();
        backend.write(&p("receipts/s1/r1.json"), b"{}").await.unwrap();

        let payload = dir.path().join("receipts/s1/r1.json");
        let tag = dir.path().join(".integrity/receipts/s1/r1.json.sha256");
        assert_eq!(std::fs::read(payload).unwrap(), b"{}");
        assert_eq!(
            std::fs::read_to_string(tag).unwrap(),
            digest_bytes(b"{}").as_str()
        );
    }

    #[tokio::test]
    async fn tampering_payload_is_detected() {
        let (dir, backend) = make_backend();
        let path = p("manifests/1.0.0.json");
        backend.write(&path, b"original").await.unwrap();
        std::fs::write(dir.path().join("manifests/1.0.0.json"), b"tampered").unwrap();

        let err = backend.read(&path).await.unwrap_err();
        assert!(err.to_string().contains("hash mismatch"));
    }

    #[tokio::test]
    async fn missing_tag_fails_closed() {
        let (dir, backend) = make_backend();
        let path = p("a.json");
        backend.write(&path, b"x").await.unwrap();
        std::fs::remove_file(dir.path().join(".integrity/a.json.sha256")).unwrap();

        assert!(matches!(
            backend.read(&path).await,
            Err(StorageError::IntegrityMismatch { .. })
        ));
    }

    #[tokio::test]
    async fn list_skips_integrity_namespace() {
        let (_dir, backend) = make_backend();
        backend.write(&p("a/1.json"), b"1").await.unwrap();
        backend.write(&p("b/2.json"), b"2").await.unwrap();

        let all = backend.list("").await.unwrap();
        let keys: Vec<&str> = all.iter().map(StoragePath::as_str).collect();
        assert_eq!(keys, vec!["a/1.json", "b/2.json"]);
    }

    #[tokio::test]
    async fn list_with_traversal_prefix_is_empty() {
        let (_dir, backend) = make_backend();
        backend.write(&p("a/1.json"), b"1").await.unwrap();
        assert!(backend.list("../").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn delete_removes_payload_and_tag() {
        let (dir, backend) = make_backend();
        let path = p("x/y.json");
        backend.write(&path, b"y").await.unwrap();
        backend.delete(&path).await.unwrap();

        assert!(!backend.exists(&path).await.unwrap());
        assert!(!dir.path().join(".integrity/x/y.json.sha256").exists());
        // Second delete is a no-op.
        backend.delete(&path).await.unwrap();
    }

    #[tokio::test]
    async fn open_touches_nothing_and_missing_root_is_unhealthy() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("unmounted/volume");
        let backend = LocalBackend::open(&root);

        let health = backend.health_check().await;
        assert!(!health.healthy);
        assert!(health.message.unwrap().contains("does not exist"));
        assert!(!root.exists());
    }

    #[tokio::test]
    async fn first_write_creates_root_lazily() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("fresh");
        let backend = LocalBackend::open(&root);
        backend.write(&p("a/b.json"), b"{}").await.unwrap();

        assert_eq!(backend.read(&p("a/b.json")).await.unwrap(), b"{}");
        assert!(backend.health_check().await.healthy);
    }

    #[tokio::test]
    async fn dot_tmp_keys_are_listed() {
        let (dir, backend) = make_backend();
        backend.write(&p("a/.tmpnotes"), b"n").await.unwrap();
        backend.write(&p(".tmp/x.json"), b"x").await.unwrap();

        let keys: Vec<String> = backend
            .list("")
            .await
            .unwrap()
            .into_iter()
            .map(String::from)
            .collect();
        assert_eq!(keys, vec![".tmp/x.json", "a/.tmpnotes"]);
        // No staged temp files are left next to payloads.
        let siblings: Vec<_> = std::fs::read_dir(dir.path().join("a")).unwrap().collect();
        assert_eq!(siblings.len(), 1);
    }

    #[tokio::test]
    async fn health_check_reports_healthy_root() {
        let (_dir, backend) = make_backend();
        let health = backend.health_check().await;
        assert!(health.healthy, "{:?}", health.message);
        assert_eq!(health.backend, "local");
    }

    #[tokio::test]
    async fn health_check_reports_missing_root() {
        let (dir, backend) = make_backend();
        std::fs::remove_dir_all(dir.path()).unwrap();
        let health = backend.health_check().await;
        assert!(!health.healthy);
        assert!(health.message.is_some());
    }
}
