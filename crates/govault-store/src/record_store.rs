//! Record store: logical record keys mapped onto storage paths.
//!
//! Paths:
//! - receipts: `receipts/<session_id>/<receipt_id>.json`
//! - manifests: `manifests/<version>.json`
//! - deployments: `deployments/<version>.json`
//!
//! Integrity is the backend's job: loads trust the storage manager's tag
//! check and do not re-verify record hashes.

use std::sync::Arc;

use crate::error::{RecordError, RecordResult, StorageError};
use crate::manager::{StorageManager, WriteReport};
use crate::obs;
use crate::path::StoragePath;
use crate::records::{DeploymentRecord, Receipt, ReleaseManifest, SealedRecord};

const JSON_EXT: &str = ".json";

/// A record as persisted, with the storage outcome.
#[derive(Debug, Clone)]
pub struct StoredRecord<R> {
    pub record: R,
    pub report: WriteReport,
}

/// Reject key components that would not map to exactly one path segment.
fn key_segment(field: &'static str, value: &str) -> RecordResult<()> {
    let invalid = |reason: &str| RecordError::InvalidKey {
        field,
        value: value.to_string(),
        reason: reason.to_string(),
    };
    if value.is_empty() {
        return Err(invalid("must not be empty"));
    }
    if value == "." || value == ".." {
        return Err(invalid("must not be a relative segment"));
    }
    if value.contains(|c: char| matches!(c, '/' | '\\' | '\0')) {
        return Err(invalid("must not contain path separators"));
    }
    Ok(())
}

fn record_path(raw: String) -> RecordResult<StoragePath> {
    Ok(StoragePath::new(raw)?)
}

/// Path of a receipt.
pub fn receipt_path(session_id: &str, receipt_id: &str) -> RecordResult<StoragePath> {
    key_segment("session id", session_id)?;
    key_segment("receipt id", receipt_id)?;
    record_path(format!("receipts/{}/{}{}", session_id, receipt_id, JSON_EXT))
}

/// Path of a release manifest.
pub fn manifest_path(version: &str) -> RecordResult<StoragePath> {
    key_segment("version", version)?;
    record_path(format!("manifests/{}{}", version, JSON_EXT))
}

/// Path of a deployment record.
pub fn deployment_path(version: &str) -> RecordResult<StoragePath> {
    key_segment("version", version)?;
    record_path(format!("deployments/{}{}", version, JSON_EXT))
}

/// Domain-level access to receipts, manifests and deployment records.
pub struct RecordStore {
    storage: Arc<StorageManager>,
}

impl RecordStore {
    pub fn new(storage: Arc<StorageManager>) -> Self {
        Self { storage }
    }

    pub fn storage(&self) -> &Arc<StorageManager> {
        &self.storage
    }

    pub async fn store_receipt(&self, receipt: Receipt) -> RecordResult<StoredRecord<Receipt>> {
        let path = receipt_path(&receipt.session_id, &receipt.receipt_id)?;
        self.store(path, receipt).await
    }

    pub async fn load_stored_receipt(
        &self,
        session_id: &str,
        receipt_id: &str,
    ) -> RecordResult<Receipt> {
        self.load(receipt_path(session_id, receipt_id)?).await
    }

    /// Receipt ids stored for a session, sorted.
    pub async fn list_receipts(&self, session_id: &str) -> RecordResult<Vec<String>> {
        key_segment("session id", session_id)?;
        let prefix = format!("receipts/{}/", session_id);
        self.list_ids(&prefix).await
    }

    pub async fn store_manifest(
        &self,
        manifest: ReleaseManifest,
    ) -> RecordResult<StoredRecord<ReleaseManifest>> {
        let path = manifest_path(&manifest.version)?;
        self.store(path, manifest).await
    }

    pub async fn load_manifest(&self, version: &str) -> RecordResult<ReleaseManifest> {
        self.load(manifest_path(version)?).await
    }

    /// Stored manifest versions, sorted lexicographically.
    pub async fn list_manifest_versions(&self) -> RecordResult<Vec<String>> {
        self.list_ids("manifests/").await
    }

    pub async fn store_deployment(
        &self,
        deployment: DeploymentRecord,
    ) -> RecordResult<StoredRecord<DeploymentRecord>> {
        let path = deployment_path(&deployment.version)?;
        self.store(path, deployment).await
    }

    pub async fn load_deployment(&self, version: &str) -> RecordResult<DeploymentRecord> {
        self.load(deployment_path(version)?).await
    }

    /// Seal (or check the seal of) `record` and write it once at `path`.
    ///
    /// Timestamps are truncated to milliseconds first, so the returned
    /// record equals what a later load yields.
    async fn store<R: SealedRecord>(
        &self,
        path: StoragePath,
        mut record: R,
    ) -> RecordResult<StoredRecord<R>> {
        record.truncate_timestamps();
        let hash = match record.hash().cloned() {
            Some(stored) => {
                let computed = record.compute_hash()?;
                if computed != stored {
                    return Err(RecordError::InvalidHash {
                        stored: stored.to_string(),
                        computed: computed.to_string(),
                    });
                }
                stored
            }
            None => record.seal()?,
        };

        if self.storage.exists(&path).await? {
            return Err(RecordError::AlreadyExists {
                path: path.to_string(),
            });
        }

        let body = serde_json::to_vec_pretty(&record)?;
        let report = self.storage.write(&path, &body).await?;
        obs::emit_record_stored(R::KIND, path.as_str(), hash.as_str());
        Ok(StoredRecord { record, report })
    }

    async fn load<R: SealedRecord>(&self, path: StoragePath) -> RecordResult<R> {
        let content = self.storage.read(&path).await.map_err(|e| match e {
            StorageError::NotFound { path } => RecordError::NotFound { path },
            other => RecordError::Storage(other),
        })?;
        Ok(serde_json::from_slice(&content)?)
    }

    async fn list_ids(&self, prefix: &str) -> RecordResult<Vec<String>> {
        let paths = self.storage.list(prefix).await?;
        Ok(paths
            .iter()
            .filter_map(|p| p.as_str().strip_prefix(prefix))
            .filter(|rest| !rest.contains('/'))
            .filter_map(|rest| rest.strip_suffix(JSON_EXT))
            .map(str::to_string)
            .collect())
    }
}
