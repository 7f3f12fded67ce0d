//! Govault Store: integrity-checked persistence for governance records
//!
//! ## Key Components
//!
//! - `StorageBackend`: capability set {write, read, exists, delete, list, health}
//! - `LocalBackend`, `ObjectStoreBackend`, `GithubBackend`: backend variants,
//!   each owning its integrity tags
//! - `StorageManager`: primary + best-effort backups, concurrent health probes
//! - `RecordStore`: receipts / manifests / deployments mapped onto storage paths
//!
//! In-memory fakes for testing live in the `fakes` module.

pub mod backend;
pub mod config;
mod error;
pub mod fakes;
pub mod github;
pub mod local;
pub mod manager;
pub mod object_store;
pub mod obs;
pub mod path;
pub mod record_store;
pub mod records;

pub use backend::{check_integrity, BackendHealth, StorageBackend};
pub use config::{BackendId, GithubConfig, LocalBackendConfig, ObjectStoreConfig, StorageConfig};
pub use error::{RecordError, RecordResult, StorageError, StorageResult};
pub use github::GithubBackend;
pub use local::LocalBackend;
pub use manager::{
    build_backend, BackendRole, BackupFailure, ManagedHealth, StorageManager, WriteReport,
    DEFAULT_HEALTH_TIMEOUT, DEFAULT_REPLICATION_TIMEOUT,
};
pub use object_store::{ObjectStoreBackend, INTEGRITY_HEADER};
pub use path::{StoragePath, INTEGRITY_DIR};
pub use record_store::{deployment_path, manifest_path, receipt_path, RecordStore, StoredRecord};
pub use records::{
    now_millis, Approval, Decision, DeploymentRecord, GovernanceRef, ManifestArtifact, Receipt,
    ReleaseManifest, SealedRecord, MANIFEST_SCHEMA_VERSION, RECEIPT_SCHEMA_VERSION,
};
