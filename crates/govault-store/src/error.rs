//! Error types for govault-store

use thiserror::Error;

use govault_canonical::CanonicalError;

/// Errors surfaced by storage backends and the storage manager.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Nothing is stored at the resolved path.
    #[error("not found: {path}")]
    NotFound { path: String },

    /// Content read back does not match the integrity tag written with it.
    #[error("hash mismatch for {path}: stored {stored}, computed {computed}")]
    IntegrityMismatch {
        path: String,
        stored: String,
        computed: String,
    },

    /// The backend could not be reached or refused the request.
    #[error("backend {backend} unavailable: {reason}")]
    BackendUnavailable { backend: String, reason: String },

    /// Logical key rejected before touching any backend.
    #[error("invalid storage path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },

    /// Backend identifier not recognised.
    #[error("unknown backend identifier: {0}")]
    UnknownBackend(String),

    /// Backend selected as primary/backup but its settings section is absent.
    #[error("backend '{0}' is selected but has no configuration section")]
    MissingBackendConfig(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// Errors surfaced by the record store.
#[derive(Error, Debug)]
pub enum RecordError {
    /// No record exists under the resolved key.
    #[error("record not found: {path}")]
    NotFound { path: String },

    /// Records are written once; a second write to the same key is refused.
    #[error("record already exists: {path}")]
    AlreadyExists { path: String },

    /// A key component cannot be used as a single path segment.
    #[error("invalid {field} '{value}': {reason}")]
    InvalidKey {
        field: &'static str,
        value: String,
        reason: String,
    },

    /// A pre-sealed record carries a hash that does not match its content.
    #[error("record hash does not match content: stored {stored}, computed {computed}")]
    InvalidHash { stored: String, computed: String },

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("canonicalization error: {0}")]
    Canonical(#[from] CanonicalError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for record store operations
pub type RecordResult<T> = std::result::Result<T, RecordError>;
