//! Error taxonomy for canonicalization and digest computation.

use thiserror::Error;

/// Errors produced while canonicalizing or hashing a value.
#[derive(Debug, Error)]
pub enum CanonicalError {
    /// The input contains something outside the canonical value domain
    /// (non-string map keys, opaque handles, unserializable types).
    #[error("unsupported value: {0}")]
    UnsupportedValue(String),

    /// NaN or infinity reached the canonicalizer.
    #[error("non-finite number at {path}")]
    NonFiniteNumber { path: String },

    /// Nesting exceeded the recursion guard.
    #[error("value nesting exceeds maximum depth of {limit} at {path}")]
    TooDeep { limit: usize, path: String },

    /// A digest string could not be parsed.
    #[error("invalid digest: {0}")]
    InvalidDigest(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for canonicalization operations.
pub type CanonicalResult<T> = std::result::Result<T, CanonicalError>;
