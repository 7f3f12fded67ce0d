//! Govault Canonical
//!
//! Deterministic canonical JSON and the digest service built on it.
//!
//! ## Key Components
//!
//! - [`canonicalize`]: value -> unique byte-stable string
//! - [`digest`] / [`verify`]: field-excluding SHA-256 hashing and re-verification
//! - [`Digest`]: `0x`-prefixed lowercase hex digest newtype

pub mod canonical;
pub mod digest;
mod error;

pub use canonical::{
    canonical_bytes, canonicalize, canonicalize_serializable, finite_number, to_canonical_value,
    MAX_DEPTH,
};
pub use digest::{
    canonical_form, digest, digest_bytes, digest_serializable, verify, verify_embedded, Digest,
    Verification, DIGEST_PREFIX,
};
pub use error::{CanonicalError, CanonicalResult};
