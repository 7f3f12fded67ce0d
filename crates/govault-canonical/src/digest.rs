//! Digest service: the single source of truth for record hashes.
//!
//! A digest is `"0x" + lowercase-hex(SHA-256(canonical bytes))`. Producers and
//! verifiers both route through [`digest`] / [`verify`]; nothing else in the
//! workspace hashes structured values on its own.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest as Sha2Digest, Sha256};

use crate::canonical::{canonicalize, to_canonical_value};
use crate::error::{CanonicalError, CanonicalResult};

/// Prefix carried by every digest string.
pub const DIGEST_PREFIX: &str = "0x";

const HEX_LEN: usize = 64;

/// SHA-256 content digest in `0x`-prefixed lowercase hex.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Digest(String);

impl Digest {
    /// Hash raw bytes.
    pub fn of_bytes(data: &[u8]) -> Self {
        let hash = Sha256::digest(data);
        Digest(format!("{}{}", DIGEST_PREFIX, hex::encode(hash)))
    }

    /// Full prefixed string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Hex portion without the `0x` prefix.
    pub fn hex(&self) -> &str {
        &self.0[DIGEST_PREFIX.len()..]
    }

    /// Short form (first 12 hex chars), for log lines.
    pub fn short(&self) -> &str {
        &self.hex()[..12]
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest({})", self.short())
    }
}

impl FromStr for Digest {
    type Err = CanonicalError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let hex_part = s
            .strip_prefix(DIGEST_PREFIX)
            .ok_or_else(|| CanonicalError::InvalidDigest(s.to_string()))?;
        if hex_part.len() != HEX_LEN || !hex_part.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(CanonicalError::InvalidDigest(s.to_string()));
        }
        Ok(Digest(format!(
            "{}{}",
            DIGEST_PREFIX,
            hex_part.to_ascii_lowercase()
        )))
    }
}

impl TryFrom<String> for Digest {
    type Error = CanonicalError;

    fn try_from(s: String) -> std::result::Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Digest> for String {
    fn from(d: Digest) -> Self {
        d.0
    }
}

/// Outcome of re-hashing a value against the digest it claims.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Verification {
    /// Whether the stored digest equals the recomputed one.
    pub matches: bool,
    /// Digest the value carried, if any.
    pub stored: Option<String>,
    /// Digest recomputed from the canonical form.
    pub computed: Digest,
    /// Canonical form that was hashed, for diagnostics.
    pub canonical_form: String,
}

/// Remove `exclude` keys from a top-level object. Non-objects are returned as-is.
fn without_fields(value: &Value, exclude: &[&str]) -> Value {
    match value {
        Value::Object(map) if !exclude.is_empty() => {
            let mut copy = map.clone();
            for field in exclude {
                copy.remove(*field);
            }
            Value::Object(copy)
        }
        other => other.clone(),
    }
}

/// Canonical form of `value` with top-level `exclude` fields dropped.
pub fn canonical_form(value: &Value, exclude: &[&str]) -> CanonicalResult<String> {
    canonicalize(&without_fields(value, exclude))
}

/// Digest of `value` with top-level `exclude` fields dropped before hashing.
pub fn digest(value: &Value, exclude: &[&str]) -> CanonicalResult<Digest> {
    let canonical = canonical_form(value, exclude)?;
    Ok(Digest::of_bytes(canonical.as_bytes()))
}

/// Digest of any serializable record.
pub fn digest_serializable<T: Serialize + ?Sized>(
    record: &T,
    exclude: &[&str],
) -> CanonicalResult<Digest> {
    digest(&to_canonical_value(record)?, exclude)
}

/// Digest of raw content bytes (no canonicalization). Used for integrity tags.
pub fn digest_bytes(data: &[u8]) -> Digest {
    Digest::of_bytes(data)
}

/// Recompute the digest of `value` without `digest_field` and compare to `stored`.
pub fn verify(
    value: &Value,
    stored: Option<&str>,
    digest_field: &str,
) -> CanonicalResult<Verification> {
    let canonical_form = canonical_form(value, &[digest_field])?;
    let computed = Digest::of_bytes(canonical_form.as_bytes());
    let matches = stored
        .and_then(|s| s.parse::<Digest>().ok())
        .is_some_and(|parsed| parsed == computed);

    Ok(Verification {
        matches,
        stored: stored.map(str::to_string),
        computed,
        canonical_form,
    })
}

/// Verify a value against the digest embedded in its own `digest_field`.
pub fn verify_embedded(value: &Value, digest_field: &str) -> CanonicalResult<Verification> {
    let stored = value.get(digest_field).and_then(Value::as_str);
    verify(value, stored, digest_field)
}
