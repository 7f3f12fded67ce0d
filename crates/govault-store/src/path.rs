//! Logical storage keys.
//!
//! A [`StoragePath`] is a relative, `/`-separated key that resolves to the
//! same logical object on every backend variant.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{StorageError, StorageResult};

/// Reserved top-level namespace holding integrity tags on tree-shaped backends.
pub const INTEGRITY_DIR: &str = ".integrity";

/// Suffix of integrity tag objects.
pub const TAG_SUFFIX: &str = ".sha256";

/// Validated logical key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct StoragePath(String);

impl StoragePath {
    /// Validate and wrap a logical key.
    pub fn new(raw: impl Into<String>) -> StorageResult<Self> {
        let raw = raw.into();
        let invalid = |reason: &str| StorageError::InvalidPath {
            path: raw.clone(),
            reason: reason.to_string(),
        };

        if raw.is_empty() {
            return Err(invalid("path is empty"));
        }
        if raw.starts_with('/') {
            return Err(invalid("path must be relative"));
        }
        if raw.contains('\\') || raw.contains('\0') {
            return Err(invalid("path contains a forbidden character"));
        }
        for segment in raw.split('/') {
            match segment {
                "" => return Err(invalid("path contains an empty segment")),
                "." | ".." => return Err(invalid("path contains a relative segment")),
                _ => {}
            }
        }
        if raw.split('/').next() == Some(INTEGRITY_DIR) {
            return Err(invalid("path is inside the reserved integrity namespace"));
        }

        Ok(StoragePath(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Key of the integrity tag that accompanies this path.
    pub fn tag_key(&self) -> String {
        format!("{}/{}{}", INTEGRITY_DIR, self.0, TAG_SUFFIX)
    }

    /// Whether this key starts with `prefix` (plain string prefix).
    pub fn has_prefix(&self, prefix: &str) -> bool {
        self.0.starts_with(prefix)
    }
}

impl fmt::Display for StoragePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for StoragePath {
    type Error = StorageError;

    fn try_from(s: String) -> std::result::Result<Self, Self::Error> {
        StoragePath::new(s)
    }
}

impl TryFrom<&str> for StoragePath {
    type Error = StorageError;

    fn try_from(s: &str) -> std::result::Result<Self, Self::Error> {
        StoragePath::new(s)
    }
}

impl From<StoragePath> for String {
    fn from(p: StoragePath) -> Self {
        p.0
    }
}

/// Directory part of a listing prefix (everything up to the last `/`), if it
/// is safe to use as a starting point for a tree walk.
pub(crate) fn prefix_dir(prefix: &str) -> Option<&str> {
    let dir = match prefix.rfind('/') {
        Some(idx) => &prefix[..idx],
        None => return Some(""),
    };
    if dir.is_empty() || dir.starts_with('/') || dir.contains('\\') {
        return None;
    }
    if dir.split('/').any(|s| s.is_empty() || s == "." || s == "..") {
        return None;
    }
    Some(dir)
}
