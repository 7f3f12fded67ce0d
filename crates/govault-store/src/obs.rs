//! Structured observability hooks for storage operations.
//!
//! Events carry a stable `event` field so log pipelines can filter on it.

use tracing::{debug, info, warn};

/// Emit event: primary write completed.
pub fn emit_write_completed(backend: &str, path: &str, bytes: usize, backup_failures: usize) {
    info!(
        event = "storage.write",
        backend = %backend,
        path = %path,
        bytes = bytes,
        backup_failures = backup_failures,
    );
}

/// Emit event: a best-effort backup write failed (warning level).
pub fn emit_backup_failed(backend: &str, path: &str, error: &dyn std::fmt::Display) {
    warn!(event = "storage.backup_failed", backend = %backend, path = %path, error = %error);
}

/// Emit event: content read back did not match its integrity tag (warning level).
pub fn emit_integrity_mismatch(backend: &str, path: &str, stored: &str, computed: &str) {
    warn!(
        event = "storage.integrity_mismatch",
        backend = %backend,
        path = %path,
        stored = %stored,
        computed = %computed,
    );
}

/// Emit event: a record was persisted through the record store.
pub fn emit_record_stored(kind: &str, path: &str, hash: &str) {
    info!(event = "storage.record_stored", kind = %kind, path = %path, hash = %hash);
}

/// Emit event: one backend health probe finished.
pub fn emit_backend_health(backend: &str, healthy: bool, latency_ms: u64) {
    debug!(
        event = "storage.backend_health",
        backend = %backend,
        healthy = healthy,
        latency_ms = latency_ms,
    );
}
