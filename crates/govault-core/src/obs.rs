//! Structured events for healthcheck runs.
//!
//! Every event carries a stable `event = "health.<action>"` field so log
//! pipelines can filter on it. Storage events live in `govault_store::obs`.

use tracing::{info, warn};

/// Span covering one healthcheck run. Use with `Instrument` across awaits.
pub fn healthcheck_span(mode: &str) -> tracing::Span {
    tracing::info_span!("govault.healthcheck", mode = %mode)
}

/// RAII guard that enters a `govault.healthcheck` span for synchronous code.
pub struct HealthcheckSpan {
    _span: tracing::span::EnteredSpan,
}

impl HealthcheckSpan {
    pub fn enter(mode: &str) -> Self {
        Self {
            _span: healthcheck_span(mode).entered(),
        }
    }
}

/// Emit event: one component finished probing.
pub fn emit_component(name: &str, healthy: bool, latency_ms: Option<u64>) {
    if healthy {
        info!(event = "health.component", component = %name, healthy, latency_ms);
    } else {
        warn!(event = "health.component", component = %name, healthy, latency_ms);
    }
}

/// Emit event: a probe exceeded its timeout.
pub fn emit_probe_timeout(probe: &str, timeout_ms: u64) {
    warn!(event = "health.probe_timeout", probe = %probe, timeout_ms);
}

/// Emit event: a probe task panicked or was cancelled.
pub fn emit_probe_aborted(probe: &str, error: &dyn std::fmt::Display) {
    warn!(event = "health.probe_aborted", probe = %probe, error = %error);
}

/// Emit event: the report is assembled.
pub fn emit_report(mode: &str, healthy: bool, duration_ms: u64, components: usize, failed: usize) {
    info!(
        event = "health.report",
        mode = %mode,
        healthy,
        duration_ms,
        components,
        failed,
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_test::traced_test;

    #[traced_test]
    #[test]
    fn test_component_event_carries_name() {
        emit_component("storage:local", true, Some(3));
        assert!(logs_contain("health.component"));
        assert!(logs_contain("storage:local"));
    }

    #[traced_test]
    #[test]
    fn test_probe_timeout_is_warning() {
        emit_probe_timeout("ledger", 5000);
        assert!(logs_contain("WARN"));
        assert!(logs_contain("health.probe_timeout"));
    }

    #[traced_test]
    #[test]
    fn test_span_guard_wraps_events() {
        let _span = HealthcheckSpan::enter("quick");
        emit_report("quick", true, 12, 2, 0);
        assert!(logs_contain("govault.healthcheck"));
        assert!(logs_contain("health.report"));
    }
}
