use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ComponentHealth;

/// Result of a healthcheck run.
///
/// Serialises as `{timestamp, duration_ms, healthy, components}` with the
/// timestamp in epoch milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthReport {
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
    pub duration_ms: u64,
    pub healthy: bool,
    pub components: Vec<ComponentHealth>,
}

impl HealthReport {
    /// Healthy iff every component is healthy. An empty report is healthy.
    pub fn new(
        timestamp: DateTime<Utc>,
        duration_ms: u64,
        components: Vec<ComponentHealth>,
    ) -> Self {
        let healthy = components.iter().all(|c| c.healthy);
        HealthReport {
            timestamp,
            duration_ms,
            healthy,
            components,
        }
    }

    pub fn failed_components(&self) -> impl Iterator<Item = &ComponentHealth> {
        self.components.iter().filter(|c| !c.healthy)
    }

    pub fn component(&self, name: &str) -> Option<&ComponentHealth> {
        self.components.iter().find(|c| c.name == name)
    }

    /// Human-readable form.
    pub fn render(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for HealthReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = if self.healthy { "HEALTHY" } else { "UNHEALTHY" };
        writeln!(f, "System Status: {}", status)?;
        writeln!(
            f,
            "Checked at: {} ({}ms)",
            self.timestamp.to_rfc3339(),
            self.duration_ms
        )?;
        writeln!(f, "Components:")?;
        for c in &self.components {
            let mark = if c.healthy { "ok  " } else { "FAIL" };
            write!(f, "  [{}] {}", mark, c.name)?;
            if let Some(latency) = c.latency_ms {
                write!(f, " ({}ms)", latency)?;
            }
            if let Some(message) = &c.message {
                write!(f, ": {}", message)?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
