//! Health status of the inference endpoint.
//!
//! One process-wide value written by two independent actors: the periodic
//! health monitor and the inference client on transport failures. Every
//! write sets a known value, so last-writer-wins is sufficient.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, RwLock};

/// Last known state of the inference endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "state", content = "code", rename_all = "snake_case")]
pub enum HealthStatus {
    /// No probe has completed yet
    #[default]
    Initializing,
    /// Endpoint answered the probe as expected
    Online,
    /// Endpoint unreachable or the probe timed out
    Offline,
    /// Endpoint reachable but answered with this HTTP status
    Error(u16),
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Initializing => write!(f, "Initializing..."),
            Self::Online => write!(f, "Online"),
            Self::Offline => write!(f, "Offline"),
            Self::Error(code) => write!(f, "Error ({code})"),
        }
    }
}

/// Result of one probe of the endpoint's root path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// HTTP 200 with the expected marker in the body
    Healthy,
    /// Any other HTTP answer
    Status(u16),
    /// Transport failure or probe timeout
    Unreachable,
}

impl From<ProbeOutcome> for HealthStatus {
    fn from(outcome: ProbeOutcome) -> Self {
        match outcome {
            ProbeOutcome::Healthy => Self::Online,
            ProbeOutcome::Status(code) => Self::Error(code),
            ProbeOutcome::Unreachable => Self::Offline,
        }
    }
}

/// Something that can check whether the inference endpoint is alive.
///
/// Probes never fail: every outcome, including a timeout, is a value.
#[async_trait]
pub trait HealthProbe: Send + Sync {
    async fn probe(&self) -> ProbeOutcome;
}

/// Shared, cloneable handle to the process-wide [`HealthStatus`].
#[derive(Debug, Clone, Default)]
pub struct HealthHandle {
    inner: Arc<RwLock<HealthStatus>>,
}

impl HealthHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current status.
    pub fn get(&self) -> HealthStatus {
        *self.inner.read().unwrap_or_else(|e| e.into_inner())
    }

    /// Overwrite the status.
    pub fn set(&self, status: HealthStatus) {
        let mut guard = self.inner.write().unwrap_or_else(|e| e.into_inner());
        if *guard != status {
            tracing::info!(from = %*guard, to = %status, "Inference endpoint status changed");
        }
        *guard = status;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_initializing() {
        let health = HealthHandle::new();
        assert_eq!(health.get(), HealthStatus::Initializing);
    }

    #[test]
    fn clones_share_state() {
        let health = HealthHandle::new();
        let other = health.clone();
        other.set(HealthStatus::Offline);
        assert_eq!(health.get(), HealthStatus::Offline);
    }

    #[test]
    fn probe_outcomes_map_to_status() {
        assert_eq!(HealthStatus::from(ProbeOutcome::Healthy), HealthStatus::Online);
        assert_eq!(HealthStatus::from(ProbeOutcome::Status(502)), HealthStatus::Error(502));
        assert_eq!(HealthStatus::from(ProbeOutcome::Unreachable), HealthStatus::Offline);
    }

    #[test]
    fn display_is_user_readable() {
        assert_eq!(HealthStatus::Error(404).to_string(), "Error (404)");
        assert_eq!(HealthStatus::Online.to_string(), "Online");
    }
}
