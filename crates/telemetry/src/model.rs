//! Telemetry data model.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;

/// Point-in-time view of [`crate::BotStats`] with derived metrics.
#[derive(Debug, Clone, Serialize)]
pub struct StatsSnapshot {
    pub started_at: DateTime<Utc>,
    pub uptime: Duration,
    pub total: u64,
    pub succeeded: u64,
    pub failed: u64,
    /// Percentage of successful requests; `None` before the first request.
    pub success_rate: Option<f64>,
    /// Mean latency of successful requests.
    pub average_latency: Option<Duration>,
}

impl StatsSnapshot {
    pub fn uptime_display(&self) -> String {
        format_uptime(self.uptime)
    }

    pub fn success_rate_display(&self) -> String {
        self.success_rate
            .map(|r| format!("{r:.1}%"))
            .unwrap_or_else(|| "N/A".into())
    }

    pub fn average_latency_display(&self) -> String {
        self.average_latency
            .map(|d| format!("{:.2}s", d.as_secs_f64()))
            .unwrap_or_else(|| "N/A".into())
    }
}

/// Format a duration as `Nd HH:MM:SS`.
pub fn format_uptime(uptime: Duration) -> String {
    let secs = uptime.as_secs();
    let days = secs / 86_400;
    let hours = (secs % 86_400) / 3600;
    let minutes = (secs % 3600) / 60;
    let seconds = secs % 60;
    format!("{days}d {hours:02}:{minutes:02}:{seconds:02}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(success_rate: Option<f64>, average_latency: Option<Duration>) -> StatsSnapshot {
        StatsSnapshot {
            started_at: Utc::now(),
            uptime: Duration::from_secs(90_061),
            total: 0,
            succeeded: 0,
            failed: 0,
            success_rate,
            average_latency,
        }
    }

    #[test]
    fn uptime_format() {
        assert_eq!(format_uptime(Duration::from_secs(0)), "0d 00:00:00");
        assert_eq!(format_uptime(Duration::from_secs(90_061)), "1d 01:01:01");
    }

    #[test]
    fn missing_rates_render_na() {
        let snap = snapshot(None, None);
        assert_eq!(snap.success_rate_display(), "N/A");
        assert_eq!(snap.average_latency_display(), "N/A");
        assert_eq!(snap.uptime_display(), "1d 01:01:01");
    }

    #[test]
    fn rates_render_rounded() {
        let snap = snapshot(Some(66.666), Some(Duration::from_millis(2500)));
        assert_eq!(snap.success_rate_display(), "66.7%");
        assert_eq!(snap.average_latency_display(), "2.50s");
        assert!(serde_json::to_string(&snap).unwrap().contains("\"total\":0"));
    }
}
