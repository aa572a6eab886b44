//! Thread-safe request counters.

use crate::model::StatsSnapshot;
use chrono::{DateTime, Utc};
use std::sync::RwLock;
use std::time::{Duration, Instant};

/// Process-wide request statistics.
///
/// Counters only ever grow; they are written by the request pipeline and
/// read by reporting commands.
pub struct BotStats {
    started: Instant,
    started_at: DateTime<Utc>,
    totals: RwLock<Totals>,
}

#[derive(Debug, Default, Clone, Copy)]
struct Totals {
    total: u64,
    succeeded: u64,
    failed: u64,
    /// Sum of latencies of successful requests.
    success_latency: Duration,
}

impl BotStats {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            started_at: Utc::now(),
            totals: RwLock::new(Totals::default()),
        }
    }

    /// Record one completed inference attempt.
    pub fn record(&self, success: bool, elapsed: Duration) {
        let mut totals = self.totals.write().unwrap_or_else(|e| e.into_inner());
        totals.total += 1;
        if success {
            totals.succeeded += 1;
            totals.success_latency += elapsed;
        } else {
            totals.failed += 1;
        }
        tracing::debug!(
            success,
            elapsed_ms = elapsed.as_millis() as u64,
            total = totals.total,
            "Recorded request"
        );
    }

    /// Derived view of the counters as of now.
    pub fn snapshot(&self) -> StatsSnapshot {
        self.snapshot_at(Instant::now())
    }

    /// Derived view of the counters with uptime measured up to `now`.
    pub fn snapshot_at(&self, now: Instant) -> StatsSnapshot {
        let totals = *self.totals.read().unwrap_or_else(|e| e.into_inner());

        let success_rate = (totals.total > 0)
            .then(|| totals.succeeded as f64 / totals.total as f64 * 100.0);
        let average_latency = (totals.succeeded > 0)
            .then(|| average(totals.success_latency, totals.succeeded));

        StatsSnapshot {
            started_at: self.started_at,
            uptime: now.saturating_duration_since(self.started),
            total: totals.total,
            succeeded: totals.succeeded,
            failed: totals.failed,
            success_rate,
            average_latency,
        }
    }
}

fn average(sum: Duration, count: u64) -> Duration {
    match u32::try_from(count) {
        Ok(count) => sum / count,
        Err(_) => Duration::from_secs_f64(sum.as_secs_f64() / count as f64),
    }
}

impl Default for BotStats {
    fn default() -> Self {
        Self::new()
    }
}
