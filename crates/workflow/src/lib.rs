//! Background health monitoring for the inference endpoint.
//!
//! The [`HealthMonitor`] is a cancellable periodic task. It waits for the
//! chat platform to report readiness, then probes the endpoint on a fixed
//! interval and writes the outcome into the shared [`HealthHandle`].
//! Probes run inline on the loop, so a slow probe delays the next tick
//! instead of overlapping it; missed ticks are skipped.

use aidog_core::health::{HealthHandle, HealthProbe, HealthStatus};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

/// Periodic prober of the inference endpoint.
#[derive(Clone)]
pub struct HealthMonitor {
    probe: Arc<dyn HealthProbe>,
    health: HealthHandle,
    interval: Duration,
}

impl HealthMonitor {
    pub fn new(probe: Arc<dyn HealthProbe>, health: HealthHandle, interval: Duration) -> Self {
        Self {
            probe,
            health,
            interval,
        }
    }

    /// Run one probe and publish its outcome.
    pub async fn check_once(&self) -> HealthStatus {
        let status = HealthStatus::from(self.probe.probe().await);
        debug!(%status, "Health probe finished");
        self.health.set(status);
        status
    }

    /// Start the background loop. Probing begins once `ready` turns `true`.
    pub fn start(self, mut ready: watch::Receiver<bool>) -> MonitorHandle {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

        let task = tokio::spawn(async move {
            tokio::select! {
                became_ready = async { ready.wait_for(|r| *r).await.is_ok() } => {
                    if !became_ready {
                        debug!("Readiness source dropped before ready, health monitor not started");
                        return;
                    }
                }
                _ = shutdown_rx.changed() => return,
            }

            info!(interval_secs = self.interval.as_secs(), "Health monitor started");
            let mut interval = tokio::time::interval(self.interval);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = interval.tick() => {}
                    _ = shutdown_rx.changed() => break,
                }
                tokio::select! {
                    _ = self.check_once() => {}
                    _ = shutdown_rx.changed() => break,
                }
            }
            info!("Health monitor stopped");
        });

        MonitorHandle { shutdown_tx, task }
    }
}

/// Handle to a running [`HealthMonitor`] loop.
pub struct MonitorHandle {
    shutdown_tx: watch::Sender<bool>,
    task: tokio::task::JoinHandle<()>,
}

impl MonitorHandle {
    /// Stop the loop and wait for it to exit.
    pub async fn stop(self) {
        let _ = self.shutdown_tx.send(true);
        let _ = self.task.await;
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}
