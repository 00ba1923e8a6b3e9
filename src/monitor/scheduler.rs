//! Scheduled health checking.
//!
//! Runs the health monitor on its own interval, independent of any session,
//! logging status transitions and publishing an alert on the operational
//! health feed when a worker restart becomes warranted.

use std::sync::Arc;

use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use super::{HealthMonitor, HealthStatus};
use crate::events::{EventKind, StatusBroadcaster};

/// Session id used for operational alerts on the health feed. The health
/// feed has no per-client sessions; subscribers watch this fixed key.
pub const HEALTH_ALERT_SESSION: &str = "monitor";

/// Periodic runner for the health monitor.
pub struct MonitorScheduler {
    monitor: HealthMonitor,
    broadcaster: Arc<StatusBroadcaster>,
    shutdown: Arc<Notify>,
}

impl MonitorScheduler {
    pub fn new(monitor: HealthMonitor, broadcaster: Arc<StatusBroadcaster>) -> Self {
        Self {
            monitor,
            broadcaster,
            shutdown: Arc::new(Notify::new()),
        }
    }

    /// Spawn the check loop. The returned handle resolves after
    /// [`MonitorScheduler::shutdown`] is requested.
    pub fn start(&self) -> JoinHandle<()> {
        let monitor = self.monitor.clone();
        let broadcaster = Arc::clone(&self.broadcaster);
        let shutdown = Arc::clone(&self.shutdown);
        let interval = monitor.config().check_interval();

        info!(
            interval_seconds = interval.as_secs(),
            "Starting health monitor schedule"
        );

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The first tick fires immediately; that gives an initial
            // baseline check right at startup.
            let mut last_status: Option<HealthStatus> = None;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        last_status = Some(run_check(&monitor, &broadcaster, last_status).await);
                    }
                    _ = shutdown.notified() => {
                        info!("Health monitor schedule stopping");
                        break;
                    }
                }
            }
        })
    }

    /// Request the check loop to stop after its current iteration.
    pub fn shutdown(&self) {
        // notify_one stores a permit, so a shutdown requested while a check
        // is in flight still lands on the next select poll
        self.shutdown.notify_one();
    }
}

async fn run_check(
    monitor: &HealthMonitor,
    broadcaster: &StatusBroadcaster,
    last_status: Option<HealthStatus>,
) -> HealthStatus {
    let snapshot = monitor.check_health().await;

    if last_status != Some(snapshot.status) {
        info!(
            from = last_status.map(|s| s.as_str()).unwrap_or("none"),
            to = snapshot.status.as_str(),
            "Health status transition"
        );
    }

    if monitor.needs_restart().await {
        warn!("Worker restart recommended, publishing health alert");
        let payload = serde_json::json!({
            "alert": "worker_restart_recommended",
            "snapshot": snapshot,
        });
        broadcaster.publish(HEALTH_ALERT_SESSION, EventKind::Error, payload);
    }

    snapshot.status
}
