//! # Health Monitor
//!
//! Unattended health checking and recovery for the background job queue.
//!
//! ## Overview
//!
//! The monitor reads queue and worker state through the [`JobStore`]
//! capability interface, classifies overall health, and carries the two
//! administrative escape hatches the dashboard exposes: force-finishing
//! stuck jobs and signalling a worker-pool restart.
//!
//! ## Failure policy
//!
//! Every public operation here runs from unattended pollers and
//! request/response boundaries, so nothing raises to the caller:
//!
//! - [`HealthMonitor::check_health`] is fail-open - a facet that cannot be
//!   read degrades to zeroed counts plus an error message, and the caller
//!   always gets a renderable snapshot.
//! - [`HealthMonitor::needs_restart`] is fail-closed - a query error reads
//!   as "no restart needed", so transient store failures never cause
//!   flapping restarts.
//! - [`HealthMonitor::process_stuck_jobs`] and
//!   [`HealthMonitor::restart_workers`] log and return conservative
//!   zero/false results on failure.

pub mod scheduler;
pub mod snapshot;

use std::sync::Arc;

use chrono::{Duration as ChronoDuration, Utc};
use tracing::{debug, error, info, warn};

use crate::config::MonitorConfig;
use crate::store::JobStore;

pub use scheduler::MonitorScheduler;
pub use snapshot::{HealthSnapshot, HealthStatus, QueueCounts, WorkerCounts};

/// Health monitor over the job queue collaborator.
#[derive(Clone)]
pub struct HealthMonitor {
    store: Arc<dyn JobStore>,
    config: MonitorConfig,
}

impl HealthMonitor {
    pub fn new(store: Arc<dyn JobStore>, config: MonitorConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    /// Take a fresh health snapshot. Never fails.
    ///
    /// Worker and queue facets are queried independently; whichever facet
    /// cannot be read keeps zeroed counts and contributes to the error
    /// message, and the snapshot is marked `error`. When everything
    /// resolves, the snapshot is `degraded` if stuck jobs exist or work is
    /// pending with no active worker, `healthy` otherwise (an idle system
    /// with no workers and no jobs is healthy).
    pub async fn check_health(&self) -> HealthSnapshot {
        let mut failures: Vec<String> = Vec::new();

        let workers = match self.worker_counts().await {
            Ok(counts) => counts,
            Err(e) => {
                warn!(error = %e, "Health check could not read worker state");
                failures.push(format!("workers: {e}"));
                WorkerCounts::default()
            }
        };

        let queues = match self.queue_counts().await {
            Ok(counts) => counts,
            Err(e) => {
                warn!(error = %e, "Health check could not read queue state");
                failures.push(format!("queues: {e}"));
                QueueCounts::default()
            }
        };

        if !failures.is_empty() {
            return HealthSnapshot::with_error(workers, queues, failures.join("; "));
        }

        let stuck = match self.stuck_job_count().await {
            Ok(count) => count,
            Err(e) => {
                warn!(error = %e, "Health check could not count stuck jobs");
                return HealthSnapshot::with_error(workers, queues, format!("stuck jobs: {e}"));
            }
        };

        let status = if stuck > 0 || (queues.pending > 0 && workers.active == 0) {
            HealthStatus::Degraded
        } else {
            HealthStatus::Healthy
        };

        debug!(
            status = status.as_str(),
            pending = queues.pending,
            active_workers = workers.active,
            stuck,
            "Health check complete"
        );

        HealthSnapshot::new(status, workers, queues)
    }

    /// Whether the worker pool warrants a restart.
    ///
    /// True iff the stuck-job count exceeds the configured limit, or no
    /// worker has a fresh heartbeat. Any query error reads as `false`.
    pub async fn needs_restart(&self) -> bool {
        let stuck = match self.stuck_job_count().await {
            Ok(count) => count,
            Err(e) => {
                warn!(error = %e, "needs_restart: stuck-job query failed, assuming no restart");
                return false;
            }
        };

        if stuck > self.config.stuck_job_limit {
            info!(
                stuck,
                limit = self.config.stuck_job_limit,
                "Restart recommended: stuck jobs over limit"
            );
            return true;
        }

        match self.worker_counts().await {
            Ok(counts) if counts.active == 0 => {
                info!(
                    total_workers = counts.total,
                    "Restart recommended: no worker heartbeat within freshness window"
                );
                true
            }
            Ok(_) => false,
            Err(e) => {
                warn!(error = %e, "needs_restart: worker query failed, assuming no restart");
                false
            }
        }
    }

    /// Force-finish up to `limit` stuck jobs, returning how many were
    /// actually finished.
    ///
    /// Selection happens once, at call time: only jobs unfinished and older
    /// than the staleness threshold are touched. Each write is independent;
    /// a job that fails mid-batch is logged and skipped, and the returned
    /// count reflects only the successful writes. Returns 0 on any
    /// selection error.
    pub async fn process_stuck_jobs(&self, limit: u64) -> u64 {
        let cutoff = Utc::now() - ChronoDuration::seconds(self.config.stale_job_threshold_seconds as i64);

        let stuck = match self.store.stale_jobs(cutoff, limit).await {
            Ok(jobs) => jobs,
            Err(e) => {
                error!(error = %e, "process_stuck_jobs: could not list stuck jobs");
                return 0;
            }
        };

        let mut processed = 0u64;
        for job in stuck {
            let finished_at = Utc::now();
            match self.store.force_finish(job.id, finished_at).await {
                Ok(()) => {
                    info!(
                        job_id = job.id,
                        created_at = %job.created_at,
                        "Force-finished stuck job (marked timed out)"
                    );
                    processed += 1;
                }
                Err(e) => {
                    error!(job_id = job.id, error = %e, "Failed to force-finish stuck job");
                }
            }
        }

        processed
    }

    /// Signal a worker-pool restart through the store's mechanism.
    /// Returns `false` and logs on failure.
    pub async fn restart_workers(&self) -> bool {
        match self.store.request_worker_restart().await {
            Ok(()) => {
                info!("Worker-pool restart requested");
                true
            }
            Err(e) => {
                error!(error = %e, "Worker-pool restart request failed");
                false
            }
        }
    }

    async fn worker_counts(&self) -> crate::error::Result<WorkerCounts> {
        let cutoff =
            Utc::now() - ChronoDuration::seconds(self.config.heartbeat_freshness_seconds as i64);
        let workers = self.store.workers().await?;
        let active = workers.iter().filter(|w| w.is_active(cutoff)).count() as u64;
        Ok(WorkerCounts {
            total: workers.len() as u64,
            active,
        })
    }

    async fn queue_counts(&self) -> crate::error::Result<QueueCounts> {
        let pending = self.store.pending_count().await?;
        let completed = self.store.completed_count().await?;
        let failed = self.store.failed_count().await?;
        Ok(QueueCounts {
            pending: pending.max(0) as u64,
            completed: completed.max(0) as u64,
            failed: failed.max(0) as u64,
        })
    }

    async fn stuck_job_count(&self) -> crate::error::Result<u64> {
        let cutoff = Utc::now() - ChronoDuration::seconds(self.config.stale_job_threshold_seconds as i64);
        // One past the limit is enough to decide "over the limit"
        let jobs = self
            .store
            .stale_jobs(cutoff, self.config.stuck_job_limit + 1)
            .await?;
        Ok(jobs.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{InMemoryJobStore, NullJobStore};
    use chrono::Duration;

    fn monitor(store: Arc<dyn JobStore>) -> HealthMonitor {
        HealthMonitor::new(store, MonitorConfig::default())
    }

    #[tokio::test]
    async fn test_idle_system_is_healthy() {
        let store = InMemoryJobStore::new();
        let snapshot = monitor(store).check_health().await;
        assert_eq!(snapshot.status, HealthStatus::Healthy);
        assert_eq!(snapshot.workers.total, 0);
        assert_eq!(snapshot.queues.pending, 0);
        assert!(snapshot.error.is_none());
    }

    #[tokio::test]
    async fn test_pending_work_without_workers_is_degraded() {
        let store = InMemoryJobStore::new();
        store.add_pending_job(Utc::now());
        let snapshot = monitor(store).check_health().await;
        assert_eq!(snapshot.status, HealthStatus::Degraded);
    }

    #[tokio::test]
    async fn test_check_health_fails_open_on_store_error() {
        let store = InMemoryJobStore::new();
        store.set_fail_queries(true);
        let snapshot = monitor(store).check_health().await;
        assert_eq!(snapshot.status, HealthStatus::Error);
        assert!(snapshot.error.is_some());
        assert_eq!(snapshot.workers.total, 0);
        assert_eq!(snapshot.queues.pending, 0);
    }

    #[tokio::test]
    async fn test_needs_restart_when_stuck_jobs_exceed_limit() {
        let store = InMemoryJobStore::new();
        let now = Utc::now();
        store.add_worker(now); // fresh heartbeat, so only the stuck path triggers
        for _ in 0..6 {
            store.add_pending_job(now - Duration::hours(2));
        }
        assert!(monitor(store).needs_restart().await);
    }

    #[tokio::test]
    async fn test_no_restart_at_exactly_the_limit() {
        let store = InMemoryJobStore::new();
        let now = Utc::now();
        store.add_worker(now);
        for _ in 0..5 {
            store.add_pending_job(now - Duration::hours(2));
        }
        assert!(!monitor(store).needs_restart().await);
    }

    #[tokio::test]
    async fn test_needs_restart_when_all_heartbeats_stale() {
        let store = InMemoryJobStore::new();
        store.add_worker(Utc::now() - Duration::minutes(30));
        assert!(monitor(store).needs_restart().await);
    }

    #[tokio::test]
    async fn test_needs_restart_fails_closed_on_store_error() {
        let store = InMemoryJobStore::new();
        let now = Utc::now();
        for _ in 0..20 {
            store.add_pending_job(now - Duration::hours(2));
        }
        store.set_fail_queries(true);
        assert!(!monitor(store).needs_restart().await);
    }

    #[tokio::test]
    async fn test_process_stuck_jobs_scenario() {
        // Six jobs unfinished for two hours, threshold one hour, limit five:
        // restart is warranted and all six can be force-finished.
        let store = InMemoryJobStore::new();
        let now = Utc::now();
        store.add_worker(now);
        let ids: Vec<i64> = (0..6)
            .map(|_| store.add_pending_job(now - Duration::hours(2)))
            .collect();

        let mon = monitor(store.clone());
        assert!(mon.needs_restart().await);
        assert_eq!(mon.process_stuck_jobs(10).await, 6);

        for id in ids {
            assert!(store.job(id).unwrap().finished_at.is_some());
            assert!(store.is_timed_out(id));
        }
    }

    #[tokio::test]
    async fn test_process_stuck_jobs_respects_limit_and_leaves_rest() {
        let store = InMemoryJobStore::new();
        let now = Utc::now();
        for _ in 0..4 {
            store.add_pending_job(now - Duration::hours(2));
        }

        let mon = monitor(store.clone());
        assert_eq!(mon.process_stuck_jobs(2).await, 2);
        assert_eq!(store.pending_count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_process_stuck_jobs_never_touches_finished_or_fresh_jobs() {
        let store = InMemoryJobStore::new();
        let now = Utc::now();
        let finished = store.add_completed_job(now - Duration::hours(3), now - Duration::hours(2));
        let fresh = store.add_pending_job(now - Duration::minutes(10));

        let mon = monitor(store.clone());
        assert_eq!(mon.process_stuck_jobs(10).await, 0);
        assert!(!store.is_timed_out(finished));
        assert!(store.job(fresh).unwrap().finished_at.is_none());
    }

    #[tokio::test]
    async fn test_process_stuck_jobs_returns_zero_on_error() {
        let store = InMemoryJobStore::new();
        store.add_pending_job(Utc::now() - Duration::hours(2));
        store.set_fail_queries(true);
        assert_eq!(monitor(store).process_stuck_jobs(10).await, 0);
    }

    #[tokio::test]
    async fn test_restart_workers_reports_failure_as_false() {
        let store = InMemoryJobStore::new();
        let mon = monitor(store.clone());
        assert!(mon.restart_workers().await);
        assert_eq!(store.restart_requests(), 1);

        store.set_fail_queries(true);
        assert!(!mon.restart_workers().await);
        assert_eq!(store.restart_requests(), 1);
    }

    #[tokio::test]
    async fn test_null_store_monitor_is_quiet() {
        let mon = monitor(Arc::new(NullJobStore));
        let snapshot = mon.check_health().await;
        assert_eq!(snapshot.status, HealthStatus::Healthy);
        assert_eq!(mon.process_stuck_jobs(10).await, 0);
        assert!(mon.restart_workers().await);
    }
}
