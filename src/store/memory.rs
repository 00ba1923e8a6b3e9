//! In-memory job store.
//!
//! Mutex-guarded test double with the same contract as the Postgres store,
//! plus error injection (`fail_queries`) so callers can exercise the
//! fail-open and fail-closed paths of the health monitor.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use super::{JobRecord, JobStore, WorkerRecord};
use crate::error::{DocstreamError, Result};

#[derive(Debug, Clone)]
struct StoredJob {
    record: JobRecord,
    failed: bool,
    timed_out: bool,
}

#[derive(Debug, Default)]
pub struct InMemoryJobStore {
    jobs: Mutex<BTreeMap<i64, StoredJob>>,
    workers: Mutex<Vec<WorkerRecord>>,
    restart_requests: AtomicU64,
    fail_queries: AtomicBool,
    next_id: AtomicU64,
}

impl InMemoryJobStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Add an unfinished job created at `created_at`; returns its id.
    pub fn add_pending_job(&self, created_at: DateTime<Utc>) -> i64 {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) as i64 + 1;
        self.jobs.lock().insert(
            id,
            StoredJob {
                record: JobRecord {
                    id,
                    created_at,
                    finished_at: None,
                },
                failed: false,
                timed_out: false,
            },
        );
        id
    }

    /// Add a job that finished normally.
    pub fn add_completed_job(&self, created_at: DateTime<Utc>, finished_at: DateTime<Utc>) -> i64 {
        let id = self.add_pending_job(created_at);
        if let Some(job) = self.jobs.lock().get_mut(&id) {
            job.record.finished_at = Some(finished_at);
        }
        id
    }

    /// Add a job that finished with a failure.
    pub fn add_failed_job(&self, created_at: DateTime<Utc>, finished_at: DateTime<Utc>) -> i64 {
        let id = self.add_completed_job(created_at, finished_at);
        if let Some(job) = self.jobs.lock().get_mut(&id) {
            job.failed = true;
        }
        id
    }

    pub fn add_worker(&self, last_heartbeat_at: DateTime<Utc>) {
        let mut workers = self.workers.lock();
        let id = workers.len() as i64 + 1;
        workers.push(WorkerRecord {
            id,
            last_heartbeat_at,
        });
    }

    /// Make every subsequent store call fail, for error-path tests.
    pub fn set_fail_queries(&self, fail: bool) {
        self.fail_queries.store(fail, Ordering::SeqCst);
    }

    pub fn restart_requests(&self) -> u64 {
        self.restart_requests.load(Ordering::SeqCst)
    }

    pub fn job(&self, id: i64) -> Option<JobRecord> {
        self.jobs.lock().get(&id).map(|j| j.record.clone())
    }

    /// Whether a job was force-finished (stamped timed out).
    pub fn is_timed_out(&self, id: i64) -> bool {
        self.jobs.lock().get(&id).is_some_and(|j| j.timed_out)
    }

    fn check_failure(&self) -> Result<()> {
        if self.fail_queries.load(Ordering::SeqCst) {
            Err(DocstreamError::StoreError(
                "injected store failure".to_string(),
            ))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn pending_count(&self) -> Result<i64> {
        self.check_failure()?;
        let jobs = self.jobs.lock();
        Ok(jobs
            .values()
            .filter(|j| j.record.finished_at.is_none())
            .count() as i64)
    }

    async fn completed_count(&self) -> Result<i64> {
        self.check_failure()?;
        let jobs = self.jobs.lock();
        Ok(jobs
            .values()
            .filter(|j| j.record.finished_at.is_some() && !j.failed && !j.timed_out)
            .count() as i64)
    }

    async fn failed_count(&self) -> Result<i64> {
        self.check_failure()?;
        let jobs = self.jobs.lock();
        Ok(jobs.values().filter(|j| j.failed || j.timed_out).count() as i64)
    }

    async fn workers(&self) -> Result<Vec<WorkerRecord>> {
        self.check_failure()?;
        Ok(self.workers.lock().clone())
    }

    async fn stale_jobs(&self, cutoff: DateTime<Utc>, limit: u64) -> Result<Vec<JobRecord>> {
        self.check_failure()?;
        let jobs = self.jobs.lock();
        let mut stale: Vec<JobRecord> = jobs
            .values()
            .filter(|j| j.record.is_stuck(cutoff))
            .map(|j| j.record.clone())
            .collect();
        stale.sort_by_key(|j| j.created_at);
        stale.truncate(limit as usize);
        Ok(stale)
    }

    async fn force_finish(&self, job_id: i64, finished_at: DateTime<Utc>) -> Result<()> {
        self.check_failure()?;
        let mut jobs = self.jobs.lock();
        if let Some(job) = jobs.get_mut(&job_id) {
            if job.record.finished_at.is_none() {
                job.record.finished_at = Some(finished_at);
                job.timed_out = true;
            }
        }
        Ok(())
    }

    async fn request_worker_restart(&self) -> Result<()> {
        self.check_failure()?;
        self.restart_requests.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
