//! # Job Store
//!
//! Capability interface over the Rails-owned background job queue.
//!
//! ## Overview
//!
//! The queue and worker tables belong to the document processing pipeline;
//! this core only reads them and performs bounded administrative writes
//! (force-finishing individual stuck jobs, signalling a worker restart).
//! Everything goes through the [`JobStore`] trait so the health monitor can
//! run against Postgres in production, against [`NullJobStore`] when the
//! queue is not provisioned, and against [`memory::InMemoryJobStore`] in
//! tests - there are no runtime "is the queue gem loaded?" checks anywhere.
//!
//! ## Implementations
//!
//! - [`postgres::PgJobStore`] - the production store backed by sqlx
//! - [`NullJobStore`] - no-op stub: zero counts, empty lists, logged no-op restart
//! - [`memory::InMemoryJobStore`] - mutex-guarded test double

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::Result;

pub use memory::InMemoryJobStore;
pub use postgres::PgJobStore;

/// A unit of asynchronous work tracked by creation and completion timestamps.
///
/// Read-only to this core apart from [`JobStore::force_finish`]. Once
/// `finished_at` is set it never reverts to `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct JobRecord {
    pub id: i64,
    pub created_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl JobRecord {
    /// A job is stuck when it is unfinished and older than `cutoff`.
    pub fn is_stuck(&self, cutoff: DateTime<Utc>) -> bool {
        self.finished_at.is_none() && self.created_at < cutoff
    }
}

/// An independent execution unit that processes jobs and periodically
/// reports a heartbeat.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct WorkerRecord {
    pub id: i64,
    pub last_heartbeat_at: DateTime<Utc>,
}

impl WorkerRecord {
    /// A worker with no heartbeat since `cutoff` is considered inactive.
    pub fn is_active(&self, cutoff: DateTime<Utc>) -> bool {
        self.last_heartbeat_at >= cutoff
    }
}

/// Capability interface over the job queue collaborator.
///
/// All reads are point-in-time; the queue is concurrently mutated by worker
/// processes this core does not control. Writes are limited to the two
/// administrative escape hatches at the bottom.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Count of jobs not yet finished
    async fn pending_count(&self) -> Result<i64>;

    /// Count of jobs finished successfully
    async fn completed_count(&self) -> Result<i64>;

    /// Count of jobs finished with a failure (including timed-out ones)
    async fn failed_count(&self) -> Result<i64>;

    /// All registered workers with their last heartbeat
    async fn workers(&self) -> Result<Vec<WorkerRecord>>;

    /// Unfinished jobs created before `cutoff`, oldest first, at most `limit`
    async fn stale_jobs(&self, cutoff: DateTime<Utc>, limit: u64) -> Result<Vec<JobRecord>>;

    /// Force-finish a single job: stamp `finished_at` and mark it timed out.
    ///
    /// This bypasses normal completion side effects - it is an administrative
    /// escape hatch, not a substitute for a worker completing the job. The
    /// job is recorded as timed out rather than successful so analytics can
    /// tell a forced finish from a real completion.
    async fn force_finish(&self, job_id: i64, finished_at: DateTime<Utc>) -> Result<()>;

    /// Signal a worker-pool restart through the collaborator's mechanism.
    async fn request_worker_restart(&self) -> Result<()>;
}

/// No-op store substituted when the real queue is not provisioned
/// (e.g. the dashboard running without the processing pipeline attached).
#[derive(Debug, Clone, Default)]
pub struct NullJobStore;

#[async_trait]
impl JobStore for NullJobStore {
    async fn pending_count(&self) -> Result<i64> {
        Ok(0)
    }

    async fn completed_count(&self) -> Result<i64> {
        Ok(0)
    }

    async fn failed_count(&self) -> Result<i64> {
        Ok(0)
    }

    async fn workers(&self) -> Result<Vec<WorkerRecord>> {
        Ok(Vec::new())
    }

    async fn stale_jobs(&self, _cutoff: DateTime<Utc>, _limit: u64) -> Result<Vec<JobRecord>> {
        Ok(Vec::new())
    }

    async fn force_finish(&self, job_id: i64, _finished_at: DateTime<Utc>) -> Result<()> {
        info!(job_id, "NullJobStore: ignoring force_finish");
        Ok(())
    }

    async fn request_worker_restart(&self) -> Result<()> {
        info!("NullJobStore: ignoring worker restart request");
        Ok(())
    }
}
