//! Postgres-backed job store.
//!
//! Runs against the queue tables owned by the Rails side (`docstream_jobs`,
//! `docstream_workers`). Queries use the runtime `query_as` API so the crate
//! builds without a live database; row shapes are pinned by the `FromRow`
//! derives on [`JobRecord`] and [`WorkerRecord`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::time::Duration;
use tracing::debug;

use super::{JobRecord, JobStore, WorkerRecord};
use crate::config::DatabaseConfig;
use crate::error::Result;

#[derive(Debug, Clone)]
pub struct PgJobStore {
    pool: PgPool,
}

impl PgJobStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect using the collaborator connection parameters from config.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let url = match &config.url {
            Some(url) => url.clone(),
            None => format!("postgresql://{}/{}", config.host, config.database),
        };

        let pool = PgPoolOptions::new()
            .max_connections(config.pool)
            .acquire_timeout(Duration::from_secs(config.checkout_timeout_seconds))
            .connect(&url)
            .await?;

        debug!(host = %config.host, database = %config.database, "Connected to job queue database");
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn count(&self, sql: &str) -> Result<i64> {
        let (count,): (i64,) = sqlx::query_as(sql).fetch_one(&self.pool).await?;
        Ok(count)
    }
}

#[async_trait]
impl JobStore for PgJobStore {
    async fn pending_count(&self) -> Result<i64> {
        self.count("SELECT COUNT(*) FROM docstream_jobs WHERE finished_at IS NULL")
            .await
    }

    async fn completed_count(&self) -> Result<i64> {
        self.count(
            "SELECT COUNT(*) FROM docstream_jobs \
             WHERE finished_at IS NOT NULL AND failed_at IS NULL AND NOT timed_out",
        )
        .await
    }

    async fn failed_count(&self) -> Result<i64> {
        self.count(
            "SELECT COUNT(*) FROM docstream_jobs \
             WHERE failed_at IS NOT NULL OR timed_out",
        )
        .await
    }

    async fn workers(&self) -> Result<Vec<WorkerRecord>> {
        let workers = sqlx::query_as::<_, WorkerRecord>(
            "SELECT id, last_heartbeat_at FROM docstream_workers ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(workers)
    }

    async fn stale_jobs(&self, cutoff: DateTime<Utc>, limit: u64) -> Result<Vec<JobRecord>> {
        let jobs = sqlx::query_as::<_, JobRecord>(
            "SELECT id, created_at, finished_at FROM docstream_jobs \
             WHERE finished_at IS NULL AND created_at < $1 \
             ORDER BY created_at ASC LIMIT $2",
        )
        .bind(cutoff)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;
        Ok(jobs)
    }

    async fn force_finish(&self, job_id: i64, finished_at: DateTime<Utc>) -> Result<()> {
        // finished_at and the timed_out marker are written together so a
        // forced finish is never mistaken for a normal completion.
        sqlx::query(
            "UPDATE docstream_jobs SET finished_at = $1, timed_out = TRUE \
             WHERE id = $2 AND finished_at IS NULL",
        )
        .bind(finished_at)
        .bind(job_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn request_worker_restart(&self) -> Result<()> {
        // Workers listen on this channel; the actual pool restart is owned
        // by the collaborator.
        sqlx::query("SELECT pg_notify('docstream_worker_control', 'restart')")
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
