//! # Docstream Configuration System
//!
//! Explicit configuration for the health monitor and status broadcaster.
//! Configuration is a plain value passed in at construction time rather than
//! a process-global settings object, so components can be tested in
//! isolation with nothing shared between them.
//!
//! ## Usage
//!
//! ```rust
//! use docstream_core::config::DocstreamConfig;
//!
//! let config = DocstreamConfig::default();
//! assert_eq!(config.monitor.stale_job_threshold_seconds, 3600);
//! assert_eq!(config.monitor.stuck_job_limit, 5);
//! ```

pub mod loader;

use std::time::Duration;

use serde::{Deserialize, Serialize};

pub use loader::ConfigLoader;

use crate::error::{DocstreamError, Result};

/// Root configuration structure mirroring docstream.yaml
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct DocstreamConfig {
    /// Connection parameters for the Rails-owned job queue database
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Health monitor thresholds and scheduling
    #[serde(default)]
    pub monitor: MonitorConfig,

    /// Status feed naming
    #[serde(default)]
    pub broadcast: BroadcastConfig,
}

impl DocstreamConfig {
    /// Validate cross-field constraints. Called by the loader after merge.
    pub fn validate(&self) -> Result<()> {
        if self.monitor.stale_job_threshold_seconds == 0 {
            return Err(DocstreamError::ConfigurationError(
                "monitor.stale_job_threshold_seconds must be greater than zero".to_string(),
            ));
        }
        if self.monitor.heartbeat_freshness_seconds == 0 {
            return Err(DocstreamError::ConfigurationError(
                "monitor.heartbeat_freshness_seconds must be greater than zero".to_string(),
            ));
        }
        if self.broadcast.feed_name.is_empty() || self.broadcast.health_feed_name.is_empty() {
            return Err(DocstreamError::ConfigurationError(
                "broadcast feed names must not be empty".to_string(),
            ));
        }
        if self.broadcast.feed_name == self.broadcast.health_feed_name {
            return Err(DocstreamError::ConfigurationError(
                "broadcast.feed_name and broadcast.health_feed_name must be disjoint".to_string(),
            ));
        }
        Ok(())
    }
}

/// Connection parameters for the job queue collaborator.
///
/// The queue tables are owned by the Rails side; this core only needs a
/// read-mostly connection with a small pool.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Full connection URL; overrides host/database when present
    pub url: Option<String>,
    pub host: String,
    pub database: String,
    pub pool: u32,
    pub checkout_timeout_seconds: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            host: "localhost".to_string(),
            database: "docstream_development".to_string(),
            pool: 5,
            checkout_timeout_seconds: 10,
        }
    }
}

/// Health monitor thresholds.
///
/// Defaults: a job is stuck after one hour, more than five stuck jobs (or a
/// silent worker pool) warrants a restart, and a worker heartbeat is fresh
/// for five minutes.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Age in seconds before an unfinished job counts as stuck (default 3600)
    pub stale_job_threshold_seconds: u64,
    /// Stuck-job count above which a worker restart is recommended (default 5)
    pub stuck_job_limit: u64,
    /// Window in seconds within which a worker heartbeat counts as fresh (default 300)
    pub heartbeat_freshness_seconds: u64,
    /// Interval in seconds between scheduled health checks (default 60)
    pub check_interval_seconds: u64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            stale_job_threshold_seconds: 3600,
            stuck_job_limit: 5,
            heartbeat_freshness_seconds: 300,
            check_interval_seconds: 60,
        }
    }
}

impl MonitorConfig {
    pub fn stale_job_threshold(&self) -> Duration {
        Duration::from_secs(self.stale_job_threshold_seconds)
    }

    pub fn heartbeat_freshness(&self) -> Duration {
        Duration::from_secs(self.heartbeat_freshness_seconds)
    }

    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_seconds)
    }
}

/// Status feed naming.
///
/// The two feeds use disjoint name prefixes so document-status topics and
/// system-health topics can never collide, even for equal session ids.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BroadcastConfig {
    /// Feed prefix for per-session document processing status (default "document_status")
    pub feed_name: String,
    /// Feed prefix for operational health alerts (default "system_health")
    pub health_feed_name: String,
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self {
            feed_name: "document_status".to_string(),
            health_feed_name: "system_health".to_string(),
        }
    }
}
