#![allow(clippy::doc_markdown)] // Allow technical terms like PostgreSQL, SQLx in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Docstream Core
//!
//! Rust core behind the Docstream dashboard engine: job health monitoring
//! and real-time status broadcasting for the document ingestion pipeline.
//!
//! ## Overview
//!
//! The Rails engine owns routing, controllers, and rendering; the document
//! parsing/chunking/embedding pipeline owns the actual processing work.
//! This crate carries the two pieces with real engineering content between
//! them:
//!
//! - **Health Monitor** - watches the background job queue for stuck work
//!   and silent workers, classifies overall health, and carries the
//!   administrative recovery actions (force-finishing stuck jobs,
//!   signalling a worker-pool restart). Every operation is defensive: it
//!   runs unattended and always returns something renderable.
//! - **Status Broadcaster** - session-keyed publish/subscribe fan-out.
//!   As a bulk upload progresses, the pipeline publishes progress events
//!   under the upload's session id; any number of dashboard clients
//!   subscribe per session and receive events in publish order, with a
//!   ping/pong probe to detect dead transports.
//!
//! ## Module Organization
//!
//! - [`store`] - capability interface over the Rails-owned job queue
//!   (Postgres, in-memory, and no-op implementations)
//! - [`monitor`] - health checking, recovery actions, and the scheduled
//!   check loop
//! - [`events`] - status events and the session-keyed broadcaster
//! - [`config`] - explicit configuration with documented defaults
//! - [`error`] - structured error handling
//! - [`logging`] - environment-aware tracing setup
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use docstream_core::config::DocstreamConfig;
//! use docstream_core::events::{EventKind, StatusBroadcaster};
//! use docstream_core::monitor::HealthMonitor;
//! use docstream_core::store::NullJobStore;
//!
//! # async fn example() {
//! let config = DocstreamConfig::default();
//!
//! let monitor = HealthMonitor::new(Arc::new(NullJobStore), config.monitor.clone());
//! let snapshot = monitor.check_health().await;
//! println!("queue status: {}", snapshot.status.as_str());
//!
//! let broadcaster = StatusBroadcaster::new(config.broadcast.feed_name.clone());
//! let mut subscription = broadcaster.subscribe("abc123").unwrap();
//! broadcaster.publish("abc123", EventKind::Progress, serde_json::json!({"done": 3, "total": 10}));
//! let event = subscription.recv().await.unwrap();
//! # }
//! ```

pub mod config;
pub mod error;
pub mod events;
pub mod logging;
pub mod monitor;
pub mod store;

pub use config::{BroadcastConfig, DatabaseConfig, DocstreamConfig, MonitorConfig};
pub use error::{DocstreamError, Result};
pub use events::{
    EventKind, StatusBroadcaster, StatusEvent, SubscribeError, SubscriptionHandle, Topic,
};
pub use monitor::{
    HealthMonitor, HealthSnapshot, HealthStatus, MonitorScheduler, QueueCounts, WorkerCounts,
};
pub use store::{InMemoryJobStore, JobRecord, JobStore, NullJobStore, PgJobStore, WorkerRecord};
