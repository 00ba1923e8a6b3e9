//! Health snapshot types.
//!
//! A snapshot is an immutable point-in-time aggregate of worker and queue
//! counts, built fresh on every check and serialized directly into the
//! payload the dashboard's `/health` handler renders.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Overall classification of a health snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Error,
}

impl HealthStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            HealthStatus::Healthy => "healthy",
            HealthStatus::Degraded => "degraded",
            HealthStatus::Error => "error",
        }
    }

    pub fn is_healthy(&self) -> bool {
        matches!(self, HealthStatus::Healthy)
    }

    /// Degraded still serves traffic; error means a facet could not be read.
    pub fn is_operational(&self) -> bool {
        matches!(self, HealthStatus::Healthy | HealthStatus::Degraded)
    }
}

/// Worker pool counts at snapshot time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerCounts {
    #[serde(rename = "count")]
    pub total: u64,
    pub active: u64,
}

/// Queue counts at snapshot time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueCounts {
    pub pending: u64,
    pub completed: u64,
    pub failed: u64,
}

/// Point-in-time health aggregate. Never mutated after construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthSnapshot {
    pub status: HealthStatus,
    pub workers: WorkerCounts,
    pub queues: QueueCounts,
    #[serde(rename = "timestamp")]
    pub taken_at: DateTime<Utc>,
    /// Human-readable description of whatever facet failed, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl HealthSnapshot {
    pub fn new(status: HealthStatus, workers: WorkerCounts, queues: QueueCounts) -> Self {
        Self {
            status,
            workers,
            queues,
            taken_at: Utc::now(),
            error: None,
        }
    }

    /// A snapshot for a check that could not read one or more facets.
    /// Facets that did resolve keep their counts; the rest stay zeroed.
    pub fn with_error(
        workers: WorkerCounts,
        queues: QueueCounts,
        message: impl Into<String>,
    ) -> Self {
        Self {
            status: HealthStatus::Error,
            workers,
            queues,
            taken_at: Utc::now(),
            error: Some(message.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_predicates() {
        assert!(HealthStatus::Healthy.is_healthy());
        assert!(!HealthStatus::Degraded.is_healthy());
        assert!(HealthStatus::Degraded.is_operational());
        assert!(!HealthStatus::Error.is_operational());
        assert_eq!(HealthStatus::Error.as_str(), "error");
    }

    #[test]
    fn test_snapshot_serializes_to_dashboard_shape() {
        let snapshot = HealthSnapshot::new(
            HealthStatus::Healthy,
            WorkerCounts {
                total: 3,
                active: 2,
            },
            QueueCounts {
                pending: 5,
                completed: 40,
                failed: 1,
            },
        );

        let value = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(value["status"], "healthy");
        assert_eq!(value["workers"]["count"], 3);
        assert_eq!(value["workers"]["active"], 2);
        assert_eq!(value["queues"]["pending"], 5);
        assert_eq!(value["queues"]["failed"], 1);
        assert!(value["timestamp"].is_string());
        assert!(value.get("error").is_none());
    }

    #[test]
    fn test_error_snapshot_keeps_resolved_counts() {
        let snapshot = HealthSnapshot::with_error(
            WorkerCounts {
                total: 2,
                active: 2,
            },
            QueueCounts::default(),
            "queue store unavailable",
        );
        assert_eq!(snapshot.status, HealthStatus::Error);
        assert_eq!(snapshot.workers.total, 2);
        assert_eq!(snapshot.queues.pending, 0);
        let value = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(value["error"], "queue store unavailable");
    }
}
