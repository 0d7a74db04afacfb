use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Overall or per-dependency condition reported on `/health`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    /// A non-critical dependency is down; the process still does its job.
    Degraded,
    Unhealthy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheckResponse {
    pub status: HealthStatus,
    pub timestamp: DateTime<Utc>,
    pub checks: HashMap<String, DependencyHealth>,
}

impl HealthCheckResponse {
    pub fn is_serving(&self) -> bool {
        self.status != HealthStatus::Unhealthy
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DependencyHealth {
    pub status: HealthStatus,
    pub critical: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_time_ms: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DependencyHealth {
    pub fn reachable(critical: bool, response_time_ms: u64) -> Self {
        Self {
            status: HealthStatus::Healthy,
            critical,
            response_time_ms: Some(response_time_ms),
            error: None,
        }
    }

    pub fn unreachable(critical: bool, error: String) -> Self {
        Self {
            status: HealthStatus::Unhealthy,
            critical,
            response_time_ms: None,
            error: Some(error),
        }
    }
}
