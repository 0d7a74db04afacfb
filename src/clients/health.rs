use std::{collections::HashMap, sync::Arc, time::Duration};

use anyhow::{Error, Result, anyhow};
use async_trait::async_trait;
use chrono::Utc;
use tokio::time::{Instant, timeout};
use tracing::{debug, warn};

use crate::{
    clients::{
        database::DatabaseClient,
        rbmq::{Producer, RabbitMqClient},
        redis::RedisClient,
    },
    models::health::{DependencyHealth, HealthCheckResponse, HealthStatus},
};

const PROBE_TIMEOUT: Duration = Duration::from_secs(2);

/// A dependency that can report whether it is reachable.
#[async_trait]
pub trait HealthProbe: Send + Sync {
    async fn probe(&self) -> Result<(), Error>;
}

#[async_trait]
impl HealthProbe for DatabaseClient {
    async fn probe(&self) -> Result<(), Error> {
        self.health_check().await
    }
}

#[async_trait]
impl HealthProbe for RedisClient {
    async fn probe(&self) -> Result<(), Error> {
        self.ping().await
    }
}

#[async_trait]
impl HealthProbe for RabbitMqClient {
    async fn probe(&self) -> Result<(), Error> {
        if self.is_connected() {
            Ok(())
        } else {
            Err(anyhow!("RabbitMQ connection is not open"))
        }
    }
}

#[async_trait]
impl HealthProbe for Producer {
    async fn probe(&self) -> Result<(), Error> {
        if self.is_connected() {
            Ok(())
        } else {
            Err(anyhow!("RabbitMQ connection is not open"))
        }
    }
}

#[derive(Clone)]
struct Check {
    name: String,
    critical: bool,
    probe: Arc<dyn HealthProbe>,
}

#[derive(Clone, Default)]
pub struct HealthChecker {
    checks: Vec<Check>,
}

impl HealthChecker {
    pub fn new() -> Self {
        Self::default()
    }

    /// A failing critical dependency makes the service unhealthy; any other
    /// failing dependency only degrades it.
    pub fn with_check(mut self, name: &str, critical: bool, probe: Arc<dyn HealthProbe>) -> Self {
        self.checks.push(Check {
            name: name.to_string(),
            critical,
            probe,
        });
        self
    }

    pub async fn check_all(&self) -> HealthCheckResponse {
        let mut results = HashMap::new();
        let mut status = HealthStatus::Healthy;

        for check in &self.checks {
            let health = Self::run_probe(check).await;

            if health.status == HealthStatus::Unhealthy {
                status = if check.critical {
                    HealthStatus::Unhealthy
                } else if status == HealthStatus::Healthy {
                    HealthStatus::Degraded
                } else {
                    status
                };
            }

            results.insert(check.name.clone(), health);
        }

        HealthCheckResponse {
            status,
            timestamp: Utc::now(),
            checks: results,
        }
    }

    async fn run_probe(check: &Check) -> DependencyHealth {
        let start = Instant::now();

        match timeout(PROBE_TIMEOUT, check.probe.probe()).await {
            Ok(Ok(())) => {
                let elapsed = start.elapsed().as_millis() as u64;
                debug!(dependency = %check.name, response_time_ms = elapsed, "Health check passed");
                DependencyHealth::reachable(check.critical, elapsed)
            }
            Ok(Err(e)) => {
                warn!(dependency = %check.name, error = %e, "Health check failed");
                DependencyHealth::unreachable(check.critical, e.to_string())
            }
            Err(_) => {
                warn!(dependency = %check.name, "Health check timed out");
                DependencyHealth::unreachable(
                    check.critical,
                    format!("Timed out after {:?}", PROBE_TIMEOUT),
                )
            }
        }
    }
}
