use std::time::Duration;

use anyhow::{Error, Result, anyhow};
use dotenvy::dotenv;
use serde::Deserialize;

use crate::{
    clients::database::PoolConfig,
    models::retry::{FixedDelay, RetryConfig},
    rate_limiter::RateLimitConfig,
    worker::pool::WorkerConfig,
};

#[derive(Clone, Deserialize, Debug)]
pub struct Config {
    pub rabbitmq_url: String,
    #[serde(default = "default_prefetch_count")]
    pub prefetch_count: u16,

    pub database_url: String,
    #[serde(default = "default_db_max_connections")]
    pub db_max_connections: u32,
    #[serde(default = "default_db_min_connections")]
    pub db_min_connections: u32,
    #[serde(default = "default_db_max_lifetime_seconds")]
    pub db_max_lifetime_seconds: u64,
    #[serde(default = "default_db_idle_timeout_seconds")]
    pub db_idle_timeout_seconds: u64,
    #[serde(default = "default_db_connect_timeout_seconds")]
    pub db_connect_timeout_seconds: u64,

    pub redis_url: String,
    #[serde(default = "default_rate_limit")]
    pub rate_limit: u64,
    #[serde(default = "default_rate_limit_window_seconds")]
    pub rate_limit_window_seconds: u64,

    #[serde(default = "default_ntfy_base_url")]
    pub ntfy_base_url: String,
    #[serde(default = "default_ntfy_topic")]
    pub ntfy_topic: String,
    pub email_provider_url: Option<String>,
    pub sms_provider_url: Option<String>,
    #[serde(default = "default_delivery_timeout_seconds")]
    pub delivery_timeout_seconds: u64,

    #[serde(default = "default_worker_concurrency")]
    pub worker_concurrency: usize,
    #[serde(default = "default_message_timeout_seconds")]
    pub message_timeout_seconds: u64,
    #[serde(default = "default_requeue_delay_ms")]
    pub requeue_delay_ms: u64,

    #[serde(default = "default_server_port")]
    pub server_port: u16,
}

impl Config {
    pub fn load() -> Result<Self, Error> {
        dotenv().ok();

        let config = envy::from_env::<Self>()
            .map_err(|e| anyhow!("Invalid or missing environmental variable: {}", e))?;
        Ok(config)
    }

    pub fn connect_retry_config(&self) -> RetryConfig {
        RetryConfig::broker_connect()
    }

    pub fn publish_retry_config(&self) -> RetryConfig {
        RetryConfig::publish()
    }

    pub fn pool_config(&self) -> PoolConfig {
        PoolConfig {
            max_connections: self.db_max_connections,
            min_connections: self.db_min_connections,
            max_lifetime: Duration::from_secs(self.db_max_lifetime_seconds),
            idle_timeout: Duration::from_secs(self.db_idle_timeout_seconds),
            connect_timeout: Duration::from_secs(self.db_connect_timeout_seconds),
        }
    }

    pub fn rate_limit_config(&self) -> RateLimitConfig {
        RateLimitConfig {
            limit: self.rate_limit,
            window: Duration::from_secs(self.rate_limit_window_seconds),
        }
    }

    pub fn worker_config(&self) -> WorkerConfig {
        WorkerConfig {
            workers: self.worker_concurrency,
            message_timeout: Duration::from_secs(self.message_timeout_seconds),
            ..WorkerConfig::default()
        }
    }

    pub fn requeue_backoff(&self) -> FixedDelay {
        FixedDelay(Duration::from_millis(self.requeue_delay_ms))
    }

    pub fn delivery_timeout(&self) -> Duration {
        Duration::from_secs(self.delivery_timeout_seconds)
    }
}

fn default_prefetch_count() -> u16 {
    10
}

fn default_db_max_connections() -> u32 {
    10
}

fn default_db_min_connections() -> u32 {
    2
}

fn default_db_max_lifetime_seconds() -> u64 {
    1800
}

fn default_db_idle_timeout_seconds() -> u64 {
    300
}

fn default_db_connect_timeout_seconds() -> u64 {
    5
}

fn default_rate_limit() -> u64 {
    10
}

fn default_rate_limit_window_seconds() -> u64 {
    60
}

fn default_ntfy_base_url() -> String {
    "https://ntfy.sh".to_string()
}

fn default_ntfy_topic() -> String {
    "notify-service".to_string()
}

fn default_delivery_timeout_seconds() -> u64 {
    10
}

fn default_worker_concurrency() -> usize {
    10
}

fn default_message_timeout_seconds() -> u64 {
    5
}

fn default_requeue_delay_ms() -> u64 {
    2000
}

fn default_server_port() -> u16 {
    8080
}
