//! Fixed-window request limiter keyed by user.
//!
//! A burst straddling a window boundary can let up to twice the limit
//! through; that imprecision is accepted.

use std::{sync::Arc, time::Duration};

use anyhow::{Error, Result};
use async_trait::async_trait;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub limit: u64,
    pub window: Duration,
}

/// Counter store with per-key expiry.
#[async_trait]
pub trait WindowCounter: Send + Sync {
    /// Atomically increments `key` and returns the post-increment value.
    ///
    /// If the key carries no expiry afterwards, it is given `window` in the
    /// same step, so a counter can never outlive its window.
    async fn increment(&self, key: &str, window: Duration) -> Result<u64, Error>;
}

pub struct RateLimiter {
    counter: Arc<dyn WindowCounter>,
    config: RateLimitConfig,
}

impl RateLimiter {
    pub fn new(counter: Arc<dyn WindowCounter>, config: RateLimitConfig) -> Self {
        Self { counter, config }
    }

    pub fn key_for(user_id: &str) -> String {
        format!("rate:{}", user_id)
    }

    /// Counts one request for `user_id` and reports whether it fits the window.
    pub async fn allow(&self, user_id: &str) -> Result<bool, Error> {
        let key = Self::key_for(user_id);
        let count = self.counter.increment(&key, self.config.window).await?;

        if count > self.config.limit {
            warn!(
                user_id = %user_id,
                count = count,
                limit = self.config.limit,
                "Rate limit exceeded"
            );
            return Ok(false);
        }

        debug!(user_id = %user_id, count = count, "Request within rate limit");
        Ok(true)
    }
}
