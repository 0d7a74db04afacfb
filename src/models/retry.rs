use std::time::Duration;

#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub backoff_multiplier: u64,
    pub jitter: bool,
}

impl RetryConfig {
    /// Same delay between every attempt, no jitter.
    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        let delay_ms = delay.as_millis() as u64;

        Self {
            max_attempts,
            initial_delay_ms: delay_ms,
            max_delay_ms: delay_ms,
            backoff_multiplier: 1,
            jitter: false,
        }
    }

    /// Broker dial: 5 attempts, 2 seconds apart.
    pub fn broker_connect() -> Self {
        Self::fixed(5, Duration::from_secs(2))
    }

    /// Publish: 3 attempts, 1 second apart.
    pub fn publish() -> Self {
        Self::fixed(3, Duration::from_secs(1))
    }
}

/// Delay strategy between attempts. `attempt` is 1-based: the delay after the
/// first failure is `delay(1)`.
pub trait Backoff: Send + Sync {
    fn delay(&self, attempt: u32) -> Duration;
}

impl Backoff for RetryConfig {
    fn delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1);
        let factor = self.backoff_multiplier.max(1).saturating_pow(exponent);
        let delay_ms = self
            .initial_delay_ms
            .saturating_mul(factor)
            .min(self.max_delay_ms);

        Duration::from_millis(delay_ms)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FixedDelay(pub Duration);

impl FixedDelay {
    pub fn none() -> Self {
        Self(Duration::ZERO)
    }
}

impl Backoff for FixedDelay {
    fn delay(&self, _attempt: u32) -> Duration {
        self.0
    }
}
