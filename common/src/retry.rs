// Retry policy for broker publishes: exponential backoff with jitter

use rand::Rng;
use std::time::Duration;

/// Decides whether and how long to wait before the next publish attempt
pub trait RetryStrategy: Send + Sync {
    /// Delay before retry number `attempt` (0-based), None once retries are exhausted
    fn next_delay(&self, attempt: u32) -> Option<Duration>;

    fn max_retries(&self) -> u32;

    fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_retries()
    }
}

/// Exponential backoff: base * 2^attempt, capped, plus up to `jitter_factor` of random jitter
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    base_delay: Duration,
    max_delay: Duration,
    jitter_factor: f64,
    max_retries: u32,
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(2),
            jitter_factor: 0.1,
            max_retries: 3,
        }
    }
}

impl ExponentialBackoff {
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            ..Self::default()
        }
    }

    pub fn with_config(
        base_delay: Duration,
        max_delay: Duration,
        jitter_factor: f64,
        max_retries: u32,
    ) -> Self {
        Self {
            base_delay,
            max_delay,
            jitter_factor: jitter_factor.clamp(0.0, 1.0),
            max_retries,
        }
    }

    fn base_delay_for(&self, attempt: u32) -> Duration {
        let factor = 2_u32.checked_pow(attempt).unwrap_or(u32::MAX);
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    fn with_jitter(&self, delay: Duration) -> Duration {
        if self.jitter_factor == 0.0 {
            return delay;
        }
        let range_ms = (delay.as_millis() as f64 * self.jitter_factor) as u64;
        if range_ms == 0 {
            return delay;
        }
        delay + Duration::from_millis(rand::thread_rng().gen_range(0..=range_ms))
    }
}

impl RetryStrategy for ExponentialBackoff {
    fn next_delay(&self, attempt: u32) -> Option<Duration> {
        if !self.should_retry(attempt) {
            return None;
        }
        Some(self.with_jitter(self.base_delay_for(attempt)))
    }

    fn max_retries(&self) -> u32 {
        self.max_retries
    }
}

/// Constant delay between attempts
#[derive(Debug, Clone)]
pub struct FixedDelay {
    delay: Duration,
    max_retries: u32,
}

impl FixedDelay {
    pub fn new(delay: Duration, max_retries: u32) -> Self {
        Self { delay, max_retries }
    }
}

impl RetryStrategy for FixedDelay {
    fn next_delay(&self, attempt: u32) -> Option<Duration> {
        self.should_retry(attempt).then_some(self.delay)
    }

    fn max_retries(&self) -> u32 {
        self.max_retries
    }
}
