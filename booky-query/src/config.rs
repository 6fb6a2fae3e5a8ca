//! Configuration for the query cache.

use rand::Rng;
use std::time::Duration;

/// Configuration for [`QueryClient`](crate::QueryClient).
#[derive(Debug, Clone, PartialEq)]
pub struct QueryConfig {
    /// How long fetched data is served without refetching.
    pub stale_time: Duration,
    /// How long an entry without subscribers survives before garbage collection.
    pub gc_time: Duration,
    /// Retry policy for reads. Writes are never retried.
    pub retry: RetryConfig,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            stale_time: Duration::from_secs(30),
            gc_time: Duration::from_secs(300), // 5 minutes
            retry: RetryConfig::default(),
        }
    }
}

impl QueryConfig {
    /// Create a new query config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the stale time.
    pub fn with_stale_time(mut self, duration: Duration) -> Self {
        self.stale_time = duration;
        self
    }

    /// Set the garbage collection idle time.
    pub fn with_gc_time(mut self, duration: Duration) -> Self {
        self.gc_time = duration;
        self
    }

    /// Set the read retry policy.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }
}

/// Bounded exponential backoff for transient read failures.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Retries after the first attempt; 0 disables retrying.
    pub max_retries: u32,
    pub initial_ms: u64,
    pub max_ms: u64,
    pub multiplier: f64,
    pub jitter_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_ms: 1_000,
            max_ms: 30_000,
            multiplier: 2.0,
            jitter_ms: 250,
        }
    }
}

impl RetryConfig {
    /// A policy that never retries.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Delay before retry number `attempt` (0-based), jitter included.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let scaled = self.initial_ms as f64 * self.multiplier.max(1.0).powi(exponent);
        let base = if scaled.is_finite() {
            (scaled as u64).min(self.max_ms)
        } else {
            self.max_ms
        };
        Duration::from_millis(jittered_backoff(base, self.jitter_ms))
    }
}

fn jittered_backoff(base_ms: u64, jitter_ms: u64) -> u64 {
    if jitter_ms == 0 {
        return base_ms;
    }
    let jitter = rand::rng().random_range(0..jitter_ms);
    base_ms.saturating_add(jitter)
}
