//! Global rate limiting using a fixed-window token bucket
//!
//! Every outbound delivery attempt, whichever provider it targets, takes one
//! token from a single shared bucket.
//!
//! # Token Bucket Algorithm
//!
//! - The bucket starts full with `tokens` permits
//! - Each attempt consumes one permit
//! - Once `interval_ms` has passed since the last refill the bucket is reset to
//!   full capacity (a hard reset, not a gradual trickle)
//! - An attempt that finds the bucket empty sleeps until the next refill is
//!   due, refills, and then takes a permit without checking again
//!
//! # Example
//!
//! ```text
//! Rate limit: 5 tokens per 1000ms
//! t=0ms:    5 attempts go straight through
//! t=10ms:   6th attempt sleeps 990ms
//! t=1000ms: bucket reset to 5, 6th attempt takes one (4 left)
//! ```
//!
//! The take after a stall is unconditional. If another caller drained the
//! fresh bucket in the meantime the count goes negative, so at most one
//! permit of debt is issued per stall.

use std::{
    sync::atomic::{AtomicU64, Ordering},
    time::Duration,
};

use herald_common::tracing;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

/// Configuration for rate limiting
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Permits granted per interval (bucket capacity)
    #[serde(default = "default_tokens")]
    pub tokens: u32,

    /// Length of the refill interval (milliseconds)
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            tokens: default_tokens(),
            interval_ms: default_interval_ms(),
        }
    }
}

const fn default_tokens() -> u32 {
    5
}

const fn default_interval_ms() -> u64 {
    1000
}

#[derive(Debug)]
struct TokenBucket {
    /// Signed so that a post-stall take can run into debt
    tokens: i64,
    capacity: u32,
    interval: Duration,
    last_refill: Instant,
}

impl TokenBucket {
    fn new(capacity: u32, interval: Duration) -> Self {
        Self {
            tokens: i64::from(capacity),
            capacity,
            interval,
            last_refill: Instant::now(),
        }
    }

    /// Reset to full capacity if a whole interval has passed
    fn refill(&mut self) {
        let now = Instant::now();
        if now.duration_since(self.last_refill) >= self.interval {
            self.tokens = i64::from(self.capacity);
            self.last_refill = now;
        }
    }

    fn try_consume(&mut self) -> bool {
        self.refill();

        if self.tokens > 0 {
            self.tokens -= 1;
            true
        } else {
            false
        }
    }

    /// Permits a `try_consume` would see now, without refilling
    fn available(&self) -> i64 {
        if Instant::now().duration_since(self.last_refill) >= self.interval {
            i64::from(self.capacity)
        } else {
            self.tokens
        }
    }

    fn time_until_refill(&self) -> Duration {
        (self.last_refill + self.interval).saturating_duration_since(Instant::now())
    }
}

/// Shared admission control for delivery attempts
#[derive(Debug)]
pub struct RateLimiter {
    bucket: parking_lot::Mutex<TokenBucket>,
    stalls: AtomicU64,
}

impl RateLimiter {
    /// Create a new rate limiter with a full bucket
    #[must_use]
    pub fn new(config: &RateLimitConfig) -> Self {
        Self {
            bucket: parking_lot::Mutex::new(TokenBucket::new(
                config.tokens,
                Duration::from_millis(config.interval_ms),
            )),
            stalls: AtomicU64::new(0),
        }
    }

    /// Wait until a permit is available, then take it.
    ///
    /// Never fails. The lock is released while sleeping.
    pub async fn wait(&self) {
        let wait_time = {
            let mut bucket = self.bucket.lock();
            if bucket.try_consume() {
                return;
            }
            bucket.time_until_refill()
        };

        self.stalls.fetch_add(1, Ordering::Relaxed);
        tracing::warn!(
            wait_ms = wait_time.as_millis(),
            "Rate limit exceeded, waiting for next refill"
        );

        tokio::time::sleep(wait_time).await;

        let mut bucket = self.bucket.lock();
        bucket.refill();
        bucket.tokens -= 1;
    }

    /// Current stats (for monitoring/debugging)
    ///
    /// Read-only: the refill window only ever moves inside [`Self::wait`].
    pub fn stats(&self) -> RateLimitStats {
        let bucket = self.bucket.lock();

        RateLimitStats {
            available_tokens: bucket.available(),
            capacity: bucket.capacity,
            stalls: self.stalls.load(Ordering::Relaxed),
        }
    }
}

/// Statistics for the rate limiter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitStats {
    /// Currently available permits (negative while in post-stall debt)
    pub available_tokens: i64,
    /// Maximum capacity
    pub capacity: u32,
    /// Number of calls to `wait` that had to sleep
    pub stalls: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(tokens: u32, interval_ms: u64) -> RateLimiter {
        RateLimiter::new(&RateLimitConfig {
            tokens,
            interval_ms,
        })
    }

    #[test]
    fn test_rate_limit_config_defaults() {
        let config = RateLimitConfig::default();
        assert_eq!(config.tokens, 5);
        assert_eq!(config.interval_ms, 1000);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_consumes_without_stalling() {
        let limiter = limiter(3, 1000);
        let start = Instant::now();

        limiter.wait().await;
        limiter.wait().await;
        limiter.wait().await;

        assert_eq!(start.elapsed(), Duration::ZERO);
        let stats = limiter.stats();
        assert_eq!(stats.available_tokens, 0);
        assert_eq!(stats.stalls, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_stalls_until_refill() {
        let limiter = limiter(2, 1000);
        let start = Instant::now();

        limiter.wait().await;
        limiter.wait().await;
        tokio::time::advance(Duration::from_millis(400)).await;

        limiter.wait().await;

        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(1000), "{elapsed:?}");
        assert!(elapsed < Duration::from_millis(1100), "{elapsed:?}");

        // Hard reset to capacity, then one permit taken
        let stats = limiter.stats();
        assert_eq!(stats.available_tokens, 1);
        assert_eq!(stats.stalls, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_refill_is_a_hard_reset() {
        let limiter = limiter(4, 100);

        limiter.wait().await;
        assert_eq!(limiter.stats().available_tokens, 3);

        // Several intervals pass; the bucket never exceeds capacity
        tokio::time::advance(Duration::from_millis(500)).await;
        assert_eq!(limiter.stats().available_tokens, 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stats_do_not_move_refill_window() {
        async fn third_wait_stall(read_stats: bool) -> Duration {
            let limiter = limiter(2, 1000);
            limiter.wait().await;
            limiter.wait().await;

            tokio::time::advance(Duration::from_millis(1000)).await;
            if read_stats {
                assert_eq!(limiter.stats().available_tokens, 2);
            }
            tokio::time::advance(Duration::from_millis(900)).await;

            limiter.wait().await;
            limiter.wait().await;
            let start = Instant::now();
            limiter.wait().await;
            start.elapsed()
        }

        let without_stats = third_wait_stall(false).await;
        let with_stats = third_wait_stall(true).await;

        assert_eq!(with_stats, without_stats);
        assert_eq!(without_stats, Duration::from_millis(1000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_post_stall_take_is_unconditional() {
        let limiter = limiter(1, 1000);
        limiter.wait().await;

        // Both stall on the same refill; the second one finds the fresh
        // bucket already drained and takes a permit anyway
        tokio::join!(limiter.wait(), limiter.wait());

        let stats = limiter.stats();
        assert_eq!(stats.available_tokens, -1);
        assert_eq!(stats.stalls, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_interval_never_stalls() {
        let limiter = limiter(1, 0);
        for _ in 0..10 {
            limiter.wait().await;
        }
        assert_eq!(limiter.stats().stalls, 0);
    }
}
