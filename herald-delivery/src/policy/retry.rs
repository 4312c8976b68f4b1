//! Retry policy for delivery attempts.
//!
//! Retries are scoped per provider: every provider in the fallback chain gets
//! the full budget before the engine moves on to the next one.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Retry policy configuration for delivery attempts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Attempts made with each provider before falling back to the next.
    ///
    /// Default: 3 attempts
    #[serde(default = "defaults::attempts")]
    pub attempts: u32,

    /// Base delay for exponential backoff (in milliseconds).
    ///
    /// The delay after attempt `n` is `initial_delay_ms * 2^(n - 1)`, with no
    /// jitter and no cap.
    ///
    /// Default: 200 milliseconds
    #[serde(default = "defaults::initial_delay_ms")]
    pub initial_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: defaults::attempts(),
            initial_delay_ms: defaults::initial_delay_ms(),
        }
    }
}

impl RetryPolicy {
    /// Create a new retry policy with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if `attempt` (1-based) is the last one allowed for a provider.
    #[must_use]
    pub const fn is_final_attempt(&self, attempt: u32) -> bool {
        attempt >= self.attempts
    }

    /// Backoff before the attempt following `attempt` (1-based).
    ///
    /// Saturates instead of overflowing for absurdly long retry chains.
    #[must_use]
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let factor = 2_u64.saturating_pow(attempt.saturating_sub(1));
        Duration::from_millis(self.initial_delay_ms.saturating_mul(factor))
    }

    /// Delay to sleep after a failed `attempt`, or `None` after the final one.
    #[must_use]
    pub fn delay_after(&self, attempt: u32) -> Option<Duration> {
        (!self.is_final_attempt(attempt)).then(|| self.backoff_delay(attempt))
    }
}

mod defaults {
    pub const fn attempts() -> u32 {
        3
    }

    pub const fn initial_delay_ms() -> u64 {
        200
    }
}
