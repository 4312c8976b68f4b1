//! Dispatch engine configuration
//!
//! Static for the lifetime of an engine. Deserialised from the `dispatch`
//! section of the herald configuration file.

use serde::{Deserialize, Serialize};

use crate::{
    circuit_breaker::CircuitBreakerConfig, error::ConfigError, policy::RetryPolicy,
    rate_limiter::RateLimitConfig,
};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Per-provider retry budget and backoff
    #[serde(default)]
    pub retry: RetryPolicy,

    /// Shared token bucket applied to every attempt
    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    /// Settings applied to every provider's circuit breaker
    #[serde(default)]
    pub circuit_breaker: CircuitBreakerConfig,
}

impl DispatchConfig {
    /// Check every value is within its permitted range.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        at_least("retry.attempts", self.retry.attempts, 1)?;
        at_least("rate_limit.tokens", self.rate_limit.tokens, 1)?;
        at_least(
            "circuit_breaker.failure_threshold",
            self.circuit_breaker.failure_threshold,
            1,
        )
    }
}

fn at_least(field: &'static str, value: u32, min: u32) -> Result<(), ConfigError> {
    if value < min {
        return Err(ConfigError::TooSmall {
            field,
            min: u64::from(min),
            value: u64::from(value),
        });
    }
    Ok(())
}
