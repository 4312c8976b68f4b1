//! Per-provider circuit breaker to stop hammering a failing provider
//!
//! Each configured provider gets its own breaker, created with the engine and
//! kept for the life of the process. The breaker sits across messages: a
//! provider that keeps failing for one message is short-circuited for the
//! next, turning slow failures into immediate rejections.
//!
//! # State Transitions
//!
//! ```text
//! ┌─────────┐  failure_threshold failures  ┌──────┐
//! │ Closed  │ ──────────────────────────>  │ Open │
//! └─────────┘                              └──────┘
//!     ^                                       │
//!     │                                       │ recovery timeout elapsed
//!     │                                       │ (checked when a call arrives)
//!     │  Success              ┌───────────────┐
//!     └───────────────────────│  Half-Open    │
//!                             └───────────────┘
//!                                     │
//!                                     │ Any failure
//!                                     v
//!                               ┌──────┐
//!                               │ Open │
//!                               └──────┘
//! ```
//!
//! A failure while half-open re-opens the circuit at once; the threshold is
//! only consulted while closed.

use std::{future::Future, time::Duration};

use herald_common::tracing;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::error::CircuitBreakerError;

/// Configuration for circuit breaker behavior
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CircuitBreakerConfig {
    /// Number of failures required to open the circuit
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,

    /// How long the circuit stays open before a trial call is let through (milliseconds)
    #[serde(default = "default_recovery_timeout_ms")]
    pub recovery_timeout_ms: u64,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: default_failure_threshold(),
            recovery_timeout_ms: default_recovery_timeout_ms(),
        }
    }
}

const fn default_failure_threshold() -> u32 {
    3
}

const fn default_recovery_timeout_ms() -> u64 {
    5000
}

/// Circuit breaker state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CircuitState {
    /// Normal operation - all calls allowed
    Closed,
    /// Circuit tripped - reject all calls immediately
    Open,
    /// Testing recovery - the next call decides
    HalfOpen,
}

#[derive(Debug)]
struct CircuitBreakerData {
    state: CircuitState,
    failure_count: u32,
    /// Set when the circuit trips; cleared on reset
    last_failure_at: Option<Instant>,
}

impl CircuitBreakerData {
    const fn new() -> Self {
        Self {
            state: CircuitState::Closed,
            failure_count: 0,
            last_failure_at: None,
        }
    }

    fn is_recovery_timeout_expired(&self, recovery_timeout: Duration) -> bool {
        self.last_failure_at
            .is_some_and(|at| Instant::now().duration_since(at) > recovery_timeout)
    }

    fn trip(&mut self, provider: &str) {
        self.state = CircuitState::Open;
        self.last_failure_at = Some(Instant::now());
        tracing::warn!(
            provider = %provider,
            failure_count = self.failure_count,
            "Circuit breaker OPENED - rejecting calls"
        );
    }

    fn reset(&mut self, provider: &str) {
        self.state = CircuitState::Closed;
        self.failure_count = 0;
        self.last_failure_at = None;
        tracing::info!(
            provider = %provider,
            "Circuit breaker CLOSED - normal operation resumed"
        );
    }
}

/// Failure-isolation state machine guarding one provider
#[derive(Debug)]
pub struct CircuitBreaker {
    provider: String,
    failure_threshold: u32,
    recovery_timeout: Duration,
    data: parking_lot::Mutex<CircuitBreakerData>,
}

impl CircuitBreaker {
    /// Create a closed circuit breaker for the named provider
    #[must_use]
    pub fn new(provider: impl Into<String>, config: &CircuitBreakerConfig) -> Self {
        Self {
            provider: provider.into(),
            failure_threshold: config.failure_threshold,
            recovery_timeout: Duration::from_millis(config.recovery_timeout_ms),
            data: parking_lot::Mutex::new(CircuitBreakerData::new()),
        }
    }

    /// Name of the provider this breaker guards
    #[must_use]
    pub fn provider(&self) -> &str {
        &self.provider
    }

    /// Run `action` if the circuit allows it.
    ///
    /// An open circuit whose recovery timeout has elapsed moves to half-open
    /// before the action is started. The lock is never held across the action.
    ///
    /// # Errors
    ///
    /// Returns [`CircuitBreakerError::Open`] without calling `action` while the
    /// circuit is open, or [`CircuitBreakerError::Inner`] carrying the action's
    /// own error unchanged.
    pub async fn execute<T, E, F, Fut>(&self, action: F) -> Result<T, CircuitBreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if !self.should_allow_call() {
            return Err(CircuitBreakerError::Open {
                provider: self.provider.clone(),
            });
        }

        match action().await {
            Ok(value) => {
                self.record_success();
                Ok(value)
            }
            Err(error) => {
                self.record_failure();
                Err(CircuitBreakerError::Inner(error))
            }
        }
    }

    fn should_allow_call(&self) -> bool {
        let mut data = self.data.lock();
        match data.state {
            CircuitState::Open => {
                if data.is_recovery_timeout_expired(self.recovery_timeout) {
                    data.state = CircuitState::HalfOpen;
                    tracing::info!(
                        provider = %self.provider,
                        "Circuit breaker entering HALF-OPEN state - testing recovery"
                    );
                    true
                } else {
                    false
                }
            }
            CircuitState::Closed | CircuitState::HalfOpen => true,
        }
    }

    fn record_success(&self) {
        let mut data = self.data.lock();
        if data.state == CircuitState::HalfOpen || data.failure_count > 0 {
            data.reset(&self.provider);
        }
    }

    fn record_failure(&self) {
        let mut data = self.data.lock();
        data.failure_count += 1;

        if data.state == CircuitState::HalfOpen || data.failure_count >= self.failure_threshold {
            data.trip(&self.provider);
        }
    }

    /// Get current circuit state
    pub fn state(&self) -> CircuitState {
        self.data.lock().state
    }

    /// Get statistics (for monitoring/debugging)
    pub fn stats(&self) -> CircuitBreakerStats {
        let data = self.data.lock();
        CircuitBreakerStats {
            state: data.state,
            failure_count: data.failure_count,
        }
    }
}

/// Circuit breaker statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CircuitBreakerStats {
    /// Current circuit state
    pub state: CircuitState,
    /// Failures counted since the last reset
    pub failure_count: u32,
}
