//! Typed error handling for dispatch operations.
//!
//! Delivery failures never escape the processing loop; they end up in a
//! message's status history. The types here cover:
//! - Engine construction failures (fatal, returned from `DispatchEngine::new`)
//! - Configuration validation
//! - Provider failures and circuit breaker rejections (recorded per attempt)

use thiserror::Error;

/// Errors that prevent a dispatch engine from being built.
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// The engine needs at least one provider to deliver through.
    #[error("Dispatch engine requires at least one provider")]
    NoProviders,

    /// Two providers share a name, so their circuit breakers would collide.
    #[error("Duplicate provider name: {0}")]
    DuplicateProvider(String),

    /// Invalid configuration.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Configuration values outside their permitted range.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// A value that must be at least `min` was smaller.
    #[error("{field} must be at least {min}, got {value}")]
    TooSmall {
        field: &'static str,
        min: u64,
        value: u64,
    },

    /// A probability outside `0.0..=1.0`.
    #[error("{field} must be between 0.0 and 1.0, got {value}")]
    OutOfRange { field: &'static str, value: String },
}

/// A provider's report that it could not deliver a message.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{reason}")]
pub struct ProviderError {
    reason: String,
}

impl ProviderError {
    #[must_use]
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    #[must_use]
    pub fn reason(&self) -> &str {
        &self.reason
    }
}

/// Outcome of a call that a circuit breaker refused or that failed underneath it.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CircuitBreakerError<E> {
    /// The circuit is open; the wrapped action was never invoked.
    #[error("Circuit is OPEN for {provider}. Call rejected.")]
    Open { provider: String },

    /// The wrapped action failed; its error is passed through untouched.
    #[error(transparent)]
    Inner(E),
}

impl<E> CircuitBreakerError<E> {
    /// Returns `true` if the breaker rejected the call without running it.
    #[must_use]
    pub const fn is_open(&self) -> bool {
        matches!(self, Self::Open { .. })
    }
}
