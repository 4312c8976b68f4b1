//! Test support utilities for dispatch engine tests
#![allow(dead_code)]

pub mod scripted_provider;

pub use scripted_provider::ScriptedProvider;

use herald_common::Message;
use herald_delivery::{CircuitBreakerConfig, DispatchConfig, RateLimitConfig, RetryPolicy};

pub fn message(subject: &str) -> Message {
    Message::new("to@example.com", "from@example.com", subject, "Hello")
}

/// Configuration with generous rate limits so tests only see the delays they ask for
pub fn config(attempts: u32, initial_delay_ms: u64) -> DispatchConfig {
    DispatchConfig {
        retry: RetryPolicy {
            attempts,
            initial_delay_ms,
        },
        rate_limit: RateLimitConfig {
            tokens: 1000,
            interval_ms: 1000,
        },
        circuit_breaker: CircuitBreakerConfig {
            failure_threshold: 100,
            recovery_timeout_ms: 5000,
        },
    }
}
