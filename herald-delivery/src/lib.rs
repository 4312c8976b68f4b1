//! Dispatch engine for outbound messages
//!
//! This crate provides:
//! - An idempotent submission path backed by an in-memory status tracker
//! - A single-consumer processing loop draining a FIFO pending queue
//! - Per-provider retries with exponential backoff and ordered fallback
//! - A per-provider circuit breaker and a shared token-bucket rate limiter

mod circuit_breaker;
mod config;
mod engine;
mod error;
mod metrics;
pub mod policy;
pub mod provider;
mod queue;
mod rate_limiter;
mod service;
mod status;

pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerStats, CircuitState};
pub use config::DispatchConfig;
pub use engine::{DispatchEngine, SendReceipt, SubmissionStatus};
pub use error::{CircuitBreakerError, ConfigError, DeliveryError, ProviderError};
pub use metrics::{AttemptOutcome, DeliveryMetrics};
pub use policy::RetryPolicy;
pub use provider::{DeliveryProvider, SimulatedProvider, SimulatedProviderConfig};
pub use queue::{PendingQueue, QueueItem};
pub use rate_limiter::{RateLimitConfig, RateLimitStats, RateLimiter};
pub use service::DeliveryQueryService;
pub use status::{DeliveryState, DeliveryStatus, HistoryEntry, StatusTracker};
