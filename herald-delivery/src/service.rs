//! Read-only query interface over the dispatch engine
//!
//! Status lookups and queue inspection go through this trait so that callers
//! such as a transport layer or the binary's report do not depend on the
//! concrete engine.

use crate::{
    circuit_breaker::CircuitBreakerStats,
    engine::DispatchEngine,
    status::{DeliveryState, DeliveryStatus},
};

/// Service trait for querying delivery state
///
/// # Example
///
/// ```rust,ignore
/// fn pending(service: &dyn DeliveryQueryService) -> usize {
///     service.list_statuses(Some(DeliveryState::Pending)).len()
/// }
/// ```
pub trait DeliveryQueryService: Send + Sync {
    /// Number of messages waiting for the processing loop
    fn queue_len(&self) -> usize;

    /// Status recorded for `id`, or `None` if it was never submitted
    fn get_status(&self, id: &str) -> Option<DeliveryStatus>;

    /// All statuses, oldest submission first
    ///
    /// # Arguments
    ///
    /// * `state` - If provided, only statuses currently in this state are returned.
    fn list_statuses(&self, state: Option<DeliveryState>) -> Vec<DeliveryStatus>;

    /// Circuit breaker snapshot for the named provider
    fn circuit_stats(&self, provider: &str) -> Option<CircuitBreakerStats>;
}

impl DeliveryQueryService for DispatchEngine {
    fn queue_len(&self) -> usize {
        self.queue().len()
    }

    fn get_status(&self, id: &str) -> Option<DeliveryStatus> {
        self.status(id)
    }

    fn list_statuses(&self, state: Option<DeliveryState>) -> Vec<DeliveryStatus> {
        self.tracker().list(state)
    }

    fn circuit_stats(&self, provider: &str) -> Option<CircuitBreakerStats> {
        Self::circuit_stats(self, provider)
    }
}
