//! Dispatch engine orchestration
//!
//! The engine accepts submissions, owns the single processing loop and runs
//! the retry and fallback policy for each dequeued message.

mod delivery;
mod process;

use std::{collections::HashSet, sync::Arc};

use herald_common::{Message, audit, internal, tracing};
use tokio::sync::Notify;

use crate::{
    circuit_breaker::{CircuitBreaker, CircuitBreakerStats},
    config::DispatchConfig,
    error::DeliveryError,
    metrics::DeliveryMetrics,
    policy::RetryPolicy,
    provider::DeliveryProvider,
    queue::{PendingQueue, QueueItem},
    rate_limiter::{RateLimitStats, RateLimiter},
    status::{DeliveryStatus, StatusTracker},
};

/// Outcome of a submission
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionStatus {
    /// Accepted and waiting for the processing loop
    Queued,
    /// The id was seen before; nothing was enqueued
    Duplicate,
}

/// Returned by [`DispatchEngine::send`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendReceipt {
    pub id: String,
    pub status: SubmissionStatus,
}

/// A provider paired with the breaker that guards it
struct Route {
    provider: Arc<dyn DeliveryProvider>,
    breaker: CircuitBreaker,
}

/// Resilient dispatcher over an ordered list of providers
///
/// Providers are tried in the order given. Each one gets the full retry budget
/// before the engine falls back to the next.
pub struct DispatchEngine {
    routes: Vec<Route>,
    tracker: Arc<StatusTracker>,
    queue: Arc<PendingQueue>,
    limiter: Arc<RateLimiter>,
    retry: RetryPolicy,
    metrics: DeliveryMetrics,
    /// Woken whenever a processing loop exits
    idle: Notify,
}

impl core::fmt::Debug for DispatchEngine {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("DispatchEngine")
            .field(
                "providers",
                &self
                    .routes
                    .iter()
                    .map(|route| route.provider.name())
                    .collect::<Vec<_>>(),
            )
            .field("retry", &self.retry)
            .field("queue_len", &self.queue.len())
            .finish_non_exhaustive()
    }
}

impl DispatchEngine {
    /// Build an engine with a fresh tracker, queue and rate limiter.
    ///
    /// # Errors
    ///
    /// See [`Self::with_components`].
    pub fn new(
        providers: Vec<Arc<dyn DeliveryProvider>>,
        config: &DispatchConfig,
    ) -> Result<Arc<Self>, DeliveryError> {
        Self::with_components(
            providers,
            Arc::new(StatusTracker::new()),
            Arc::new(PendingQueue::new()),
            Arc::new(RateLimiter::new(&config.rate_limit)),
            config,
        )
    }

    /// Build an engine around existing components.
    ///
    /// One circuit breaker is created per provider, keyed by its name. The
    /// `rate_limit` section of `config` is not consulted; `limiter` is used
    /// as given.
    ///
    /// # Errors
    ///
    /// - [`DeliveryError::Config`] if `config` fails validation
    /// - [`DeliveryError::NoProviders`] if `providers` is empty
    /// - [`DeliveryError::DuplicateProvider`] if two providers share a name
    pub fn with_components(
        providers: Vec<Arc<dyn DeliveryProvider>>,
        tracker: Arc<StatusTracker>,
        queue: Arc<PendingQueue>,
        limiter: Arc<RateLimiter>,
        config: &DispatchConfig,
    ) -> Result<Arc<Self>, DeliveryError> {
        config.validate()?;

        if providers.is_empty() {
            return Err(DeliveryError::NoProviders);
        }

        let mut names = HashSet::with_capacity(providers.len());
        for provider in &providers {
            if !names.insert(provider.name()) {
                return Err(DeliveryError::DuplicateProvider(provider.name().to_string()));
            }
        }

        let routes = providers
            .into_iter()
            .map(|provider| Route {
                breaker: CircuitBreaker::new(provider.name(), &config.circuit_breaker),
                provider,
            })
            .collect();

        Ok(Arc::new(Self {
            routes,
            tracker,
            queue,
            limiter,
            retry: config.retry.clone(),
            metrics: DeliveryMetrics::new(),
            idle: Notify::new(),
        }))
    }

    /// Submit `message` under the idempotency key `id`.
    ///
    /// Returns as soon as the message is queued; delivery happens on a
    /// background task, started here if no processing loop is active. A
    /// repeated `id` is reported as [`SubmissionStatus::Duplicate`] and leaves
    /// the existing status untouched.
    ///
    /// # Panics
    ///
    /// Panics when called outside a Tokio runtime and no processing loop is
    /// already running, since starting one spawns a task.
    pub fn send(self: &Arc<Self>, message: Message, id: impl Into<String>) -> SendReceipt {
        let id = id.into();

        if !self.tracker.claim(&id) {
            tracing::warn!(id = %id, "Duplicate submission ignored");
            audit::log_duplicate_rejected(&id);
            self.metrics.record_duplicate();
            return SendReceipt {
                id,
                status: SubmissionStatus::Duplicate,
            };
        }

        audit::log_message_received(&id, &message.from, &message.to, message.body.len());
        self.queue.enqueue(QueueItem {
            id: id.clone(),
            message,
        });
        tracing::info!(id = %id, queued = self.queue.len(), "Message queued for delivery");

        if self.queue.try_start_processing() {
            internal!("Starting processing loop");
            let engine = Arc::clone(self);
            tokio::spawn(async move { engine.process_queue().await });
        }

        SendReceipt {
            id,
            status: SubmissionStatus::Queued,
        }
    }

    /// Snapshot of the status recorded for `id`
    pub fn status(&self, id: &str) -> Option<DeliveryStatus> {
        self.tracker.get(id)
    }

    /// Wait until the queue is drained and no processing loop is active.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.idle.notified();
            if !self.queue.is_running() && self.queue.is_empty() {
                return;
            }
            notified.await;
        }
    }

    /// Breaker snapshot for the named provider
    pub fn circuit_stats(&self, provider: &str) -> Option<CircuitBreakerStats> {
        self.routes
            .iter()
            .find(|route| route.breaker.provider() == provider)
            .map(|route| route.breaker.stats())
    }

    pub fn rate_limit_stats(&self) -> RateLimitStats {
        self.limiter.stats()
    }

    /// Provider names in priority order
    pub fn provider_names(&self) -> impl Iterator<Item = &str> {
        self.routes.iter().map(|route| route.provider.name())
    }

    pub fn tracker(&self) -> &Arc<StatusTracker> {
        &self.tracker
    }

    pub fn queue(&self) -> &Arc<PendingQueue> {
        &self.queue
    }
}
