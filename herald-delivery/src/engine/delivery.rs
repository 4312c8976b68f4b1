//! Per-message retry and fallback

use std::{any::Any, panic::AssertUnwindSafe};

use futures_util::FutureExt;
use herald_common::{Message, audit, outgoing, tracing};
use tokio::time::Instant;

use super::DispatchEngine;
use crate::{
    error::ProviderError, metrics::AttemptOutcome, provider::DeliveryProvider, queue::QueueItem,
    status::DeliveryState,
};

const STARTED_NOTE: &str = "Started processing.";
const EXHAUSTED_NOTE: &str = "All providers failed to send the email.";

impl DispatchEngine {
    /// Deliver one message, walking the providers in priority order.
    ///
    /// Every failed attempt, including a circuit breaker rejection, is
    /// recorded through [`StatusTracker::update`] and so counts towards
    /// `attempts`. The start and exhaustion notes do not.
    ///
    /// [`StatusTracker::update`]: crate::StatusTracker::update
    pub(super) async fn deliver(&self, item: QueueItem) {
        let QueueItem { id, message } = item;
        let started = Instant::now();
        let mut failed_attempts = 0_u32;

        self.tracker.annotate(&id, DeliveryState::Processing, STARTED_NOTE);

        for route in &self.routes {
            let name = route.provider.name();

            for attempt in 1..=self.retry.attempts {
                self.limiter.wait().await;

                audit::log_delivery_attempt(&id, name, attempt);
                outgoing!("Attempt {attempt} for {id} via {name}");

                match route
                    .breaker
                    .execute(|| call_provider(route.provider.as_ref(), &message))
                    .await
                {
                    Ok(()) => {
                        let elapsed = started.elapsed();
                        self.tracker.update(
                            &id,
                            DeliveryState::Sent,
                            format!("Successfully sent with {name}."),
                            Some(name),
                        );
                        self.metrics.record_attempt(name, AttemptOutcome::Success);
                        self.metrics
                            .record_sent(name, elapsed.as_secs_f64(), failed_attempts);
                        audit::log_delivery_success(
                            &id,
                            name,
                            failed_attempts,
                            elapsed.as_millis(),
                        );
                        tracing::info!(id = %id, provider = %name, "Message sent");
                        return;
                    }
                    Err(error) => {
                        failed_attempts += 1;
                        self.metrics.record_attempt(
                            name,
                            if error.is_open() {
                                AttemptOutcome::CircuitOpen
                            } else {
                                AttemptOutcome::Failure
                            },
                        );
                        tracing::warn!(
                            id = %id,
                            provider = %name,
                            attempt,
                            error = %error,
                            "Delivery attempt failed"
                        );
                        self.tracker.update(
                            &id,
                            DeliveryState::Processing,
                            format!("Attempt {attempt} with {name} failed: {error}"),
                            None,
                        );

                        if let Some(delay) = self.retry.delay_after(attempt) {
                            tokio::time::sleep(delay).await;
                        }
                    }
                }
            }

            tracing::warn!(
                id = %id,
                provider = %name,
                attempts = self.retry.attempts,
                "Provider exhausted its retries, falling back"
            );
        }

        self.tracker.annotate(&id, DeliveryState::Failed, EXHAUSTED_NOTE);
        self.metrics.record_failed();
        audit::log_delivery_failure(&id, EXHAUSTED_NOTE, failed_attempts);
        tracing::error!(id = %id, failed_attempts, "All providers failed");
    }
}

/// Invoke `provider`, reporting a panic as an ordinary delivery failure
async fn call_provider(
    provider: &dyn DeliveryProvider,
    message: &Message,
) -> Result<(), ProviderError> {
    AssertUnwindSafe(provider.send(message))
        .catch_unwind()
        .await
        .unwrap_or_else(|panic| {
            Err(ProviderError::new(format!(
                "Provider panicked: {}",
                panic_reason(&*panic)
            )))
        })
}

/// Message carried by a panic payload, when it is a string
pub(super) fn panic_reason(panic: &(dyn Any + Send)) -> &str {
    panic
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| panic.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}
