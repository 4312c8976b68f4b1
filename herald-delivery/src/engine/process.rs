//! The single-consumer processing loop

use std::{panic::AssertUnwindSafe, sync::Arc};

use futures_util::FutureExt;
use herald_common::{audit, internal, tracing};

use super::{DispatchEngine, delivery::panic_reason};
use crate::status::DeliveryState;

const ABORTED_NOTE: &str = "Delivery aborted by an internal error.";

impl DispatchEngine {
    /// Drain the queue one message at a time.
    ///
    /// The caller must have claimed the running flag. After releasing it the
    /// loop checks the queue once more: a message enqueued while the flag was
    /// still held saw a running loop and did not start one, so this loop
    /// reclaims the flag and carries on rather than leave it stranded.
    ///
    /// A panic while delivering one message fails that message only; the loop
    /// still drains the rest, releases the flag and wakes idle waiters.
    pub(super) async fn process_queue(self: Arc<Self>) {
        let mut processed = 0_usize;

        loop {
            while let Some(item) = self.queue.dequeue() {
                let id = item.id.clone();

                if let Err(panic) = AssertUnwindSafe(self.deliver(item)).catch_unwind().await {
                    self.abort_delivery(&id, panic_reason(&*panic));
                }
                processed += 1;
            }

            self.queue.stop_processing();

            if self.queue.is_empty() || !self.queue.try_start_processing() {
                break;
            }
            internal!("Reclaimed processing loop for late submissions");
        }

        tracing::info!(processed, "Queue drained, processing loop stopped");
        self.idle.notify_waiters();
    }

    fn abort_delivery(&self, id: &str, reason: &str) {
        tracing::error!(id = %id, reason, "Delivery panicked");

        let Some(status) = self.tracker.get(id) else {
            return;
        };
        if matches!(status.state, DeliveryState::Sent | DeliveryState::Failed) {
            return;
        }

        self.tracker.annotate(id, DeliveryState::Failed, ABORTED_NOTE);
        self.metrics.record_failed();
        audit::log_delivery_failure(id, ABORTED_NOTE, status.attempts);
    }
}
