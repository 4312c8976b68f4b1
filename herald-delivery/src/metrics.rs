//! Dispatch engine metrics
//!
//! Tracks outbound delivery including:
//! - Delivery attempts by provider and outcome
//! - Delivery durations by provider
//! - Messages sent, failed and rejected as duplicates
//! - Calls short-circuited by an open breaker
//!
//! Instruments come from the global OpenTelemetry meter provider. Until one is
//! installed they are no-ops.

use opentelemetry::{
    KeyValue,
    global,
    metrics::{Counter, Histogram},
};

/// Outcome label attached to `herald.delivery.attempts.total`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptOutcome {
    Success,
    Failure,
    CircuitOpen,
}

impl AttemptOutcome {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failure => "failure",
            Self::CircuitOpen => "circuit_open",
        }
    }
}

/// Delivery metrics collector
#[derive(Debug)]
pub struct DeliveryMetrics {
    /// Total number of provider calls by provider and outcome
    attempts_total: Counter<u64>,

    /// Time from dequeue to success, by provider
    duration_seconds: Histogram<f64>,

    messages_sent: Counter<u64>,
    messages_failed: Counter<u64>,
    duplicates_rejected: Counter<u64>,

    /// Failed attempts before a message was sent
    retry_count: Histogram<u64>,
}

impl Default for DeliveryMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl DeliveryMetrics {
    #[must_use]
    pub fn new() -> Self {
        let meter = global::meter("herald");

        Self {
            attempts_total: meter
                .u64_counter("herald.delivery.attempts.total")
                .with_description("Total number of delivery attempts by provider and outcome")
                .build(),
            duration_seconds: meter
                .f64_histogram("herald.delivery.duration.seconds")
                .with_description("Distribution of delivery durations by provider")
                .build(),
            messages_sent: meter
                .u64_counter("herald.delivery.messages.sent.total")
                .with_description("Total number of messages delivered successfully")
                .build(),
            messages_failed: meter
                .u64_counter("herald.delivery.messages.failed.total")
                .with_description("Total number of messages that exhausted every provider")
                .build(),
            duplicates_rejected: meter
                .u64_counter("herald.delivery.duplicates.total")
                .with_description("Total number of submissions rejected as duplicates")
                .build(),
            retry_count: meter
                .u64_histogram("herald.delivery.retry.count")
                .with_description("Distribution of failed attempts before success")
                .build(),
        }
    }

    /// Record a single provider call
    pub fn record_attempt(&self, provider: &str, outcome: AttemptOutcome) {
        self.attempts_total.add(
            1,
            &[
                KeyValue::new("provider", provider.to_string()),
                KeyValue::new("outcome", outcome.as_str()),
            ],
        );
    }

    /// Record a message accepted by `provider`
    pub fn record_sent(&self, provider: &str, duration_secs: f64, failed_attempts: u32) {
        let attributes = [KeyValue::new("provider", provider.to_string())];
        self.duration_seconds.record(duration_secs, &attributes);
        self.messages_sent.add(1, &attributes);
        self.retry_count.record(u64::from(failed_attempts), &[]);
    }

    /// Record a message that exhausted every provider
    pub fn record_failed(&self) {
        self.messages_failed.add(1, &[]);
    }

    pub fn record_duplicate(&self) {
        self.duplicates_rejected.add(1, &[]);
    }
}
