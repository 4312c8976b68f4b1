//! Audit logging for message lifecycle events
//!
//! Every submission leaves a trail of structured events that can be shipped to
//! a compliance store independently of the regular application logs.
//!
//! ## Audit Events
//!
//! - `MessageReceived`: Message accepted and queued for delivery
//! - `DuplicateRejected`: Submission refused because its id was already known
//! - `DeliveryAttempt`: A single provider call for a message
//! - `DeliverySuccess`: A provider accepted the message
//! - `DeliveryFailure`: Every provider exhausted its retries
//!
//! ## PII Redaction
//!
//! Sender and recipient addresses can be redacted based on the [`AuditConfig`].

use std::sync::{Arc, OnceLock};

use serde::{Deserialize, Serialize};

/// Audit logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditConfig {
    /// Enable audit logging for message lifecycle events
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Redact sender email addresses from audit logs
    #[serde(default)]
    pub redact_sender: bool,

    /// Redact recipient email addresses from audit logs
    #[serde(default)]
    pub redact_recipients: bool,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            redact_sender: false,
            redact_recipients: false,
        }
    }
}

const fn default_true() -> bool {
    true
}

static AUDIT_CONFIG: OnceLock<Arc<AuditConfig>> = OnceLock::new();

/// Initialize audit logging with configuration
///
/// The first call wins; the configuration is fixed for the process lifetime.
pub fn init(config: AuditConfig) {
    AUDIT_CONFIG.get_or_init(|| Arc::new(config));
}

/// Get the current audit configuration
#[must_use]
pub fn config() -> Arc<AuditConfig> {
    AUDIT_CONFIG
        .get()
        .cloned()
        .unwrap_or_else(|| Arc::new(AuditConfig::default()))
}

/// Redact email address if redaction is enabled
#[must_use]
pub fn redact_email(email: &str, redact: bool) -> String {
    if redact {
        // Keep domain but redact local part
        if let Some((_, domain)) = email.split_once('@') {
            format!("[REDACTED]@{domain}")
        } else {
            "[REDACTED]".to_string()
        }
    } else {
        email.to_string()
    }
}

/// Log message received event
///
/// # Fields
/// - `message_id`: Caller-supplied idempotency key
/// - `sender`: Email sender (redacted if configured)
/// - `recipient`: Email recipient (redacted if configured)
/// - `size`: Body size in bytes
pub fn log_message_received(message_id: &str, sender: &str, recipient: &str, size: usize) {
    let config = config();
    if !config.enabled {
        return;
    }

    let sender = redact_email(sender, config.redact_sender);
    let recipient = redact_email(recipient, config.redact_recipients);

    tracing::event!(
        tracing::Level::INFO,
        event = "MessageReceived",
        message_id = %message_id,
        sender = %sender,
        recipient = %recipient,
        size = size,
        "Audit: Message received and queued"
    );
}

/// Log a submission rejected as a duplicate of an earlier one
pub fn log_duplicate_rejected(message_id: &str) {
    if !config().enabled {
        return;
    }

    tracing::event!(
        tracing::Level::INFO,
        event = "DuplicateRejected",
        message_id = %message_id,
        "Audit: Duplicate submission rejected"
    );
}

/// Log delivery attempt event
///
/// # Fields
/// - `message_id`: Message identifier
/// - `provider`: Provider the attempt is made through
/// - `delivery_attempt`: Attempt number for this provider (1-based)
pub fn log_delivery_attempt(message_id: &str, provider: &str, attempt: u32) {
    if !config().enabled {
        return;
    }

    tracing::event!(
        tracing::Level::INFO,
        event = "DeliveryAttempt",
        message_id = %message_id,
        provider = %provider,
        delivery_attempt = attempt,
        "Audit: Delivery attempt"
    );
}

/// Log delivery success event
///
/// # Fields
/// - `message_id`: Message identifier
/// - `provider`: Provider that accepted the message
/// - `failed_attempts`: Failed attempts recorded before the success
/// - `duration_ms`: Time from dequeue to success in milliseconds
pub fn log_delivery_success(
    message_id: &str,
    provider: &str,
    failed_attempts: u32,
    duration_ms: u128,
) {
    if !config().enabled {
        return;
    }

    tracing::event!(
        tracing::Level::INFO,
        event = "DeliverySuccess",
        message_id = %message_id,
        provider = %provider,
        failed_attempts = failed_attempts,
        duration_ms = duration_ms,
        "Audit: Delivery successful"
    );
}

/// Log delivery failure event
///
/// Logged once, when every provider has exhausted its retry budget.
pub fn log_delivery_failure(message_id: &str, error: &str, failed_attempts: u32) {
    if !config().enabled {
        return;
    }

    tracing::event!(
        tracing::Level::WARN,
        event = "DeliveryFailure",
        message_id = %message_id,
        error = %error,
        failed_attempts = failed_attempts,
        "Audit: Delivery failed"
    );
}
