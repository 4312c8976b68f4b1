//! Delivery status tracking
//!
//! The tracker owns the one authoritative [`DeliveryStatus`] record for every
//! id ever submitted. Records are created once, mutated in place and never
//! removed, so the tracker doubles as the idempotency gate for submissions.

use core::fmt::{self, Display, Formatter};

use chrono::{DateTime, Utc};
use dashmap::{DashMap, mapref::entry::Entry};
use herald_common::tracing;
use serde::{Deserialize, Serialize};

const RECEIVED_NOTE: &str = "Message received and queued for processing.";

/// Lifecycle state of a submitted message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeliveryState {
    /// Accepted and waiting in the queue
    Pending,
    /// Picked up by the processing loop
    Processing,
    /// Accepted by a provider (terminal)
    Sent,
    /// Every provider exhausted its retries (terminal)
    Failed,
}

impl Display for DeliveryState {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> fmt::Result {
        fmt.write_str(match self {
            Self::Pending => "PENDING",
            Self::Processing => "PROCESSING",
            Self::Sent => "SENT",
            Self::Failed => "FAILED",
        })
    }
}

/// One line of a message's audit trail
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub timestamp: DateTime<Utc>,
    pub message: String,
}

/// Everything known about one submission
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryStatus {
    /// Caller-supplied idempotency key
    pub id: String,
    pub state: DeliveryState,
    /// Number of recorded transitions other than PENDING and SENT
    pub attempts: u32,
    pub last_attempted_at: Option<DateTime<Utc>>,
    /// Provider that accepted the message, once SENT
    pub final_provider: Option<String>,
    /// Append-only, oldest first
    pub history: Vec<HistoryEntry>,
}

impl DeliveryStatus {
    fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            state: DeliveryState::Pending,
            attempts: 0,
            last_attempted_at: None,
            final_provider: None,
            history: vec![HistoryEntry {
                timestamp: Utc::now(),
                message: RECEIVED_NOTE.to_string(),
            }],
        }
    }

    /// When the record was created
    #[must_use]
    pub fn received_at(&self) -> Option<DateTime<Utc>> {
        self.history.first().map(|entry| entry.timestamp)
    }

    fn record(&mut self, state: DeliveryState, message: String) {
        let now = Utc::now();
        self.state = state;
        self.last_attempted_at = Some(now);
        self.history.push(HistoryEntry {
            timestamp: now,
            message,
        });
    }
}

/// In-memory store of delivery statuses, keyed by submission id
#[derive(Debug, Default)]
pub struct StatusTracker {
    statuses: DashMap<String, DeliveryStatus>,
}

impl StatusTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a status record exists for `id`
    pub fn is_known_id(&self, id: &str) -> bool {
        self.statuses.contains_key(id)
    }

    /// Create the PENDING record for `id`, returning `false` if one already existed.
    ///
    /// Check and insert happen under one shard lock, so concurrent submissions
    /// of the same id cannot both win.
    pub fn claim(&self, id: &str) -> bool {
        match self.statuses.entry(id.to_string()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(entry) => {
                entry.insert(DeliveryStatus::new(id));
                true
            }
        }
    }

    /// Create the PENDING record for `id`.
    ///
    /// An existing record is returned untouched; re-initialising never resets
    /// state or history.
    pub fn initialize(&self, id: &str) -> DeliveryStatus {
        match self.statuses.entry(id.to_string()) {
            Entry::Occupied(entry) => {
                tracing::warn!(id = %id, "Attempted to re-initialize status for existing id");
                entry.get().clone()
            }
            Entry::Vacant(entry) => entry.insert(DeliveryStatus::new(id)).clone(),
        }
    }

    /// Record a transition for `id`.
    ///
    /// `final_provider` is only stored for [`DeliveryState::Sent`]. Every
    /// state except PENDING and SENT increments `attempts`. Unknown ids are
    /// logged and ignored.
    pub fn update(
        &self,
        id: &str,
        state: DeliveryState,
        message: impl Into<String>,
        final_provider: Option<&str>,
    ) {
        let Some(mut status) = self.statuses.get_mut(id) else {
            tracing::error!(id = %id, "Attempted to update status for non-existent id");
            return;
        };

        status.record(state, message.into());

        if state == DeliveryState::Sent
            && let Some(provider) = final_provider
        {
            status.final_provider = Some(provider.to_string());
        }

        if !matches!(state, DeliveryState::Pending | DeliveryState::Sent) {
            status.attempts += 1;
        }
    }

    /// Record a transition for `id` that does not count as an attempt.
    ///
    /// Sets the state, stamps `last_attempted_at` and appends to the history,
    /// leaving `attempts` and `final_provider` alone. Unknown ids are logged
    /// and ignored.
    pub fn annotate(&self, id: &str, state: DeliveryState, message: impl Into<String>) {
        let Some(mut status) = self.statuses.get_mut(id) else {
            tracing::error!(id = %id, "Attempted to annotate status for non-existent id");
            return;
        };

        status.record(state, message.into());
    }

    /// Snapshot of the record for `id`
    pub fn get(&self, id: &str) -> Option<DeliveryStatus> {
        self.statuses.get(id).map(|entry| entry.value().clone())
    }

    pub fn len(&self) -> usize {
        self.statuses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statuses.is_empty()
    }

    /// Snapshot of all records, oldest first, optionally filtered by state
    pub fn list(&self, state: Option<DeliveryState>) -> Vec<DeliveryStatus> {
        let mut statuses: Vec<_> = self
            .statuses
            .iter()
            .filter(|entry| state.is_none_or(|state| entry.value().state == state))
            .map(|entry| entry.value().clone())
            .collect();

        statuses.sort_by(|a, b| {
            a.received_at()
                .cmp(&b.received_at())
                .then_with(|| a.id.cmp(&b.id))
        });

        statuses
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_initialize_creates_pending_record() {
        let tracker = StatusTracker::new();
        assert!(!tracker.is_known_id("id-1"));

        let status = tracker.initialize("id-1");

        assert!(tracker.is_known_id("id-1"));
        assert_eq!(status.state, DeliveryState::Pending);
        assert_eq!(status.attempts, 0);
        assert_eq!(status.last_attempted_at, None);
        assert_eq!(status.final_provider, None);
        assert_eq!(status.history.len(), 1);
        assert_eq!(status.history[0].message, RECEIVED_NOTE);
    }

    #[test]
    fn test_reinitialize_returns_existing_record() {
        let tracker = StatusTracker::new();
        tracker.initialize("id-1");
        tracker.update("id-1", DeliveryState::Processing, "Started", None);

        let status = tracker.initialize("id-1");

        assert_eq!(status.state, DeliveryState::Processing);
        assert_eq!(status.history.len(), 2);
        assert_eq!(tracker.len(), 1);
    }

    #[test]
    fn test_claim_only_succeeds_once() {
        let tracker = StatusTracker::new();
        assert!(tracker.claim("id-1"));
        assert!(!tracker.claim("id-1"));
        assert_eq!(tracker.get("id-1").unwrap().state, DeliveryState::Pending);
    }

    #[test]
    fn test_update_counts_attempts() {
        let tracker = StatusTracker::new();
        tracker.initialize("id-1");

        tracker.update("id-1", DeliveryState::Processing, "Attempt 1 failed", None);
        tracker.update("id-1", DeliveryState::Processing, "Attempt 2 failed", None);
        tracker.update("id-1", DeliveryState::Pending, "Requeued", None);
        tracker.update("id-1", DeliveryState::Failed, "Gave up", None);

        let status = tracker.get("id-1").unwrap();
        assert_eq!(status.attempts, 3);
        assert_eq!(status.state, DeliveryState::Failed);
        assert!(status.last_attempted_at.is_some());

        let notes: Vec<_> = status.history.iter().map(|h| h.message.as_str()).collect();
        assert_eq!(
            notes,
            vec![
                RECEIVED_NOTE,
                "Attempt 1 failed",
                "Attempt 2 failed",
                "Requeued",
                "Gave up"
            ]
        );
    }

    #[test]
    fn test_sent_records_provider_without_counting() {
        let tracker = StatusTracker::new();
        tracker.initialize("id-1");

        tracker.update("id-1", DeliveryState::Processing, "Attempt failed", Some("ignored"));
        assert_eq!(tracker.get("id-1").unwrap().final_provider, None);

        tracker.update("id-1", DeliveryState::Sent, "Sent", Some("fallback"));

        let status = tracker.get("id-1").unwrap();
        assert_eq!(status.state, DeliveryState::Sent);
        assert_eq!(status.attempts, 1);
        assert_eq!(status.final_provider.as_deref(), Some("fallback"));
    }

    #[test]
    fn test_annotate_does_not_count() {
        let tracker = StatusTracker::new();
        tracker.initialize("id-1");

        tracker.annotate("id-1", DeliveryState::Processing, "Started processing");

        let status = tracker.get("id-1").unwrap();
        assert_eq!(status.state, DeliveryState::Processing);
        assert_eq!(status.attempts, 0);
        assert!(status.last_attempted_at.is_some());
        assert_eq!(status.history.len(), 2);
    }

    #[test]
    fn test_unknown_id_is_ignored() {
        let tracker = StatusTracker::new();

        tracker.update("missing", DeliveryState::Sent, "Sent", Some("primary"));
        tracker.annotate("missing", DeliveryState::Processing, "Started");

        assert!(tracker.get("missing").is_none());
        assert!(tracker.is_empty());
    }

    #[test]
    fn test_list_filters_by_state() {
        let tracker = StatusTracker::new();
        tracker.initialize("a");
        tracker.initialize("b");
        tracker.initialize("c");
        tracker.update("b", DeliveryState::Sent, "Sent", Some("primary"));

        let pending: Vec<_> = tracker
            .list(Some(DeliveryState::Pending))
            .into_iter()
            .map(|s| s.id)
            .collect();
        assert_eq!(pending.len(), 2);
        assert!(pending.contains(&"a".to_string()));
        assert!(pending.contains(&"c".to_string()));

        assert_eq!(tracker.list(None).len(), 3);
        assert_eq!(tracker.list(Some(DeliveryState::Failed)), vec![]);
    }

    #[test]
    fn test_state_display_matches_serialized_form() {
        for state in [
            DeliveryState::Pending,
            DeliveryState::Processing,
            DeliveryState::Sent,
            DeliveryState::Failed,
        ] {
            assert_eq!(ron::to_string(&state).unwrap(), state.to_string());
        }
    }
}
