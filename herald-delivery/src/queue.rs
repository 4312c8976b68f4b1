//! Pending queue management

use std::{
    collections::VecDeque,
    sync::atomic::{AtomicBool, Ordering},
};

use herald_common::Message;

/// A message waiting to be dispatched
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueItem {
    /// Idempotency key the message was submitted under
    pub id: String,
    pub message: Message,
}

/// Unbounded FIFO of accepted messages plus the "a processing loop is active" flag
#[derive(Debug, Default)]
pub struct PendingQueue {
    items: parking_lot::Mutex<VecDeque<QueueItem>>,
    running: AtomicBool,
}

impl PendingQueue {
    /// Create a new empty queue
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an item at the back of the queue
    pub fn enqueue(&self, item: QueueItem) {
        self.items.lock().push_back(item);
    }

    /// Remove and return the oldest item
    pub fn dequeue(&self) -> Option<QueueItem> {
        self.items.lock().pop_front()
    }

    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    /// Claim the processing flag.
    ///
    /// Returns `true` only for the caller that flipped it from idle to running;
    /// that caller owns the processing loop until it calls [`Self::stop_processing`].
    pub fn try_start_processing(&self) -> bool {
        self.running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Mark the processing loop as active
    pub fn start_processing(&self) {
        self.running.store(true, Ordering::Release);
    }

    /// Mark the processing loop as finished
    pub fn stop_processing(&self) {
        self.running.store(false, Ordering::Release);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }
}
