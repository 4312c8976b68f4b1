//! Delivery provider with a scripted sequence of outcomes
//!
//! Each call pops the next outcome from the script; once it is exhausted the
//! provider keeps returning its default outcome. Every call is counted and
//! timestamped so tests can check invocation counts and backoff spacing.
#![allow(dead_code)] // Test utility module - not all methods used in every test

use std::{
    collections::VecDeque,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use herald_common::Message;
use herald_delivery::{DeliveryProvider, ProviderError};
use parking_lot::Mutex;
use tokio::time::Instant;

#[derive(Debug)]
pub struct ScriptedProvider {
    name: String,
    script: Mutex<VecDeque<bool>>,
    succeed_by_default: bool,
    latency: Duration,
    panic_subject: Option<String>,
    calls: AtomicUsize,
    call_times: Mutex<Vec<Instant>>,
    subjects: Mutex<Vec<String>>,
}

impl ScriptedProvider {
    fn with_default(name: &str, succeed_by_default: bool) -> Self {
        Self {
            name: name.to_string(),
            script: Mutex::new(VecDeque::new()),
            succeed_by_default,
            latency: Duration::ZERO,
            panic_subject: None,
            calls: AtomicUsize::new(0),
            call_times: Mutex::new(Vec::new()),
            subjects: Mutex::new(Vec::new()),
        }
    }

    /// A provider that accepts every message
    pub fn succeeding(name: &str) -> Self {
        Self::with_default(name, true)
    }

    /// A provider that rejects every message
    pub fn failing(name: &str) -> Self {
        Self::with_default(name, false)
    }

    /// Fail the next `count` calls before falling back to the default outcome
    #[must_use]
    pub fn fail_first(self, count: usize) -> Self {
        self.script.lock().extend(std::iter::repeat_n(false, count));
        self
    }

    /// Sleep this long inside every call
    #[must_use]
    pub const fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Panic instead of returning when asked to send a message with `subject`
    #[must_use]
    pub fn panic_on_subject(mut self, subject: &str) -> Self {
        self.panic_subject = Some(subject.to_string());
        self
    }

    pub fn build(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn call_times(&self) -> Vec<Instant> {
        self.call_times.lock().clone()
    }

    /// Subjects of every message this provider was asked to send, in order
    pub fn subjects(&self) -> Vec<String> {
        self.subjects.lock().clone()
    }
}

#[async_trait]
impl DeliveryProvider for ScriptedProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn send(&self, message: &Message) -> Result<(), ProviderError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.call_times.lock().push(Instant::now());
        self.subjects.lock().push(message.subject.clone());

        let succeed = self
            .script
            .lock()
            .pop_front()
            .unwrap_or(self.succeed_by_default);

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        if self.panic_subject.as_deref() == Some(message.subject.as_str()) {
            panic!("{} cannot handle {:?}", self.name, message.subject);
        }

        if succeed {
            Ok(())
        } else {
            Err(ProviderError::new(format!(
                "{} scripted failure #{call}",
                self.name
            )))
        }
    }
}
