//! Delivery provider abstraction
//!
//! A provider is an opaque capability: given a message it either delivers it
//! or reports why it could not. Transport details stay behind the trait.

mod simulated;

use async_trait::async_trait;
use herald_common::Message;

use crate::error::ProviderError;

pub use simulated::{SimulatedProvider, SimulatedProviderConfig};

/// A backend able to deliver messages
///
/// `name` must be unique among the providers handed to one engine; it keys the
/// provider's circuit breaker and is recorded as the final provider on success.
///
/// Calls are not subject to any timeout. A provider that never returns stalls
/// the whole processing loop.
#[async_trait]
pub trait DeliveryProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Attempt delivery of `message`
    ///
    /// # Errors
    ///
    /// Returns a [`ProviderError`] describing why delivery failed.
    async fn send(&self, message: &Message) -> Result<(), ProviderError>;
}
