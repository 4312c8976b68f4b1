use std::time::Duration;

use async_trait::async_trait;
use herald_common::{Message, outgoing};
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::DeliveryProvider;
use crate::error::{ConfigError, ProviderError};

/// Configuration for a [`SimulatedProvider`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulatedProviderConfig {
    pub name: String,

    /// Probability (0.0 to 1.0) that a send fails
    #[serde(default = "default_failure_rate")]
    pub failure_rate: f64,

    /// Lower bound of the simulated network latency (milliseconds)
    #[serde(default = "default_min_latency_ms")]
    pub min_latency_ms: u64,

    /// Upper bound of the simulated network latency (milliseconds)
    #[serde(default = "default_max_latency_ms")]
    pub max_latency_ms: u64,
}

const fn default_failure_rate() -> f64 {
    0.3
}

const fn default_min_latency_ms() -> u64 {
    100
}

const fn default_max_latency_ms() -> u64 {
    300
}

/// A provider that pretends to talk to a remote service.
///
/// Each send sleeps for a random latency and then fails with probability
/// `failure_rate`. Used by the `herald` binary to exercise retries, breakers
/// and fallback without a real transport.
#[derive(Debug, Clone)]
pub struct SimulatedProvider {
    name: String,
    failure_rate: f64,
    min_latency: Duration,
    max_latency: Duration,
}

impl SimulatedProvider {
    /// # Errors
    ///
    /// Returns [`ConfigError::OutOfRange`] if `failure_rate` is not a probability.
    pub fn new(config: SimulatedProviderConfig) -> Result<Self, ConfigError> {
        if !(0.0..=1.0).contains(&config.failure_rate) {
            return Err(ConfigError::OutOfRange {
                field: "failure_rate",
                value: config.failure_rate.to_string(),
            });
        }

        Ok(Self {
            name: config.name,
            failure_rate: config.failure_rate,
            min_latency: Duration::from_millis(config.min_latency_ms),
            max_latency: Duration::from_millis(config.max_latency_ms.max(config.min_latency_ms)),
        })
    }
}

#[async_trait]
impl DeliveryProvider for SimulatedProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn send(&self, message: &Message) -> Result<(), ProviderError> {
        outgoing!("[{}] Attempting to send message to {}", self.name, message.to);

        let (latency, fails) = {
            let mut rng = rand::rng();
            (
                rng.random_range(self.min_latency..=self.max_latency),
                rng.random_bool(self.failure_rate),
            )
        };

        tokio::time::sleep(latency).await;

        if fails {
            return Err(ProviderError::new(format!(
                "[{}] Failed to send message due to a simulated transient error",
                self.name
            )));
        }

        outgoing!("[{}] Successfully sent message to {}", self.name, message.to);
        Ok(())
    }
}
