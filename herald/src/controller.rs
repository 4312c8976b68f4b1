use std::sync::Arc;

use herald_common::{
    Message,
    audit::{self, AuditConfig},
    internal, logging, tracing,
};
use herald_delivery::{
    DeliveryProvider, DeliveryQueryService, DispatchConfig, DispatchEngine, SimulatedProvider,
    SimulatedProviderConfig, SubmissionStatus,
};
use serde::Deserialize;
use ulid::Ulid;

/// A message to submit at startup
#[derive(Debug, Clone, Deserialize)]
pub struct Submission {
    /// Idempotency key; a fresh ULID is used when absent
    #[serde(default)]
    pub id: Option<String>,
    pub message: Message,
}

/// Root of the herald configuration file
#[derive(Debug, Default, Deserialize)]
pub struct Herald {
    #[serde(default)]
    pub dispatch: DispatchConfig,
    /// Providers in priority order
    #[serde(alias = "provider", default)]
    pub providers: Vec<SimulatedProviderConfig>,
    #[serde(default)]
    pub audit: AuditConfig,
    #[serde(alias = "message", default)]
    pub messages: Vec<Submission>,
}

impl Herald {
    /// Build the engine and submit every configured message.
    ///
    /// Messages missing a required field are logged and skipped.
    ///
    /// # Errors
    ///
    /// Returns an error if a provider or the dispatch configuration is invalid,
    /// or if no providers are configured.
    pub fn start(self) -> anyhow::Result<Arc<DispatchEngine>> {
        let providers = self
            .providers
            .into_iter()
            .map(|config| {
                SimulatedProvider::new(config)
                    .map(|provider| Arc::new(provider) as Arc<dyn DeliveryProvider>)
            })
            .collect::<Result<Vec<_>, _>>()?;

        let engine = DispatchEngine::new(providers, &self.dispatch)?;
        internal!(
            "Dispatching through {}",
            engine.provider_names().collect::<Vec<_>>().join(", ")
        );

        for Submission { id, message } in self.messages {
            if let Err(err) = message.validate() {
                tracing::warn!(id = ?id, error = %err, "Skipping invalid message");
                continue;
            }

            let id = id.unwrap_or_else(|| Ulid::new().to_string());
            let receipt = engine.send(message, id);
            if receipt.status == SubmissionStatus::Duplicate {
                tracing::warn!(id = %receipt.id, "Message was already submitted");
            }
        }

        Ok(engine)
    }

    /// Run this controller, and everything it controls
    ///
    /// Waits until every submission has reached a terminal state, or until
    /// CTRL+C, then prints the status of every submission.
    ///
    /// # Errors
    ///
    /// This function will return an error if the configuration is invalid or
    /// the status report cannot be rendered.
    pub async fn run(self) -> anyhow::Result<()> {
        logging::init();
        audit::init(self.audit.clone());

        internal!("Controller running");

        let engine = self.start()?;

        tokio::select! {
            () = engine.wait_idle() => {
                internal!("All submissions processed");
            }
            r = tokio::signal::ctrl_c() => {
                r?;
                internal!(level = INFO, "CTRL+C entered, reporting current status");
            }
        }

        println!("{}", report(&*engine)?);

        internal!("Shutting down...");

        Ok(())
    }
}

/// Render every known status, oldest first, as RON
///
/// # Errors
///
/// Returns an error if serialisation fails.
pub fn report(service: &dyn DeliveryQueryService) -> anyhow::Result<String> {
    let statuses = service.list_statuses(None);
    Ok(ron::ser::to_string_pretty(
        &statuses,
        ron::ser::PrettyConfig::default(),
    )?)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use herald_delivery::DeliveryState;
    use pretty_assertions::assert_eq;

    use super::*;

    const CONFIG: &str = r#"(
        dispatch: (
            retry: (attempts: 2, initial_delay_ms: 10),
        ),
        providers: [
            (name: "primary", failure_rate: 1.0, min_latency_ms: 0, max_latency_ms: 0),
            (name: "fallback", failure_rate: 0.0, min_latency_ms: 5, max_latency_ms: 10),
        ],
        audit: (redact_recipients: true),
        messages: [
            (id: Some("welcome"), message: (to: "a@example.com", from: "b@example.com", subject: "Hi", body: "Hello")),
            (id: Some("welcome"), message: (to: "a@example.com", from: "b@example.com", subject: "Hi", body: "Again")),
            (message: (to: "c@example.com", from: "b@example.com", subject: "Hi", body: "Hello")),
            (id: Some("blank"), message: (to: "", from: "b@example.com", subject: "Hi", body: "Hello")),
        ],
    )"#;

    #[test]
    fn test_parse_config() {
        let herald: Herald = ron::from_str(CONFIG).unwrap();

        assert_eq!(herald.dispatch.retry.attempts, 2);
        assert_eq!(herald.dispatch.rate_limit.tokens, 5);
        assert_eq!(herald.providers.len(), 2);
        assert_eq!(herald.providers[0].name, "primary");
        assert!(herald.audit.enabled);
        assert!(herald.audit.redact_recipients);
        assert_eq!(herald.messages.len(), 4);
        assert_eq!(herald.messages[2].id, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_submits_valid_messages() {
        let herald: Herald = ron::from_str(CONFIG).unwrap();
        let engine = herald.start().unwrap();
        engine.wait_idle().await;

        let statuses = engine.list_statuses(None);
        assert_eq!(statuses.len(), 2);
        assert!(engine.get_status("blank").is_none());

        for status in &statuses {
            assert_eq!(status.state, DeliveryState::Sent);
            assert_eq!(status.final_provider.as_deref(), Some("fallback"));
            assert_eq!(status.attempts, 2);
        }

        let welcome = engine.get_status("welcome").unwrap();
        assert!(welcome.history.len() > 1);

        let rendered = report(&*engine).unwrap();
        assert!(rendered.contains("welcome"));
        assert!(rendered.contains("SENT"));
    }

    #[test]
    fn test_start_requires_providers() {
        let err = Herald::default().start().unwrap_err();
        assert_eq!(
            err.to_string(),
            "Dispatch engine requires at least one provider"
        );
    }

    #[test]
    fn test_start_rejects_bad_provider() {
        let herald: Herald = ron::from_str(
            r#"(providers: [(name: "broken", failure_rate: 1.5)])"#,
        )
        .unwrap();
        assert!(herald.start().is_err());
    }
}
