//! The message payload handed to delivery providers.

use serde::{Deserialize, Serialize};

use crate::error::MessageError;

/// A message accepted for delivery.
///
/// Immutable once submitted: the dispatch engine clones it into its queue and
/// providers only ever see a shared reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Recipient address
    pub to: String,
    /// Sender address
    pub from: String,
    pub subject: String,
    pub body: String,
}

impl Message {
    #[must_use]
    pub fn new(
        to: impl Into<String>,
        from: impl Into<String>,
        subject: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            to: to.into(),
            from: from.into(),
            subject: subject.into(),
            body: body.into(),
        }
    }

    /// Check that every field a provider needs is present.
    ///
    /// # Errors
    ///
    /// Returns [`MessageError::MissingField`] naming the first blank field.
    pub fn validate(&self) -> Result<(), MessageError> {
        [
            ("to", &self.to),
            ("from", &self.from),
            ("subject", &self.subject),
            ("body", &self.body),
        ]
        .into_iter()
        .find(|(_, value)| value.trim().is_empty())
        .map_or(Ok(()), |(field, _)| Err(MessageError::MissingField(field)))
    }
}
