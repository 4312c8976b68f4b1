//! Error types for the herald-common crate.

use thiserror::Error;

/// Errors raised when a submitted message is not fit for delivery.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MessageError {
    /// A required message field is missing or blank.
    #[error("Missing required field: {0}")]
    MissingField(&'static str),
}
