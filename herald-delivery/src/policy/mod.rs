//! Policy abstractions for dispatch operations.
//!
//! - [`RetryPolicy`]: How many times each provider is tried and how long to
//!   back off between tries

pub mod retry;

pub use retry::RetryPolicy;
