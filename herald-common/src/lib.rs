pub mod audit;
pub mod error;
pub mod logging;
pub mod message;

pub use error::MessageError;
pub use message::Message;
pub use tracing;
