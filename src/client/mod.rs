//! LogRelay client implementation

pub mod logger;
pub mod transport;

pub use crate::types::LogLevel;
pub use logger::LogClient;
pub use transport::{ReconnectingTransport, RetryPolicy, Transport, TransportStats};
