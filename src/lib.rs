//! # LogRelay - Resilient Log Record Transport
//!
//! LogRelay ships structured log records from producing processes to a central
//! collector over persistent TCP connections.
//!
//! ## Features
//!
//! - **Length-prefixed framing**: 4-byte big-endian length followed by a JSON record
//! - **Resilient client**: bounded reconnect cycle with a fixed interval, one retried send
//! - **Concurrent collector**: one task per connection, failures isolated per connection
//! - **Pluggable sinks**: tracing, per-logger JSON files, in-memory capture
//!
//! ## Quick Start
//!
//! ### Server
//! ```no_run
//! use logrelay::config::ServerConfig;
//! use logrelay::server::{ConfiguredSink, LogServer};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServerConfig::default();
//!     let sink = ConfiguredSink::from_config(&config).await?;
//!     let server = LogServer::bind(config, sink).await?;
//!     server.run().await?;
//!     Ok(())
//! }
//! ```
//!
//! ### Client
//! ```no_run
//! use logrelay::client::LogClient;
//! use std::collections::BTreeMap;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = LogClient::connect("127.0.0.1", 3200, "my-service").await?;
//!
//!     let mut fields = BTreeMap::new();
//!     fields.insert("component".to_string(), "auth".into());
//!
//!     client.info_with_fields("Authentication successful", fields).await?;
//!     Ok(())
//! }
//! ```

#![deny(missing_docs)]
#![warn(clippy::all)]

pub mod client;
pub mod config;
pub mod protocol;
pub mod server;
pub mod types;

/// Common error types used throughout LogRelay
pub mod error {
    use std::io;
    use thiserror::Error;

    /// LogRelay error types
    #[derive(Debug, Error)]
    pub enum RelayError {
        /// I/O operation failed
        #[error("I/O error: {0}")]
        Io(#[from] io::Error),
        /// Every reconnect attempt in a cycle failed
        #[error("connection to {addr} unavailable after {attempts} attempts")]
        ConnectionUnavailable {
            /// Target address as `host:port`
            addr: String,
            /// Number of connect attempts made
            attempts: u32,
        },
        /// The single retried write after a reconnect failed too
        #[error("send failed after reconnect: {0}")]
        RetryFailed(#[source] io::Error),
        /// The stream ended in the middle of a frame
        #[error("truncated frame: expected {expected} bytes, received {received}")]
        TruncatedFrame {
            /// Bytes the frame needed (header included once known)
            expected: usize,
            /// Bytes that actually arrived
            received: usize,
        },
        /// A frame declared or produced a payload over the configured limit
        #[error("frame of {len} bytes exceeds limit of {max} bytes")]
        FrameTooLarge {
            /// Payload length
            len: usize,
            /// Configured maximum
            max: usize,
        },
        /// Payload bytes did not deserialize into a record
        #[error("malformed payload: {0}")]
        MalformedPayload(#[from] serde_json::Error),
        /// Configuration error
        #[error("configuration error: {0}")]
        Config(String),
        /// A sink refused or failed to store a record
        #[error("sink error: {0}")]
        Sink(String),
    }

    impl RelayError {
        /// Whether this error means the transport gave up on delivering a record.
        ///
        /// These are the only errors a [`LogClient`](crate::client::LogClient)
        /// hands back to the producing application.
        pub fn is_delivery_failure(&self) -> bool {
            matches!(
                self,
                RelayError::ConnectionUnavailable { .. } | RelayError::RetryFailed(_)
            )
        }

        /// Whether this error is a connection-level failure worth a reconnect.
        pub fn is_connection_error(&self) -> bool {
            match self {
                RelayError::Io(err) => is_connection_kind(err.kind()),
                _ => false,
            }
        }
    }

    /// I/O error kinds that mean the connection itself is gone or unusable
    pub(crate) fn is_connection_kind(kind: io::ErrorKind) -> bool {
        matches!(
            kind,
            io::ErrorKind::ConnectionReset
                | io::ErrorKind::ConnectionAborted
                | io::ErrorKind::ConnectionRefused
                | io::ErrorKind::BrokenPipe
                | io::ErrorKind::NotConnected
                | io::ErrorKind::TimedOut
                | io::ErrorKind::UnexpectedEof
                | io::ErrorKind::WriteZero
        )
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn test_connection_errors_are_classified_by_kind() {
            for kind in [
                io::ErrorKind::ConnectionReset,
                io::ErrorKind::BrokenPipe,
                io::ErrorKind::NotConnected,
                io::ErrorKind::TimedOut,
            ] {
                assert!(RelayError::Io(io::Error::from(kind)).is_connection_error());
            }
            for kind in [
                io::ErrorKind::PermissionDenied,
                io::ErrorKind::InvalidInput,
                io::ErrorKind::OutOfMemory,
            ] {
                assert!(!RelayError::Io(io::Error::from(kind)).is_connection_error());
            }
            assert!(!RelayError::Config("bad".to_string()).is_connection_error());
            assert!(!RelayError::RetryFailed(io::ErrorKind::BrokenPipe.into()).is_connection_error());
        }
    }

    /// Result type alias for LogRelay operations
    pub type Result<T> = std::result::Result<T, RelayError>;
}

pub use error::{RelayError, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::client::{LogClient, ReconnectingTransport, RetryPolicy, Transport};
    pub use crate::config::{ClientConfig, ServerConfig};
    pub use crate::protocol::RecordCodec;
    pub use crate::server::{LogServer, MemorySink, RecordSink, ShutdownHandle};
    pub use crate::types::{LogLevel, LogRecord, RecordFields};
    pub use crate::{RelayError, Result};
}
