//! Reconnecting TCP transport for framed records

use crate::config::ClientConfig;
use crate::protocol::RecordCodec;
use crate::types::LogRecord;
use crate::{RelayError, Result};
use bytes::BytesMut;
use std::future::Future;
use std::io;
use std::mem::MaybeUninit;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::time::{sleep, timeout};
use tokio_util::codec::Encoder;
use tracing::{debug, info, warn};

/// Something that can deliver a record to the collector
pub trait Transport: Send {
    /// Deliver one record
    fn send(&mut self, record: &LogRecord) -> impl Future<Output = Result<()>> + Send;
}

/// Bounded reconnect cycle with a fixed pause between attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Connect attempts per cycle
    pub max_attempts: u32,
    /// Pause after each failed attempt except the last
    pub interval: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            interval: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    /// Build a policy from client configuration
    pub fn from_config(config: &ClientConfig) -> Self {
        Self {
            max_attempts: config.retry_count,
            interval: config.retry_interval(),
        }
    }
}

/// Counters describing what the transport has done so far
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransportStats {
    /// Frames fully written
    pub frames_sent: u64,
    /// Connect attempts, successful or not
    pub connect_attempts: u64,
    /// Connect attempts that failed
    pub failed_attempts: u64,
    /// Pauses taken between attempts
    pub retry_sleeps: u64,
    /// Reconnect cycles started, including the initial connect
    pub reconnect_cycles: u64,
}

/// TCP transport that reconnects on demand and retries a failed send once
#[derive(Debug)]
pub struct ReconnectingTransport {
    addr: String,
    policy: RetryPolicy,
    connect_timeout: Duration,
    codec: RecordCodec,
    connection: Option<TcpStream>,
    stats: TransportStats,
}

impl ReconnectingTransport {
    /// Create a disconnected transport targeting `addr` (`host:port`)
    pub fn new(addr: impl Into<String>, policy: RetryPolicy) -> Self {
        Self {
            addr: addr.into(),
            policy,
            connect_timeout: Duration::from_secs(5),
            codec: RecordCodec::new(),
            connection: None,
            stats: TransportStats::default(),
        }
    }

    /// Create a transport from client configuration
    pub fn from_config(config: &ClientConfig) -> Self {
        Self::new(config.address(), RetryPolicy::from_config(config))
            .with_connect_timeout(config.connect_timeout())
    }

    /// Bound each connect attempt
    pub fn with_connect_timeout(mut self, connect_timeout: Duration) -> Self {
        self.connect_timeout = connect_timeout;
        self
    }

    /// Use a codec with a different frame limit
    pub fn with_codec(mut self, codec: RecordCodec) -> Self {
        self.codec = codec;
        self
    }

    /// Collector address
    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// Retry policy in use
    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Whether a connection is currently held
    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    /// Counters so far
    pub fn stats(&self) -> TransportStats {
        self.stats
    }

    /// Run one reconnect cycle, replacing any current connection
    pub async fn reconnect(&mut self) -> Result<()> {
        self.connection = None;
        self.stats.reconnect_cycles += 1;

        let max_attempts = self.policy.max_attempts;
        for attempt in 1..=max_attempts {
            match self.connect_once().await {
                Ok(stream) => {
                    info!(addr = %self.addr, attempt, "connected to collector");
                    self.connection = Some(stream);
                    return Ok(());
                }
                Err(err) => {
                    self.stats.failed_attempts += 1;
                    warn!(
                        addr = %self.addr,
                        attempt,
                        max_attempts,
                        error = %err,
                        "connect attempt failed"
                    );
                    if attempt < max_attempts {
                        self.stats.retry_sleeps += 1;
                        sleep(self.policy.interval).await;
                    }
                }
            }
        }

        Err(RelayError::ConnectionUnavailable {
            addr: self.addr.clone(),
            attempts: max_attempts,
        })
    }

    /// Close the connection to the collector
    pub async fn close(&mut self) -> Result<()> {
        if let Some(mut stream) = self.connection.take() {
            stream.shutdown().await?;
        }
        Ok(())
    }

    async fn connect_once(&mut self) -> io::Result<TcpStream> {
        self.stats.connect_attempts += 1;
        let stream = timeout(self.connect_timeout, TcpStream::connect(&self.addr))
            .await
            .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "connect timed out"))??;
        stream.set_nodelay(true)?;
        Ok(stream)
    }

    async fn write_frame(&mut self, frame: &[u8]) -> io::Result<()> {
        if self.connection.as_ref().is_some_and(peer_closed) {
            debug!(addr = %self.addr, "collector closed the connection");
            self.connection = None;
            return Err(io::Error::new(
                io::ErrorKind::ConnectionReset,
                "connection closed by collector",
            ));
        }

        let stream = match self.connection.as_mut() {
            Some(stream) => stream,
            None => return Err(io::Error::new(io::ErrorKind::NotConnected, "not connected")),
        };
        stream.write_all(frame).await?;
        stream.flush().await
    }
}

/// The collector never writes back, so a readable end-of-stream means it hung up.
fn peer_closed(stream: &TcpStream) -> bool {
    let mut buf = [MaybeUninit::<u8>::uninit(); 1];
    match socket2::SockRef::from(stream).peek(&mut buf) {
        Ok(0) => true,
        Ok(_) => false,
        Err(err) if err.kind() == io::ErrorKind::WouldBlock => false,
        Err(_) => true,
    }
}

impl Transport for ReconnectingTransport {
    async fn send(&mut self, record: &LogRecord) -> Result<()> {
        let mut frame = BytesMut::new();
        self.codec.encode(record, &mut frame)?;

        if let Err(err) = self.write_frame(&frame).await {
            self.connection = None;
            let err = RelayError::Io(err);
            if !err.is_connection_error() {
                return Err(err);
            }

            match &err {
                RelayError::Io(io_err) if io_err.kind() == io::ErrorKind::NotConnected => {
                    debug!(addr = %self.addr, "connecting to collector");
                }
                _ => warn!(addr = %self.addr, error = %err, "send failed, reconnecting"),
            }
            self.reconnect().await?;

            if let Err(err) = self.write_frame(&frame).await {
                self.connection = None;
                return Err(RelayError::RetryFailed(err));
            }
        }

        self.stats.frames_sent += 1;
        Ok(())
    }
}
