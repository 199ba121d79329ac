//! LogRelay client for sending records to the collector

use crate::client::transport::{ReconnectingTransport, Transport, TransportStats};
use crate::config::ClientConfig;
use crate::types::{LogLevel, LogRecord, RecordFields};
use crate::Result;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::warn;

/// Cloneable handle for emitting records through one reconnecting connection
#[derive(Clone)]
pub struct LogClient {
    config: ClientConfig,
    transport: Arc<Mutex<ReconnectingTransport>>,
    hostname: String,
}

impl LogClient {
    /// Connect to the collector at `host:port`, logging as `name`
    pub async fn connect(host: &str, port: u16, name: &str) -> Result<Self> {
        let config = ClientConfig {
            host: host.to_string(),
            port,
            name: name.to_string(),
            ..Default::default()
        };

        Self::with_config(config).await
    }

    /// Create a client with custom configuration and open its connection
    pub async fn with_config(config: ClientConfig) -> Result<Self> {
        let client = Self::lazy(config)?;
        client.transport.lock().await.reconnect().await?;
        Ok(client)
    }

    /// Create a client that connects on its first record
    pub fn lazy(config: ClientConfig) -> Result<Self> {
        config.validate()?;

        let hostname = gethostname::gethostname()
            .to_string_lossy()
            .to_string();
        let transport = ReconnectingTransport::from_config(&config);

        Ok(Self {
            config,
            transport: Arc::new(Mutex::new(transport)),
            hostname,
        })
    }

    /// Logger name stamped on records
    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Transport counters
    pub async fn stats(&self) -> TransportStats {
        self.transport.lock().await.stats()
    }

    /// Log a message with specified level and fields
    ///
    /// Only delivery failures are returned; anything else is logged locally
    /// and the record is dropped.
    pub async fn log(&self, level: LogLevel, message: &str, fields: RecordFields) -> Result<()> {
        if level < self.config.min_level {
            return Ok(());
        }

        let mut record = LogRecord::new(self.config.name.clone(), level, message);
        record.fields = fields;
        record.pid = Some(std::process::id());
        record.hostname = Some(self.hostname.clone());
        record.thread = std::thread::current().name().map(str::to_string);

        self.send(&record).await
    }

    /// Send a fully built record, applying the client's error policy
    pub async fn send(&self, record: &LogRecord) -> Result<()> {
        let mut transport = self.transport.lock().await;
        match transport.send(record).await {
            Ok(()) => Ok(()),
            Err(err) if err.is_delivery_failure() => Err(err),
            Err(err) => {
                warn!(logger = %record.name, error = %err, "dropping record");
                Ok(())
            }
        }
    }

    /// Log a debug message
    pub async fn debug<S: AsRef<str>>(&self, message: S) -> Result<()> {
        self.log(LogLevel::DEBUG, message.as_ref(), RecordFields::new()).await
    }

    /// Log an info message
    pub async fn info<S: AsRef<str>>(&self, message: S) -> Result<()> {
        self.log(LogLevel::INFO, message.as_ref(), RecordFields::new()).await
    }

    /// Log an info message with fields
    pub async fn info_with_fields<S: AsRef<str>>(&self, message: S, fields: RecordFields) -> Result<()> {
        self.log(LogLevel::INFO, message.as_ref(), fields).await
    }

    /// Log a warning message
    pub async fn warning<S: AsRef<str>>(&self, message: S) -> Result<()> {
        self.log(LogLevel::WARNING, message.as_ref(), RecordFields::new()).await
    }

    /// Log a warning message with fields
    pub async fn warning_with_fields<S: AsRef<str>>(&self, message: S, fields: RecordFields) -> Result<()> {
        self.log(LogLevel::WARNING, message.as_ref(), fields).await
    }

    /// Log an error message
    pub async fn error<S: AsRef<str>>(&self, message: S) -> Result<()> {
        self.log(LogLevel::ERROR, message.as_ref(), RecordFields::new()).await
    }

    /// Log an error message with fields
    pub async fn error_with_fields<S: AsRef<str>>(&self, message: S, fields: RecordFields) -> Result<()> {
        self.log(LogLevel::ERROR, message.as_ref(), fields).await
    }

    /// Log a critical message
    pub async fn critical<S: AsRef<str>>(&self, message: S) -> Result<()> {
        self.log(LogLevel::CRITICAL, message.as_ref(), RecordFields::new()).await
    }

    /// Log a critical message with fields
    pub async fn critical_with_fields<S: AsRef<str>>(&self, message: S, fields: RecordFields) -> Result<()> {
        self.log(LogLevel::CRITICAL, message.as_ref(), fields).await
    }

    /// Close the connection to the collector
    pub async fn close(&self) -> Result<()> {
        self.transport.lock().await.close().await
    }
}
