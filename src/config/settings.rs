//! Configuration structures for LogRelay

use crate::protocol::DEFAULT_MAX_FRAME_SIZE;
use crate::types::LogLevel;
use crate::{RelayError, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default collector host
pub const DEFAULT_HOST: &str = "127.0.0.1";
/// Default collector port
pub const DEFAULT_PORT: u16 = 3200;

/// Server configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Listener settings
    pub server: ServerSettings,
    /// Sink configuration
    pub sinks: SinkSettings,
}

/// Core listener settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    /// Address to bind to
    pub host: String,
    /// Port to bind to (0 picks a free port)
    pub port: u16,
    /// Pending-connection queue length passed to listen(2)
    pub backlog: u32,
    /// Enable TCP keep-alive on the listener and accepted connections
    pub keepalive: bool,
    /// Maximum payload size of a single frame in bytes
    pub max_frame_size: usize,
    /// Maximum concurrently handled connections
    pub max_connections: usize,
}

/// Re-dispatch sink configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SinkSettings {
    /// Re-emit records as tracing events
    pub tracing: TracingSinkSettings,
    /// Append records to per-logger files
    pub file: FileSinkSettings,
}

/// Tracing sink settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TracingSinkSettings {
    /// Enable the tracing sink
    pub enabled: bool,
}

/// File sink settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FileSinkSettings {
    /// Enable the file sink
    pub enabled: bool,
    /// Directory receiving one `<logger>.log` file per logger name
    pub output_directory: PathBuf,
}

/// Client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Collector host
    pub host: String,
    /// Collector port
    pub port: u16,
    /// Logger name stamped on records
    pub name: String,
    /// Minimum log level to send
    pub min_level: LogLevel,
    /// Connect attempts per reconnect cycle
    pub retry_count: u32,
    /// Seconds to wait between connect attempts
    pub retry_interval_seconds: u64,
    /// Upper bound on a single connect attempt in seconds
    pub connect_timeout_seconds: u64,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            backlog: 10,
            keepalive: true,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            max_connections: 1024,
        }
    }
}

impl Default for TracingSinkSettings {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl Default for FileSinkSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            output_directory: PathBuf::from("/var/log/logrelay"),
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            name: "client".to_string(),
            min_level: LogLevel::INFO,
            retry_count: 5,
            retry_interval_seconds: 5,
            connect_timeout_seconds: 5,
        }
    }
}

fn load_toml<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| RelayError::Config(format!("Failed to read config file: {}", e)))?;

    toml::from_str(&content)
        .map_err(|e| RelayError::Config(format!("Failed to parse config: {}", e)))
}

impl ServerConfig {
    /// Load configuration from TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config: ServerConfig = load_toml(path.as_ref())?;
        config.validate()?;
        Ok(config)
    }

    /// `host:port` the listener binds to
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.server.host.is_empty() {
            return Err(RelayError::Config("Host cannot be empty".to_string()));
        }
        if self.server.backlog == 0 {
            return Err(RelayError::Config("Backlog must be at least 1".to_string()));
        }
        if self.server.max_frame_size == 0 || self.server.max_frame_size > u32::MAX as usize {
            return Err(RelayError::Config(format!(
                "max_frame_size must be between 1 and {}",
                u32::MAX
            )));
        }
        if self.server.max_connections == 0 {
            return Err(RelayError::Config("max_connections must be at least 1".to_string()));
        }
        if self.sinks.file.enabled && self.sinks.file.output_directory.as_os_str().is_empty() {
            return Err(RelayError::Config("Output directory cannot be empty".to_string()));
        }
        Ok(())
    }
}

impl ClientConfig {
    /// Load configuration from TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config: ClientConfig = load_toml(path.as_ref())?;
        config.validate()?;
        Ok(config)
    }

    /// `host:port` of the collector
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Pause between connect attempts
    pub fn retry_interval(&self) -> Duration {
        Duration::from_secs(self.retry_interval_seconds)
    }

    /// Upper bound on one connect attempt
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_seconds)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.host.is_empty() {
            return Err(RelayError::Config("Host cannot be empty".to_string()));
        }
        if self.port == 0 {
            return Err(RelayError::Config("Port cannot be 0".to_string()));
        }
        if self.name.is_empty() {
            return Err(RelayError::Config("Logger name cannot be empty".to_string()));
        }
        if self.retry_count == 0 {
            return Err(RelayError::Config("retry_count must be at least 1".to_string()));
        }
        if self.connect_timeout_seconds == 0 {
            return Err(RelayError::Config("Connect timeout cannot be 0".to_string()));
        }
        Ok(())
    }
}
