//! Re-dispatch sinks receiving decoded records

use crate::config::ServerConfig;
use crate::types::{LogLevel, LogRecord};
use crate::{RelayError, Result};
use dashmap::DashMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::fs::OpenOptions;
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::sync::{Mutex, Notify};
use tracing::Level;

/// Local logging facility the collector hands every decoded record to.
///
/// Called concurrently from every connection handler, once per record and in
/// the order the records arrived on that connection.
pub trait RecordSink: Send + Sync + 'static {
    /// Hand one record to the local pipeline
    fn dispatch(&self, record: LogRecord) -> impl Future<Output = Result<()>> + Send;
}

/// Re-emits records as `tracing` events of the collector process
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl TracingSink {
    fn emit(&self, record: &LogRecord) {
        let fields = serde_json::to_string(&record.fields).unwrap_or_default();

        macro_rules! relay {
            ($level:expr) => {
                tracing::event!(
                    target: "logrelay::relayed",
                    $level,
                    logger = %record.name,
                    timestamp = %record.timestamp,
                    hostname = record.hostname.as_deref().unwrap_or("-"),
                    pid = record.pid.unwrap_or_default(),
                    fields = %fields,
                    "{}",
                    record.message
                )
            };
        }

        // Custom levels fall into the band of the named level below them.
        let level = record.level;
        if level < LogLevel::INFO {
            relay!(Level::DEBUG)
        } else if level < LogLevel::WARNING {
            relay!(Level::INFO)
        } else if level < LogLevel::ERROR {
            relay!(Level::WARN)
        } else {
            relay!(Level::ERROR)
        }
    }
}

impl RecordSink for TracingSink {
    async fn dispatch(&self, record: LogRecord) -> Result<()> {
        self.emit(&record);
        Ok(())
    }
}

type SharedWriter = Arc<Mutex<BufWriter<tokio::fs::File>>>;

/// Appends records as JSON lines to one file per logger name
#[derive(Debug)]
pub struct FileSink {
    output_directory: PathBuf,
    file_writers: DashMap<String, SharedWriter>,
}

impl FileSink {
    /// Create a file sink writing below `output_directory`
    pub async fn new(output_directory: impl Into<PathBuf>) -> Result<Self> {
        let output_directory = output_directory.into();
        tokio::fs::create_dir_all(&output_directory).await?;
        Ok(Self {
            output_directory,
            file_writers: DashMap::new(),
        })
    }

    /// File receiving records of logger `name`
    pub fn log_file_path(&self, name: &str) -> PathBuf {
        self.output_directory
            .join(format!("{}.log", sanitize_file_name(name)))
    }

    async fn write(&self, record: &LogRecord) -> Result<()> {
        let writer = self.writer_for(&record.name).await?;
        let mut line = record.to_json()?;
        line.push('\n');

        let mut writer_guard = writer.lock().await;
        writer_guard.write_all(line.as_bytes()).await?;
        writer_guard.flush().await?;
        Ok(())
    }

    async fn writer_for(&self, name: &str) -> Result<SharedWriter> {
        let existing = self.file_writers.get(name).map(|entry| Arc::clone(entry.value()));
        if let Some(writer) = existing {
            return Ok(writer);
        }

        let writer = Arc::new(Mutex::new(create_file_writer(&self.log_file_path(name)).await?));
        // Another connection may have opened the same file meanwhile; keep the first.
        let writer = self
            .file_writers
            .entry(name.to_string())
            .or_insert(writer)
            .value()
            .clone();
        Ok(writer)
    }
}

impl RecordSink for FileSink {
    async fn dispatch(&self, record: LogRecord) -> Result<()> {
        self.write(&record).await
    }
}

async fn create_file_writer(file_path: &Path) -> Result<BufWriter<tokio::fs::File>> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(file_path)
        .await
        .map_err(|e| RelayError::Sink(format!("cannot open {}: {}", file_path.display(), e)))?;
    Ok(BufWriter::new(file))
}

fn sanitize_file_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| match c {
            'a'..='z' | 'A'..='Z' | '0'..='9' | '.' | '-' | '_' => c,
            _ => '_',
        })
        .collect();

    if cleaned.trim_matches('.').is_empty() {
        "root".to_string()
    } else {
        cleaned
    }
}

#[derive(Debug, Default)]
struct MemoryInner {
    records: parking_lot::Mutex<Vec<LogRecord>>,
    arrived: Notify,
}

/// Keeps dispatched records in memory
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    inner: Arc<MemoryInner>,
}

impl MemorySink {
    /// Create an empty sink
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every record dispatched so far, in arrival order
    pub fn records(&self) -> Vec<LogRecord> {
        self.inner.records.lock().clone()
    }

    /// Records dispatched for logger `name`
    pub fn records_for(&self, name: &str) -> Vec<LogRecord> {
        self.inner
            .records
            .lock()
            .iter()
            .filter(|record| record.name == name)
            .cloned()
            .collect()
    }

    /// Number of records dispatched so far
    pub fn len(&self) -> usize {
        self.inner.records.lock().len()
    }

    /// Whether nothing has been dispatched yet
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Wait until at least `count` records arrived; false on timeout
    pub async fn wait_for(&self, count: usize, within: Duration) -> bool {
        let wait = async {
            loop {
                let arrived = self.inner.arrived.notified();
                if self.len() >= count {
                    return;
                }
                arrived.await;
            }
        };
        tokio::time::timeout(within, wait).await.is_ok()
    }
}

impl RecordSink for MemorySink {
    async fn dispatch(&self, record: LogRecord) -> Result<()> {
        self.inner.records.lock().push(record);
        self.inner.arrived.notify_waiters();
        Ok(())
    }
}

/// Sink assembled from server configuration
#[derive(Debug, Default)]
pub struct ConfiguredSink {
    tracing: Option<TracingSink>,
    file: Option<FileSink>,
}

impl ConfiguredSink {
    /// Build the sinks enabled in `config`
    pub async fn from_config(config: &ServerConfig) -> Result<Self> {
        let tracing_sink = config.sinks.tracing.enabled.then_some(TracingSink);
        let file_sink = if config.sinks.file.enabled {
            Some(FileSink::new(&config.sinks.file.output_directory).await?)
        } else {
            None
        };
        Ok(Self {
            tracing: tracing_sink,
            file: file_sink,
        })
    }

    /// Whether at least one sink is enabled
    pub fn is_active(&self) -> bool {
        self.tracing.is_some() || self.file.is_some()
    }
}

impl RecordSink for ConfiguredSink {
    async fn dispatch(&self, record: LogRecord) -> Result<()> {
        if let Some(tracing_sink) = &self.tracing {
            tracing_sink.emit(&record);
        }
        if let Some(file_sink) = &self.file {
            file_sink.write(&record).await?;
        }
        Ok(())
    }
}
