//! LogRelay collector implementation

pub mod connection;
pub mod listener;
pub mod sink;

use crate::config::ServerConfig;
use crate::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::broadcast;

pub use connection::{read_records, ConnectionEnd, ConnectionSummary};
pub use listener::{bind_listener, TcpAcceptor};
pub use sink::{ConfiguredSink, FileSink, MemorySink, RecordSink, TracingSink};

/// Stops a running [`LogServer`] from accepting new connections
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    tx: broadcast::Sender<()>,
}

impl ShutdownHandle {
    /// Signal the accept loop to stop; open connections are drained
    pub fn shutdown(&self) {
        let _ = self.tx.send(());
    }
}

/// Collector bound to its listening socket
pub struct LogServer<S> {
    config: ServerConfig,
    sink: Arc<S>,
    listener: TcpListener,
    shutdown_tx: broadcast::Sender<()>,
    shutdown_rx: broadcast::Receiver<()>,
}

impl<S: RecordSink> LogServer<S> {
    /// Validate `config` and bind the listening socket
    pub async fn bind(config: ServerConfig, sink: S) -> Result<Self> {
        config.validate()?;

        let listener = bind_listener(&config.server).await?;
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

        Ok(Self {
            config,
            sink: Arc::new(sink),
            listener,
            shutdown_tx,
            shutdown_rx,
        })
    }

    /// Address actually bound (useful with port 0)
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Handle that stops the accept loop
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            tx: self.shutdown_tx.clone(),
        }
    }

    /// Accept connections until shut down, then drain open connections
    pub async fn run(self) -> Result<()> {
        let LogServer {
            config,
            sink,
            listener,
            shutdown_tx,
            shutdown_rx,
        } = self;

        let acceptor = TcpAcceptor::new(listener, &config.server, sink, shutdown_rx);
        let result = acceptor.run().await;
        drop(shutdown_tx);
        result
    }
}
