//! TCP listener accepting collector connections

use crate::config::ServerSettings;
use crate::protocol::RecordCodec;
use crate::server::connection::read_records;
use crate::server::sink::RecordSink;
use crate::{RelayError, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{lookup_host, TcpListener, TcpSocket, TcpStream};
use tokio::sync::{broadcast, OwnedSemaphorePermit, Semaphore};
use tokio::time::{sleep, Duration};
use tokio_util::task::TaskTracker;
use tracing::{error, info, info_span, warn, Instrument};

const ACCEPT_ERROR_PAUSE: Duration = Duration::from_millis(100);

/// Bind a listening socket with keep-alive and a bounded backlog
pub async fn bind_listener(settings: &ServerSettings) -> Result<TcpListener> {
    let address = format!("{}:{}", settings.host, settings.port);
    let addr = lookup_host(address.as_str())
        .await?
        .next()
        .ok_or_else(|| RelayError::Config(format!("{} did not resolve", address)))?;

    let socket = match addr {
        SocketAddr::V4(_) => TcpSocket::new_v4()?,
        SocketAddr::V6(_) => TcpSocket::new_v6()?,
    };
    socket.set_reuseaddr(true)?;
    if settings.keepalive {
        socket.set_keepalive(true)?;
    }
    socket.bind(addr)?;
    Ok(socket.listen(settings.backlog)?)
}

/// Accept loop spawning one task per connection
pub struct TcpAcceptor<S> {
    listener: TcpListener,
    settings: ServerSettings,
    sink: Arc<S>,
    shutdown_rx: broadcast::Receiver<()>,
    limit_connections: Arc<Semaphore>,
    tracker: TaskTracker,
}

impl<S: RecordSink> TcpAcceptor<S> {
    /// Create an acceptor over an already bound listener
    pub fn new(
        listener: TcpListener,
        settings: &ServerSettings,
        sink: Arc<S>,
        shutdown_rx: broadcast::Receiver<()>,
    ) -> Self {
        Self {
            listener,
            settings: settings.clone(),
            sink,
            shutdown_rx,
            limit_connections: Arc::new(Semaphore::new(settings.max_connections)),
            tracker: TaskTracker::new(),
        }
    }

    /// Accept until shutdown, then wait for open connections to finish.
    ///
    /// Connections already ready to accept win over the shutdown signal, and
    /// whatever is still queued once shutdown is seen gets accepted too, so a
    /// client whose handshake completed is never dropped unread.
    pub async fn run(mut self) -> Result<()> {
        info!(addr = %self.listener.local_addr()?, "accepting inbound connections");

        loop {
            let permit = tokio::select! {
                biased;
                permit = Arc::clone(&self.limit_connections).acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
                _ = self.shutdown_rx.recv() => break,
            };

            tokio::select! {
                biased;
                result = self.listener.accept() => {
                    match result {
                        Ok((stream, peer)) => self.spawn_handler(stream, peer, permit),
                        Err(e) => {
                            error!(error = %e, "failed to accept connection");
                            sleep(ACCEPT_ERROR_PAUSE).await;
                        }
                    }
                }
                _ = self.shutdown_rx.recv() => break,
            }
        }

        self.accept_queued();

        self.tracker.close();
        info!(open = self.tracker.len(), "stopped accepting, draining connections");
        self.tracker.wait().await;
        info!("all connections drained");
        Ok(())
    }

    fn accept_queued(&self) {
        loop {
            let permit = match Arc::clone(&self.limit_connections).try_acquire_owned() {
                Ok(permit) => permit,
                Err(_) => return,
            };
            match self.try_accept() {
                Ok(Some((stream, peer))) => self.spawn_handler(stream, peer, permit),
                Ok(None) => return,
                Err(e) => {
                    warn!(error = %e, "failed to accept queued connection");
                    return;
                }
            }
        }
    }

    /// Non-blocking accept straight from the kernel queue
    fn try_accept(&self) -> std::io::Result<Option<(TcpStream, SocketAddr)>> {
        match socket2::SockRef::from(&self.listener).accept() {
            Ok((socket, addr)) => {
                socket.set_nonblocking(true)?;
                let peer = addr.as_socket().ok_or_else(|| {
                    std::io::Error::new(std::io::ErrorKind::InvalidInput, "peer is not an IP address")
                })?;
                let stream = TcpStream::from_std(socket.into())?;
                Ok(Some((stream, peer)))
            }
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn spawn_handler(&self, stream: TcpStream, peer: SocketAddr, permit: OwnedSemaphorePermit) {
        if self.settings.keepalive {
            if let Err(e) = socket2::SockRef::from(&stream).set_keepalive(true) {
                warn!(%peer, error = %e, "failed to enable keep-alive");
            }
        }
        info!(%peer, "connection established");

        let sink = Arc::clone(&self.sink);
        let codec = RecordCodec::with_max_frame_size(self.settings.max_frame_size);
        self.tracker.spawn(
            async move {
                let summary = read_records(stream, peer, &*sink, codec).await;
                summary.log();
                drop(permit);
            }
            .instrument(info_span!("connection", %peer)),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::encode_record;
    use crate::server::sink::MemorySink;
    use crate::types::{LogLevel, LogRecord};
    use tokio::io::AsyncWriteExt;
    use tokio::time::timeout;

    fn local_settings() -> ServerSettings {
        ServerSettings {
            port: 0,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_bind_listener_enables_keepalive() {
        let listener = bind_listener(&local_settings()).await.unwrap();
        let addr = listener.local_addr().unwrap();
        assert!(addr.ip().is_loopback());
        assert_ne!(addr.port(), 0);
        assert!(socket2::SockRef::from(&listener).keepalive().unwrap());
    }

    #[tokio::test]
    async fn test_bind_conflict_is_an_error() {
        let first = bind_listener(&local_settings()).await.unwrap();
        let settings = ServerSettings {
            port: first.local_addr().unwrap().port(),
            ..Default::default()
        };
        assert!(bind_listener(&settings).await.is_err());
    }

    #[tokio::test]
    async fn test_shutdown_stops_accepting_but_drains_open_connections() {
        let settings = local_settings();
        let listener = bind_listener(&settings).await.unwrap();
        let addr = listener.local_addr().unwrap();
        let sink = MemorySink::new();
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

        let acceptor = TcpAcceptor::new(listener, &settings, Arc::new(sink.clone()), shutdown_rx);
        let server = tokio::spawn(acceptor.run());

        let mut client = TcpStream::connect(addr).await.unwrap();
        client
            .write_all(&encode_record(&LogRecord::new("a", LogLevel::INFO, "before")).unwrap())
            .await
            .unwrap();
        assert!(sink.wait_for(1, Duration::from_secs(2)).await);

        shutdown_tx.send(()).unwrap();
        sleep(Duration::from_millis(100)).await;
        assert!(!server.is_finished());

        // The accepted connection still delivers after the accept loop stopped.
        client
            .write_all(&encode_record(&LogRecord::new("a", LogLevel::INFO, "after")).unwrap())
            .await
            .unwrap();
        assert!(sink.wait_for(2, Duration::from_secs(2)).await);
        drop(client);

        let result = timeout(Duration::from_secs(2), server).await;
        assert!(result.unwrap().unwrap().is_ok());
        assert_eq!(sink.records()[1].message, "after");
    }

    #[tokio::test]
    async fn test_queued_connection_is_accepted_despite_shutdown() {
        let settings = local_settings();
        let listener = bind_listener(&settings).await.unwrap();
        let addr = listener.local_addr().unwrap();
        let sink = MemorySink::new();
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

        // The client finishes its handshake and hangs up before the acceptor
        // ever runs, and shutdown is already pending when it does.
        let mut client = TcpStream::connect(addr).await.unwrap();
        client
            .write_all(&encode_record(&LogRecord::new("late", LogLevel::INFO, "queued")).unwrap())
            .await
            .unwrap();
        drop(client);
        shutdown_tx.send(()).unwrap();

        let acceptor = TcpAcceptor::new(listener, &settings, Arc::new(sink.clone()), shutdown_rx);
        let result = timeout(Duration::from_secs(2), acceptor.run()).await;

        assert!(result.unwrap().is_ok());
        assert_eq!(sink.len(), 1);
        assert_eq!(sink.records()[0].message, "queued");
    }
}
