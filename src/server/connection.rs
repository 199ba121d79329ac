//! Per-connection record reader

use crate::protocol::RecordCodec;
use crate::server::sink::RecordSink;
use crate::RelayError;
use std::net::SocketAddr;
use tokio::io::AsyncRead;
use tokio_stream::StreamExt;
use tokio_util::codec::FramedRead;
use tracing::{debug, info, warn};

/// How a connection's handling ended
#[derive(Debug)]
pub enum ConnectionEnd {
    /// The peer closed the stream on a frame boundary
    Closed,
    /// Reading, decoding or dispatching failed
    Failed(RelayError),
}

/// Outcome of one connection
#[derive(Debug)]
pub struct ConnectionSummary {
    /// Remote address
    pub peer: SocketAddr,
    /// Records handed to the sink
    pub records: u64,
    /// Why handling stopped
    pub end: ConnectionEnd,
}

impl ConnectionSummary {
    /// Whether the peer hung up cleanly
    pub fn is_orderly(&self) -> bool {
        matches!(self.end, ConnectionEnd::Closed)
    }

    pub(crate) fn log(&self) {
        match &self.end {
            ConnectionEnd::Closed => {
                info!(peer = %self.peer, records = self.records, "connection closed");
            }
            ConnectionEnd::Failed(err) => {
                warn!(
                    peer = %self.peer,
                    records = self.records,
                    error = %err,
                    "connection terminated"
                );
            }
        }
    }
}

/// Read frames off `stream` and dispatch each record until the stream ends.
///
/// Consumes the stream, so it is closed exactly once when this returns.
/// Errors never escape: they end this connection and are reported in the
/// returned summary.
pub async fn read_records<R, S>(
    stream: R,
    peer: SocketAddr,
    sink: &S,
    codec: RecordCodec,
) -> ConnectionSummary
where
    R: AsyncRead + Unpin,
    S: RecordSink,
{
    let mut frames = FramedRead::new(stream, codec);
    let mut records = 0;

    let end = loop {
        match frames.next().await {
            None => break ConnectionEnd::Closed,
            Some(Ok(record)) => {
                debug!(logger = %record.name, level = %record.level, "dispatching record");
                if let Err(err) = sink.dispatch(record).await {
                    break ConnectionEnd::Failed(err);
                }
                records += 1;
            }
            Some(Err(err)) => break ConnectionEnd::Failed(err),
        }
    };

    drop(frames);
    ConnectionSummary { peer, records, end }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::encode_record;
    use crate::server::sink::MemorySink;
    use crate::types::{LogLevel, LogRecord};
    use crate::Result;
    use tokio::io::{duplex, AsyncWriteExt};

    fn peer() -> SocketAddr {
        "127.0.0.1:40000".parse().unwrap()
    }

    struct RejectingSink;

    impl RecordSink for RejectingSink {
        async fn dispatch(&self, record: LogRecord) -> Result<()> {
            Err(RelayError::Sink(format!("no logger for {}", record.name)))
        }
    }

    #[tokio::test]
    async fn test_dispatches_in_arrival_order_then_closes() {
        let sink = MemorySink::new();
        let (mut client, server) = duplex(1024);

        let sent = vec![
            LogRecord::new("a", LogLevel::INFO, "hello"),
            LogRecord::new("b", LogLevel::INFO, "world"),
            LogRecord::new("a", LogLevel::INFO, "bye"),
        ];
        let writer = {
            let sent = sent.clone();
            tokio::spawn(async move {
                for record in &sent {
                    client.write_all(&encode_record(record).unwrap()).await.unwrap();
                }
            })
        };

        let summary = read_records(server, peer(), &sink, RecordCodec::new()).await;
        writer.await.unwrap();

        assert!(summary.is_orderly());
        assert_eq!(summary.records, 3);
        assert_eq!(sink.records(), sent);
        assert_eq!(sink.records_for("a").len(), 2);
    }

    #[tokio::test]
    async fn test_custom_level_keeps_connection_alive() {
        let sink = MemorySink::new();
        let (mut client, server) = duplex(1024);

        let custom = br#"{"name":"a","level":25,"message":"custom"}"#;
        client
            .write_all(&encode_record(&LogRecord::new("a", LogLevel::INFO, "before")).unwrap())
            .await
            .unwrap();
        client.write_all(&(custom.len() as u32).to_be_bytes()).await.unwrap();
        client.write_all(custom).await.unwrap();
        client
            .write_all(&encode_record(&LogRecord::new("a", LogLevel::ERROR, "after")).unwrap())
            .await
            .unwrap();
        drop(client);

        let summary = read_records(server, peer(), &sink, RecordCodec::new()).await;

        assert!(summary.is_orderly());
        assert_eq!(summary.records, 3);
        let levels: Vec<u8> = sink.records().iter().map(|r| r.level.as_u8()).collect();
        assert_eq!(levels, vec![20, 25, 40]);
    }

    #[tokio::test]
    async fn test_truncated_frame_ends_connection() {
        let sink = MemorySink::new();
        let (mut client, server) = duplex(1024);

        let good = encode_record(&LogRecord::new("a", LogLevel::INFO, "complete")).unwrap();
        let cut = encode_record(&LogRecord::new("a", LogLevel::INFO, "cut")).unwrap();
        client.write_all(&good).await.unwrap();
        client.write_all(&cut[..cut.len() / 2]).await.unwrap();
        drop(client);

        let summary = read_records(server, peer(), &sink, RecordCodec::new()).await;

        assert_eq!(summary.records, 1);
        assert!(matches!(
            summary.end,
            ConnectionEnd::Failed(RelayError::TruncatedFrame { .. })
        ));
        assert_eq!(sink.len(), 1);
    }

    #[tokio::test]
    async fn test_malformed_payload_ends_connection() {
        let sink = MemorySink::new();
        let (mut client, server) = duplex(1024);

        client.write_all(&5u32.to_be_bytes()).await.unwrap();
        client.write_all(b"oops!").await.unwrap();
        client
            .write_all(&encode_record(&LogRecord::new("a", LogLevel::INFO, "never read")).unwrap())
            .await
            .unwrap();
        drop(client);

        let summary = read_records(server, peer(), &sink, RecordCodec::new()).await;

        assert!(matches!(
            summary.end,
            ConnectionEnd::Failed(RelayError::MalformedPayload(_))
        ));
        assert!(sink.is_empty());
    }

    #[tokio::test]
    async fn test_oversized_frame_ends_connection() {
        let sink = MemorySink::new();
        let (mut client, server) = duplex(1024);

        client.write_all(&u32::MAX.to_be_bytes()).await.unwrap();

        let summary = read_records(server, peer(), &sink, RecordCodec::with_max_frame_size(1024)).await;
        drop(client);

        assert!(matches!(
            summary.end,
            ConnectionEnd::Failed(RelayError::FrameTooLarge { .. })
        ));
    }

    #[tokio::test]
    async fn test_sink_failure_ends_connection() {
        let (mut client, server) = duplex(1024);
        client
            .write_all(&encode_record(&LogRecord::new("orphan", LogLevel::ERROR, "x")).unwrap())
            .await
            .unwrap();

        let summary = read_records(server, peer(), &RejectingSink, RecordCodec::new()).await;
        drop(client);

        assert_eq!(summary.records, 0);
        assert!(matches!(summary.end, ConnectionEnd::Failed(RelayError::Sink(_))));
    }

    #[tokio::test]
    async fn test_immediate_close_is_orderly() {
        let sink = MemorySink::new();
        let (client, server) = duplex(64);
        drop(client);

        let summary = read_records(server, peer(), &sink, RecordCodec::new()).await;
        assert!(summary.is_orderly());
        assert_eq!(summary.records, 0);
    }
}
