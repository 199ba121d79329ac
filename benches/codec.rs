//! Performance benchmarks for the LogRelay wire codec and transport

use bytes::BytesMut;
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use logrelay::client::{ReconnectingTransport, RetryPolicy, Transport};
use logrelay::config::ServerConfig;
use logrelay::protocol::{encode_record, RecordCodec};
use logrelay::server::{LogServer, MemorySink};
use logrelay::types::{LogLevel, LogRecord};
use serde_json::json;
use std::time::Duration;
use tokio::runtime::Runtime;
use tokio_util::codec::{Decoder, Encoder};

fn sample_record(i: usize) -> LogRecord {
    LogRecord::new("bench.worker", LogLevel::INFO, format!("Benchmark message {}", i))
        .with_field("request_id", json!(i))
        .with_field("path", json!("/api/v1/orders"))
        .with_field("exc_info", json!({"type": "Timeout", "args": [30, "s"]}))
}

/// Benchmark frame encoding
fn bench_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode");

    for count in [1usize, 100, 1000].iter() {
        let records: Vec<LogRecord> = (0..*count).map(sample_record).collect();
        group.throughput(Throughput::Elements(*count as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), &records, |b, records| {
            b.iter(|| {
                let mut codec = RecordCodec::new();
                let mut dst = BytesMut::new();
                for record in records {
                    codec.encode(record, &mut dst).unwrap();
                }
                dst
            });
        });
    }

    group.finish();
}

/// Benchmark decoding a buffer holding many back-to-back frames
fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode");

    for count in [1usize, 100, 1000].iter() {
        let mut stream = BytesMut::new();
        for i in 0..*count {
            stream.extend_from_slice(&encode_record(&sample_record(i)).unwrap());
        }
        let stream = stream.freeze();

        group.throughput(Throughput::Bytes(stream.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), &stream, |b, stream| {
            b.iter(|| {
                let mut codec = RecordCodec::new();
                let mut src = BytesMut::from(&stream[..]);
                let mut decoded = 0;
                while let Some(_record) = codec.decode(&mut src).unwrap() {
                    decoded += 1;
                }
                decoded
            });
        });
    }

    group.finish();
}

/// Benchmark end-to-end delivery over loopback
fn bench_loopback_delivery(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();

    let mut group = c.benchmark_group("loopback_delivery");
    group.measurement_time(Duration::from_secs(10));
    group.sample_size(10);

    for count in [100usize, 1000].iter() {
        group.throughput(Throughput::Elements(*count as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), count, |b, &count| {
            b.to_async(&rt).iter(|| async move {
                let mut config = ServerConfig::default();
                config.server.port = 0;
                let sink = MemorySink::new();
                let server = LogServer::bind(config, sink.clone()).await.unwrap();
                let addr = server.local_addr().unwrap();
                let shutdown = server.shutdown_handle();
                let handle = tokio::spawn(server.run());

                let mut transport =
                    ReconnectingTransport::new(addr.to_string(), RetryPolicy::default());
                for i in 0..count {
                    transport.send(&sample_record(i)).await.unwrap();
                }
                transport.close().await.unwrap();

                sink.wait_for(count, Duration::from_secs(10)).await;
                shutdown.shutdown();
                let _ = handle.await;
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_encode, bench_decode, bench_loopback_delivery);
criterion_main!(benches);
