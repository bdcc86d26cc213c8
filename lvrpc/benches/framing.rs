//! Framing benchmarks for LVRPC
//!
//! Measures:
//! - Frame encoding for different body sizes
//! - Frame decoding, including many frames buffered back to back
//! - RPC round trips over loopback TCP

use bytes::BytesMut;
use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use lvrpc::endpoint::{EndpointConfig, RpcClient, RpcServer};
use lvrpc::message::{Message, RpcRequest, TopicRequest};
use lvrpc::protocol::{DEFAULT_MAX_FRAME_SIZE, LengthValueCodec};
use lvrpc::rpc::{ParamType, ServiceDescriptor};
use serde_json::json;
use std::hint::black_box;

fn publish(size: usize) -> Message {
    Message::new("bench", TopicRequest::publish("bench", "x".repeat(size)))
}

/// Benchmark frame encoding
fn bench_encode(c: &mut Criterion) {
    let codec = LengthValueCodec::new(DEFAULT_MAX_FRAME_SIZE);
    let mut group = c.benchmark_group("encode");

    for size in [16, 1024, 32 * 1024] {
        let message = publish(size);
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(format!("{size}bytes")), &message, |b, message| {
            b.iter(|| codec.encode(black_box(message)).unwrap());
        });
    }

    group.finish();
}

/// Benchmark frame decoding
fn bench_decode(c: &mut Criterion) {
    let codec = LengthValueCodec::new(DEFAULT_MAX_FRAME_SIZE);
    let mut group = c.benchmark_group("decode");

    for size in [16, 1024, 32 * 1024] {
        let frame = codec.encode(&publish(size)).unwrap();
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(format!("{size}bytes")), &frame, |b, frame| {
            b.iter(|| {
                let mut buf = BytesMut::from(&frame[..]);
                codec.decode_next(black_box(&mut buf)).unwrap()
            });
        });
    }

    // 100 small frames arriving in one read.
    let mut batch = BytesMut::new();
    for i in 0..100 {
        let message = Message::new(format!("req-{i}"), RpcRequest::new("add", json!({"num1": i, "num2": i})));
        batch.extend_from_slice(&codec.encode(&message).unwrap());
    }
    group.throughput(Throughput::Elements(100));
    group.bench_function("batch_100", |b| {
        b.iter(|| {
            let mut buf = batch.clone();
            let mut count = 0;
            while let Some(message) = codec.decode_next(&mut buf).unwrap() {
                black_box(message);
                count += 1;
            }
            assert_eq!(count, 100);
        });
    });

    group.finish();
}

/// Benchmark RPC round trips over loopback
fn bench_round_trip(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let (_server, client) = rt.block_on(async {
        let server = RpcServer::bind("127.0.0.1:0", EndpointConfig::default())
            .await
            .unwrap();
        server.register_service(
            ServiceDescriptor::builder("add")
                .param("num1", ParamType::Integral)
                .param("num2", ParamType::Integral)
                .returns(ParamType::Integral)
                .handler(|params| {
                    let a = params["num1"].as_i64().unwrap_or_default();
                    let b = params["num2"].as_i64().unwrap_or_default();
                    Ok(json!(a + b))
                })
                .build()
                .unwrap(),
        );
        let handle = server.spawn().await.unwrap();
        let client = RpcClient::connect(&handle.local_addr().to_string(), EndpointConfig::default())
            .await
            .unwrap();
        (handle, client)
    });

    c.bench_function("rpc_round_trip", |b| {
        b.to_async(&rt).iter(|| async {
            let sum = client.call("add", json!({"num1": 20, "num2": 30})).await.unwrap();
            assert_eq!(sum, json!(50));
        });
    });
}

criterion_group!(benches, bench_encode, bench_decode, bench_round_trip);
criterion_main!(benches);
