//! Benchmarks for the decide-and-dispatch hot path
//!
//! This benchmark measures:
//! - Signal quality reads over in-memory telemetry
//! - Offload decisions through the application client
//! - Local dispatch through the offload router (debug strategy, no I/O)
//! - Throughput accounting under a single observer

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::sync::Arc;
use std::time::Duration;

use edge_offload::controller::{InMemoryTelemetry, SignalController};
use edge_offload::request::Kwargs;
use edge_offload::routing::{OffloadRouter, Router, ServiceTable, ThroughputObserver};
use edge_offload::strategy::DebugExecution;
use edge_offload::{OffloadAppClient, OffloadServiceRequest};

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

fn telemetry_with(samples: usize) -> Arc<InMemoryTelemetry> {
    let telemetry = Arc::new(InMemoryTelemetry::new(samples.max(1)));
    for i in 0..samples {
        telemetry
            .record_at("edge-1", "signal", i as f64, (i % 60) as f64)
            .unwrap();
    }
    telemetry
}

fn bench_signal_quality(c: &mut Criterion) {
    let rt = runtime();
    let mut group = c.benchmark_group("signal_quality");

    for window in [1usize, 3, 30] {
        let controller = SignalController::wifi(telemetry_with(180), "edge-1").with_window(window);
        group.bench_with_input(BenchmarkId::new("window", window), &controller, |b, controller| {
            b.to_async(&rt)
                .iter(|| async { black_box(controller.current_quality().await.unwrap()) })
        });
    }

    group.finish();
}

fn bench_decision(c: &mut Criterion) {
    let rt = runtime();
    let client = OffloadAppClient::new(SignalController::wifi(telemetry_with(180), "edge-1"), None);

    c.bench_function("next_request", |b| {
        b.to_async(&rt)
            .iter(|| async { black_box(client.next_request().await.unwrap()) })
    });
}

fn bench_local_dispatch(c: &mut Criterion) {
    let rt = runtime();
    let router = OffloadRouter::builder()
        .host_router(Arc::new(ServiceTable::new()))
        .local_strategy(Arc::new(DebugExecution::new()))
        .throughput_interval(Duration::from_secs(3600))
        .build()
        .unwrap();

    let mut group = c.benchmark_group("dispatch");
    group.throughput(Throughput::Elements(1));
    group.bench_function("debug_local", |b| {
        b.to_async(&rt).iter(|| async {
            let mut req = OffloadServiceRequest::new("svcA", "/", "get", false, Kwargs::new());
            black_box(router.request(&mut req).await.unwrap())
        })
    });
    group.finish();
}

fn bench_throughput_record(c: &mut Criterion) {
    let observer = ThroughputObserver::new(Duration::from_secs(3600));

    c.bench_function("throughput_record", |b| {
        b.iter(|| black_box(observer.record().unwrap()))
    });
}

criterion_group!(
    benches,
    bench_signal_quality,
    bench_decision,
    bench_local_dispatch,
    bench_throughput_record
);
criterion_main!(benches);
