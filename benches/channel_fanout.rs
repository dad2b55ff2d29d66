//! Event Fan-out and Driver Overhead Benchmarks
//!
//! Cost of publishing to many subscribers, and the fixed cost a driver run
//! adds around a no-op operation under an idle scenario.

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use duress::load::{NoLoad, NoOp};
use duress::{ClockMeasurement, Driver, DriverConfig, EventChannel};
use std::hint::black_box;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Runtime;

/// Benchmark subscribe + publish + delivery for growing subscriber counts
fn bench_channel_fanout(c: &mut Criterion) {
    let mut group = c.benchmark_group("channel_fanout");
    group.measurement_time(Duration::from_secs(5));

    let rt = Runtime::new().unwrap();

    for subscribers in [1usize, 16, 256] {
        group.throughput(Throughput::Elements(subscribers as u64));
        group.bench_with_input(
            BenchmarkId::new("publish", subscribers),
            &subscribers,
            |b, &subscribers| {
                b.to_async(&rt).iter(|| async move {
                    let channel: EventChannel<u64, String> = EventChannel::new();
                    let pending: Vec<_> = (0..subscribers).map(|_| channel.subscribe()).collect();
                    let delivered = channel.publish_success(black_box(42));
                    for subscription in pending {
                        black_box(subscription.await.ok());
                    }
                    black_box(delivered)
                })
            },
        );
    }

    // Cancelled subscriptions are skipped at publish time
    group.bench_function("publish_after_cancel_256", |b| {
        b.iter(|| {
            let channel: EventChannel<u64, String> = EventChannel::new();
            let mut pending: Vec<_> = (0..256).map(|_| channel.subscribe()).collect();
            for subscription in pending.iter_mut().step_by(2) {
                subscription.cancel();
            }
            black_box(channel.publish_success(black_box(7)))
        })
    });

    group.finish();
}

/// Benchmark a complete driver run with nothing to measure
fn bench_driver_overhead(c: &mut Criterion) {
    let mut group = c.benchmark_group("driver_overhead");
    group.sample_size(200);

    let rt = Runtime::new().unwrap();

    for samples in [1usize, 10, 100] {
        group.bench_with_input(
            BenchmarkId::new("no_load_no_op", samples),
            &samples,
            |b, &samples| {
                let driver = Driver::new(
                    DriverConfig {
                        samples,
                        setup_timeout: None,
                    },
                    Arc::new(ClockMeasurement::wallclock()),
                );
                let operation = Arc::new(NoOp::default());

                b.to_async(&rt).iter(|| {
                    let driver = &driver;
                    let operation = Arc::clone(&operation);
                    async move {
                        let report = driver.run(NoLoad::scenario("idle"), operation).await;
                        black_box(report.samples.len())
                    }
                })
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_channel_fanout, bench_driver_overhead);
criterion_main!(benches);
