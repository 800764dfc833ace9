use chrono::Utc;
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use std::sync::Arc;
use std::time::Duration;
use weather_pi::{
    Batch, CaptureWindow, HostIdentity, RecordBuilder, SensorCache, SensorCacheConfig,
    SensorReading, SensorSnapshot, SimulatedSource, SystemMetricsSnapshot,
};

fn fixtures() -> (RecordBuilder, SensorSnapshot, SystemMetricsSnapshot) {
    let builder = RecordBuilder::new(HostIdentity::new(
        "bench-pi",
        "dc:a6:32:aa:bb:cc",
        "192.168.1.20",
    ));
    let sensor = SensorSnapshot {
        reading: SensorReading {
            temperature: 21.7,
            humidity: 44.2,
            pressure: 1012.9,
            device_temperature: 29.2,
            dewpoint: 10.5,
            illuminance: 230.0,
        },
        captured_at: Some(Utc::now()),
        sequence: 42,
        failed_polls: 0,
        staleness: Some(Duration::from_millis(800)),
    };
    let metrics = SystemMetricsSnapshot {
        cpu_temperature: 51.2,
        cpu_usage: 7.4,
        memory_usage: 31.0,
        free_disk_mb: 18_432.0,
        refreshed_at: tokio::time::Instant::now(),
    };
    (builder, sensor, metrics)
}

/// Benchmark record construction from cached snapshots
fn bench_record_build(c: &mut Criterion) {
    let (builder, sensor, metrics) = fixtures();

    c.bench_function("record_build", |b| {
        b.iter(|| builder.build(&sensor, &metrics, CaptureWindow::instant(Utc::now())))
    });
}

/// Benchmark JSON serialization of a single record
fn bench_record_serialization(c: &mut Criterion) {
    let (builder, sensor, metrics) = fixtures();
    let record = builder.build(&sensor, &metrics, CaptureWindow::instant(Utc::now()));

    c.bench_function("record_json_serialization", |b| {
        b.iter(|| serde_json::to_string(&record).expect("Should serialize"))
    });
}

/// Benchmark newline-delimited serialization of whole batches
fn bench_batch_serialization(c: &mut Criterion) {
    let (builder, sensor, metrics) = fixtures();

    for size in [1usize, 10, 100].iter() {
        let batch = Batch::new(
            (0..*size)
                .map(|_| builder.build(&sensor, &metrics, CaptureWindow::instant(Utc::now())))
                .collect(),
        );

        c.bench_with_input(BenchmarkId::new("batch_jsonl", size), &batch, |b, batch| {
            b.iter(|| {
                let mut payload = Vec::new();
                for record in batch {
                    serde_json::to_writer(&mut payload, record).expect("Should serialize");
                    payload.push(b'\n');
                }
                payload
            })
        });
    }
}

/// Benchmark reading the sensor cache while the poller is running
fn bench_sensor_snapshot(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().expect("Should create tokio runtime");
    let config = SensorCacheConfig::default().with_refresh_interval(Duration::from_millis(5));
    let cache = Arc::new(SensorCache::new(SimulatedSource::new(), config));
    rt.block_on(async { cache.start().expect("Should start poller") });

    c.bench_function("sensor_snapshot", |b| b.iter(|| cache.snapshot()));

    rt.block_on(async {
        cache
            .stop(Duration::from_secs(1))
            .await
            .expect("Should stop poller")
    });
}

criterion_group!(
    benches,
    bench_record_build,
    bench_record_serialization,
    bench_batch_serialization,
    bench_sensor_snapshot
);
criterion_main!(benches);
