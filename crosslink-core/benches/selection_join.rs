//! Benchmarks for joining group state onto snapshots.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use crosslink_core::reactive::ReactiveSource;
use crosslink_core::{DataSource, KeyRule, RowKey, Session, Snapshot, Value};

fn snapshot(rows: usize) -> Snapshot {
    Snapshot::from_records(
        &["id", "score"],
        (0..rows)
            .map(|i| vec![Value::from(format!("row_{i}")), Value::from(i as f64 * 1.5)])
            .collect(),
    )
}

fn every_tenth(rows: usize) -> Vec<RowKey> {
    (0..rows).step_by(10).map(|i| RowKey::new(format!("row_{i}"))).collect()
}

fn bench_read_with_selection(c: &mut Criterion) {
    let mut group = c.benchmark_group("read_with_selection");

    for size in [1_000, 10_000, 100_000] {
        let session = Session::default();
        let data = session
            .shared_dataset("bench", snapshot(size).into(), Some(KeyRule::column("id")))
            .unwrap();
        data.group().server_set_selection(Some(every_tenth(size)));

        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| black_box(data.read_with_selection().unwrap()));
        });
    }

    group.finish();
}

fn bench_read_with_filter(c: &mut Criterion) {
    let mut group = c.benchmark_group("read_with_filter");

    for size in [1_000, 10_000, 100_000] {
        let session = Session::default();
        let data = session
            .shared_dataset("bench", snapshot(size).into(), Some(KeyRule::column("id")))
            .unwrap();
        data.group().server_set_filter(Some(every_tenth(size)));

        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| black_box(data.read_with_filter().unwrap()));
        });
    }

    group.finish();
}

/// Key resolution cost after every regeneration of a producer.
fn bench_regenerate(c: &mut Criterion) {
    let mut group = c.benchmark_group("regenerate");

    for size in [1_000, 10_000] {
        let session = Session::default();
        let producer = ReactiveSource::new(snapshot(size).shared());
        let data = session
            .shared_dataset(
                "bench",
                DataSource::producer(producer.clone()),
                Some(KeyRule::column("id")),
            )
            .unwrap();

        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            b.iter_batched(
                || snapshot(size).shared(),
                |next| {
                    producer.set(next);
                    black_box(data.read().unwrap())
                },
                criterion::BatchSize::LargeInput,
            );
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_read_with_selection,
    bench_read_with_filter,
    bench_regenerate
);
criterion_main!(benches);
