//! Benchmarks for batch schema evolution.
//!
//! Run with: cargo bench -p schema-inference
//!
//! - stable_batches: every batch has the same shape, so evolution ends in
//!   `Unchanged` after the first one
//! - widening_batches: each batch adds one field
//! - detectors: cost of the string format detectors on string-heavy data

use criterion::{
    BenchmarkId, Criterion, Throughput, black_box, criterion_group,
    criterion_main,
};
use schema_inference::{ConflictPolicy, DetectorConfig, SchemaAccumulator};
use serde_json::{Value, json};

const BATCH: usize = 100;

fn make_order(i: u64) -> Value {
    json!({
        "id": i,
        "customer": format!("c-{}", i % 50),
        "total": i as f64 * 1.25,
        "items": [{"sku": "a", "qty": 1}, {"sku": "b", "qty": 2}],
        "shipping": {"city": "Lisbon", "express": i % 2 == 0}
    })
}

fn make_string_heavy(i: u64) -> Value {
    json!({
        "uid": "1f0e2b1a-4c5d-4e6f-8a9b-0c1d2e3f4a5b",
        "created_at": "2024-03-01T12:30:00Z",
        "blob": "aGVsbG8gd29ybGQ=",
        "note": format!("note number {i}")
    })
}

fn batch_of(f: fn(u64) -> Value, offset: u64) -> Vec<Vec<u8>> {
    (0..BATCH as u64)
        .map(|i| serde_json::to_vec(&f(offset + i)).unwrap())
        .collect()
}

fn accumulator(detect: DetectorConfig) -> SchemaAccumulator {
    SchemaAccumulator::new("bench", detect, ConflictPolicy::Fail)
}

fn bench_stable_batches(c: &mut Criterion) {
    let mut group = c.benchmark_group("stable_batches");
    group.throughput(Throughput::Elements(10 * BATCH as u64));

    let batches: Vec<_> =
        (0..10).map(|n| batch_of(make_order, n * BATCH as u64)).collect();

    for depth in [0usize, 10] {
        group.bench_with_input(
            BenchmarkId::new("evolve", depth),
            &depth,
            |b, &depth| {
                b.iter_batched(
                    || accumulator(DetectorConfig::default()),
                    |mut acc| {
                        for batch in &batches {
                            black_box(
                                acc.evolve(batch, &[], &[], depth).unwrap(),
                            );
                        }
                    },
                    criterion::BatchSize::SmallInput,
                );
            },
        );
    }

    group.finish();
}

fn bench_widening_batches(c: &mut Criterion) {
    let mut group = c.benchmark_group("widening_batches");
    group.throughput(Throughput::Elements(10 * BATCH as u64));

    let batches: Vec<Vec<Value>> = (0..10u64)
        .map(|n| {
            (0..BATCH as u64)
                .map(|i| {
                    let mut doc = make_order(i);
                    doc[format!("extra_{n}")] = json!(i);
                    doc
                })
                .collect()
        })
        .collect();

    group.bench_function("evolve_values", |b| {
        b.iter_batched(
            || accumulator(DetectorConfig::default()),
            |mut acc| {
                for batch in &batches {
                    black_box(acc.evolve_values(batch, &[], &[], 0).unwrap());
                }
            },
            criterion::BatchSize::SmallInput,
        );
    });

    group.finish();
}

fn bench_detectors(c: &mut Criterion) {
    let mut group = c.benchmark_group("detectors");
    group.throughput(Throughput::Elements(BATCH as u64));

    let batch = batch_of(make_string_heavy, 0);
    let all_on = DetectorConfig {
        byte_arrays: true,
        ..Default::default()
    };

    for (label, detect) in [("plain", DetectorConfig::plain()), ("all", all_on)]
    {
        group.bench_with_input(
            BenchmarkId::new("evolve", label),
            &detect,
            |b, detect| {
                b.iter_batched(
                    || accumulator(*detect),
                    |mut acc| {
                        black_box(acc.evolve(&batch, &[], &[], 0).unwrap())
                    },
                    criterion::BatchSize::SmallInput,
                );
            },
        );
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_stable_batches,
    bench_widening_batches,
    bench_detectors
);
criterion_main!(benches);
