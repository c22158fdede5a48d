//! Performance benchmarks for chunked aggregation
//! Compares chunk sizes and worker policies against the sequential single pass

use chunkagg::config::{EngineConfig, Parallelism};
use chunkagg::engine::{partition, AggregationEngine, FinalAggregate, RangeSource, RecordSource};
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::hint::black_box;
use std::time::Duration;
use tokio::runtime::Runtime;

const RECORDS: i64 = 1_000_000;

fn bench_sequential_reference(c: &mut Criterion) {
    let records = RangeSource::new(1, RECORDS).records().unwrap();
    let mut group = c.benchmark_group("sequential");
    group.throughput(Throughput::Elements(RECORDS as u64));

    group.bench_function("single_pass", |b| {
        b.iter(|| FinalAggregate::from_records(black_box(&records)).unwrap())
    });

    group.finish();
}

fn bench_partition(c: &mut Criterion) {
    let records = RangeSource::new(1, RECORDS).records().unwrap();
    let mut group = c.benchmark_group("partition");

    for chunk_size in [1_000, 50_000, 250_000] {
        group.bench_with_input(
            BenchmarkId::from_parameter(chunk_size),
            &chunk_size,
            |b, &chunk_size| b.iter(|| partition(black_box(&records), chunk_size).unwrap()),
        );
    }

    group.finish();
}

fn bench_chunk_sizes(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let records = RangeSource::new(1, RECORDS).records().unwrap();
    let mut group = c.benchmark_group("parallel_chunk_size");
    group.throughput(Throughput::Elements(RECORDS as u64));
    group.measurement_time(Duration::from_secs(10));

    for chunk_size in [10_000, 62_500, 250_000] {
        let engine = AggregationEngine::new(EngineConfig::new(chunk_size)).unwrap();
        group.bench_with_input(
            BenchmarkId::from_parameter(chunk_size),
            &engine,
            |b, engine| {
                b.to_async(&rt)
                    .iter(|| async { engine.aggregate(records.clone()).await.unwrap() })
            },
        );
    }

    group.finish();
}

fn bench_worker_pool(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let records = RangeSource::new(1, RECORDS).records().unwrap();
    let mut group = c.benchmark_group("bounded_pool");
    group.throughput(Throughput::Elements(RECORDS as u64));

    for workers in [1, 2, 4, 8] {
        let config = EngineConfig::new(10_000).with_parallelism(Parallelism::Bounded(workers));
        let engine = AggregationEngine::new(config).unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(workers), &engine, |b, engine| {
            b.to_async(&rt)
                .iter(|| async { engine.aggregate(records.clone()).await.unwrap() })
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_sequential_reference,
    bench_partition,
    bench_chunk_sizes,
    bench_worker_pool
);
criterion_main!(benches);
