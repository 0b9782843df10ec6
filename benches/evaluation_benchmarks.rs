//! Benchmarks for single-record evaluation
//!
//! These benchmarks measure:
//! - Registry construction from configuration
//! - Per-record evaluation
//! - Parallel vs sequential batch evaluation
//! - Record fingerprinting

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use frve::{CorpusGenerator, CorpusShape, Evaluator, Record, RecordHasher, ValidatorConfig};

fn corpus(records: usize) -> Vec<Record> {
    let members = 5;
    let shape = CorpusShape {
        entities: (records / (members * 2)).max(1),
        members,
        periods: 2,
        first_period: 2023,
    };
    CorpusGenerator::new(42).corpus(&shape)
}

fn bench_registry_construction(c: &mut Criterion) {
    let config = ValidatorConfig::default();
    c.bench_function("standard_registry", |b| {
        b.iter(|| black_box(Evaluator::standard(black_box(&config)).unwrap()))
    });
}

fn bench_single_record(c: &mut Criterion) {
    let evaluator = Evaluator::standard(&ValidatorConfig::default()).unwrap();
    let record = corpus(10).remove(0);

    c.bench_function("evaluate_record", |b| {
        b.iter(|| black_box(evaluator.evaluate(black_box(&record))))
    });
}

fn bench_batch(c: &mut Criterion) {
    let evaluator = Evaluator::standard(&ValidatorConfig::default()).unwrap();
    let mut group = c.benchmark_group("evaluate_batch");

    for size in [100usize, 1_000, 10_000].iter() {
        let records = corpus(*size);
        group.throughput(Throughput::Elements(records.len() as u64));

        group.bench_with_input(BenchmarkId::new("parallel", size), &records, |b, records| {
            b.iter(|| black_box(evaluator.evaluate_batch(records)))
        });
        group.bench_with_input(BenchmarkId::new("sequential", size), &records, |b, records| {
            b.iter(|| black_box(evaluator.evaluate_sequential(records)))
        });
    }

    group.finish();
}

fn bench_fingerprint(c: &mut Criterion) {
    let hasher = RecordHasher::new();
    let records = corpus(1_000);
    let mut group = c.benchmark_group("fingerprint");
    group.throughput(Throughput::Elements(records.len() as u64));

    group.bench_function("canonical", |b| {
        b.iter(|| {
            for record in &records {
                black_box(hasher.fingerprint(record));
            }
        })
    });
    group.bench_function("hash_chain", |b| {
        let fingerprints: Vec<_> = records.iter().map(|r| hasher.fingerprint(r)).collect();
        b.iter(|| black_box(hasher.hash_chain(&fingerprints)))
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_registry_construction,
    bench_single_record,
    bench_batch,
    bench_fingerprint
);
criterion_main!(benches);
