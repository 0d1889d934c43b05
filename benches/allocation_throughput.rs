//! Benchmarks for pool consumption, counters and code generation.
//!
//! Run with: cargo bench
//! View results in: target/criterion/report/index.html

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion};
use refnum::codec::CodeEncoder;
use refnum::config::GeneratorConfig;
use refnum::contracts::{
    Environment, NumberPool, ProductId, ReferenceKind, Scope, SequenceCounterStore, TenantId,
    UseCase,
};
use refnum::generator::ReferenceNumberGenerator;
use refnum::storage::{ReferenceNumberPool, RocksDbSequenceCounter, RocksDbStore};
use tempfile::TempDir;

fn create_store() -> (Arc<RocksDbStore>, TempDir) {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(RocksDbStore::open_at(dir.path()).unwrap());
    (store, dir)
}

fn scope() -> Scope {
    Scope::new(TenantId::new(), ProductId::new(), Environment::Development)
}

// =============================================================================
// Codec
// =============================================================================

fn bench_encode(c: &mut Criterion) {
    let encoder = CodeEncoder::new();
    let mut seed = 0u64;

    c.bench_function("encode", |b| {
        b.iter(|| {
            seed = (seed + 1) % CodeEncoder::CAPACITY;
            encoder.encode(black_box(seed)).unwrap()
        });
    });

    let code = encoder.encode(123_456).unwrap();
    c.bench_function("decode", |b| {
        b.iter(|| encoder.decode(black_box(&code)).unwrap());
    });
}

// =============================================================================
// Pool
// =============================================================================

fn bench_load(c: &mut Criterion) {
    let mut group = c.benchmark_group("pool_load");

    for size in [100usize, 1_000, 10_000] {
        let numbers: Vec<String> = (0..size).map(|i| format!("POL-{i:08}")).collect();
        group.bench_with_input(BenchmarkId::from_parameter(size), &numbers, |b, numbers| {
            b.iter_batched(
                create_store,
                |(store, _dir)| {
                    let pool = ReferenceNumberPool::new(store, ReferenceKind::Policy);
                    pool.load_for_product(&scope(), black_box(numbers)).unwrap()
                },
                BatchSize::PerIteration,
            );
        });
    }

    group.finish();
}

fn bench_consume(c: &mut Criterion) {
    let (store, _dir) = create_store();
    let pool = ReferenceNumberPool::new(store, ReferenceKind::Invoice);
    let scope = scope();
    let mut next = 0u64;

    c.bench_function("pool_consume", |b| {
        b.iter_batched(
            || {
                next += 1;
                pool.load_for_product(&scope, &[format!("INV-{next:012}")])
                    .unwrap();
            },
            |_| pool.consume_for_product(&scope).unwrap(),
            BatchSize::SmallInput,
        );
    });
}

// =============================================================================
// Counters and generation
// =============================================================================

fn bench_sequence_next(c: &mut Criterion) {
    let (store, _dir) = create_store();
    let counter = RocksDbSequenceCounter::new(store);
    let scope = scope();

    c.bench_function("sequence_next", |b| {
        b.iter(|| counter.next(&scope, UseCase::QuoteNumber).unwrap());
    });
}

fn bench_generate(c: &mut Criterion) {
    let (store, _dir) = create_store();
    let scope = scope();
    let mut generator = ReferenceNumberGenerator::for_store(&store, GeneratorConfig::default());
    generator.set_properties(scope.tenant, scope.product, scope.environment);

    c.bench_function("generate", |b| {
        b.iter(|| generator.generate().unwrap());
    });
}

criterion_group!(
    benches,
    bench_encode,
    bench_load,
    bench_consume,
    bench_sequence_next,
    bench_generate
);
criterion_main!(benches);
