//! Restart tests: state written before the store is closed is there after reopening.
//!
//! Run with: cargo test --test crash_recovery_tests

use std::sync::Arc;

use refnum::config::GeneratorConfig;
use refnum::contracts::{
    Environment, NumberPool, ProductId, ReferenceKind, Scope, SequenceCounterStore, TenantId,
    UseCase,
};
use refnum::generator::ReferenceNumberGenerator;
use refnum::storage::{ReferenceNumberPool, RocksDbSequenceCounter, RocksDbStore};
use tempfile::TempDir;

fn open_store_at(dir: &std::path::Path) -> Arc<RocksDbStore> {
    Arc::new(RocksDbStore::open_at(dir).expect("Failed to open store"))
}

fn scope() -> Scope {
    Scope::new(TenantId::new(), ProductId::new(), Environment::Production)
}

#[test]
fn assigned_numbers_stay_assigned_after_restart() {
    let dir = TempDir::new().unwrap();
    let scope = scope();
    let loaded: Vec<String> = (0..10).map(|i| format!("POL-{i}")).collect();

    // Phase 1: load and consume some
    let consumed: Vec<String> = {
        let pool = ReferenceNumberPool::new(open_store_at(dir.path()), ReferenceKind::Policy);
        pool.load_for_product(&scope, &loaded).unwrap();
        (0..4).map(|_| pool.consume_for_product(&scope).unwrap()).collect()
        // Store dropped here
    };

    // Phase 2: reopen and verify
    let pool = ReferenceNumberPool::new(open_store_at(dir.path()), ReferenceKind::Policy);
    let available = pool.get_available_for_product(&scope).unwrap();
    assert_eq!(available.len(), 6);
    assert!(consumed.iter().all(|n| !available.contains(n)));

    let records = pool.records_for_product(&scope).unwrap();
    assert_eq!(records.len(), 10);
    assert_eq!(records.iter().filter(|r| r.is_assigned).count(), 4);

    let next = pool.consume_for_product(&scope).unwrap();
    assert!(!consumed.contains(&next));
}

#[test]
fn counters_continue_after_restart() {
    let dir = TempDir::new().unwrap();
    let scope = scope();

    {
        let counter = RocksDbSequenceCounter::new(open_store_at(dir.path()));
        for expected in 0..5 {
            assert_eq!(counter.next(&scope, UseCase::QuoteNumber).unwrap(), expected);
        }
    }

    let counter = RocksDbSequenceCounter::new(open_store_at(dir.path()));
    assert_eq!(counter.current(&scope, UseCase::QuoteNumber).unwrap(), Some(4));
    assert_eq!(counter.next(&scope, UseCase::QuoteNumber).unwrap(), 5);
}

#[test]
fn generated_codes_are_not_reissued_after_restart() {
    let dir = TempDir::new().unwrap();
    let scope = scope();

    let before: Vec<String> = {
        let store = open_store_at(dir.path());
        let mut generator = ReferenceNumberGenerator::for_store(&store, GeneratorConfig::default());
        generator.set_properties(scope.tenant, scope.product, scope.environment);
        (0..5).map(|_| generator.generate().unwrap()).collect()
    };

    let store = open_store_at(dir.path());
    let mut generator = ReferenceNumberGenerator::for_store(&store, GeneratorConfig::default());
    generator.set_properties(scope.tenant, scope.product, scope.environment);

    for code in &before {
        assert!(generator.issued(code).unwrap().is_some());
    }
    let after = generator.generate().unwrap();
    assert!(!before.contains(&after));
}

#[test]
fn loaded_numbers_survive_restart_unassigned() {
    let dir = TempDir::new().unwrap();
    let scope = scope();

    {
        let pool = ReferenceNumberPool::new(open_store_at(dir.path()), ReferenceKind::Invoice);
        pool.load_for_product(&scope, &["INV-1".to_string()]).unwrap();
    }

    let pool = ReferenceNumberPool::new(open_store_at(dir.path()), ReferenceKind::Invoice);
    assert_eq!(pool.get_available_for_product(&scope).unwrap(), vec!["INV-1"]);
    assert!(pool.records_for_product(&scope).unwrap().iter().all(|r| !r.is_assigned));
}
