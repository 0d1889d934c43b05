#![no_main]

use std::sync::Arc;

use libfuzzer_sys::fuzz_target;
use refnum::contracts::{Environment, NumberPool, ProductId, ReferenceKind, Scope, TenantId};
use refnum::storage::{ReferenceNumberPool, RocksDbStore};
use tempfile::TempDir;

fuzz_target!(|data: &[u8]| {
    // Numbers with arbitrary characters, including separators and unicode.
    let dir = TempDir::new().unwrap();
    let store = Arc::new(RocksDbStore::open_at(dir.path()).unwrap());
    let pool = ReferenceNumberPool::new(store, ReferenceKind::Policy);
    let scope = Scope::new(TenantId::new(), ProductId::new(), Environment::Development);

    let numbers: Vec<String> = String::from_utf8_lossy(data)
        .split('\n')
        .map(str::to_string)
        .collect();

    let inserted = pool.load_for_product(&scope, &numbers).unwrap();
    assert_eq!(pool.get_available_for_product(&scope).unwrap().len(), inserted);

    for _ in 0..inserted {
        let number = pool.consume_for_product(&scope).unwrap();
        assert!(numbers.contains(&number));
    }
    assert!(pool.consume_for_product(&scope).is_err());
    assert_eq!(pool.purge_for_product(&scope).unwrap(), inserted);
});
