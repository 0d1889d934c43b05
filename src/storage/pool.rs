use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use std::time::Instant;

use crate::contracts::{
    NumberPool, PoolError, ReferenceKind, ReferenceNumberRecord, Scope, StorageError, Table,
};
use crate::storage::rocksdb::{RocksDbStore, Txn};

/// Candidates read from the availability index per scan.
const CANDIDATE_BATCH: usize = 16;
/// Numbers handled per transaction by load, delete and purge.
const CHUNK_SIZE: usize = 1_000;

/// Pre-loaded reference numbers of one [`ReferenceKind`], backed by [`RocksDbStore`].
///
/// Each record lives under `ref:` and, while unassigned, has a twin key under
/// `avl:`. Both are written in the same transaction, and the `ref:` row lock
/// is always taken first.
pub struct ReferenceNumberPool {
    store: Arc<RocksDbStore>,
    kind: ReferenceKind,
}

impl ReferenceNumberPool {
    pub fn new(store: Arc<RocksDbStore>, kind: ReferenceKind) -> Self {
        Self { store, kind }
    }

    /// Distinct, non-empty numbers in key order, so batches lock rows in a fixed order.
    fn distinct_sorted(numbers: &[String]) -> Vec<&str> {
        numbers
            .iter()
            .map(String::as_str)
            .filter(|n| !n.is_empty())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    fn decode(bytes: &[u8]) -> Result<ReferenceNumberRecord, StorageError> {
        Ok(bincode::deserialize(bytes)?)
    }

    fn load_chunk(&self, scope: &Scope, numbers: &[&str]) -> Result<usize, StorageError> {
        let txn = self.store.transaction();
        let mut inserted = 0;

        for &number in numbers {
            let record = ReferenceNumberRecord::unassigned(scope, self.kind, number);
            let bytes = bincode::serialize(&record)?;
            let key = RocksDbStore::record_key(scope, self.kind, number);

            let result = RocksDbStore::insert_unique(&txn, &key, &bytes, || {
                RocksDbStore::unique_violation(
                    Table::ReferenceNumbers,
                    scope,
                    Some(self.kind.as_str()),
                    number,
                )
            });
            match result {
                Ok(()) => {
                    txn.put(RocksDbStore::available_key(scope, self.kind, number), b"")?;
                    inserted += 1;
                }
                // Already present for this exact scope: skipped, not an error.
                Err(StorageError::UniqueViolation { .. }) => {}
                Err(e) => return Err(e),
            }
        }

        txn.commit()?;
        Ok(inserted)
    }

    /// Locks `number`'s record and assigns it if it is still unassigned.
    ///
    /// Returns `None` when another consumer got there first (or the number was
    /// deleted meanwhile); the stale index entry is dropped in that case.
    fn try_claim(&self, scope: &Scope, number: &str) -> Result<Option<String>, StorageError> {
        let txn = self.store.transaction();
        let record_key = RocksDbStore::record_key(scope, self.kind, number);
        let available_key = RocksDbStore::available_key(scope, self.kind, number);

        let claimed = match txn.get_for_update(record_key.as_bytes(), true)? {
            Some(bytes) => {
                let mut record = Self::decode(&bytes)?;
                if record.is_assigned {
                    false
                } else {
                    record.is_assigned = true;
                    txn.put(record_key.as_bytes(), bincode::serialize(&record)?)?;
                    true
                }
            }
            None => false,
        };

        txn.delete(available_key.as_bytes())?;
        txn.commit()?;

        Ok(claimed.then(|| number.to_string()))
    }

    fn consume_once(&self, scope: &Scope) -> Result<String, PoolError> {
        let prefix = RocksDbStore::available_prefix(scope, self.kind);
        let metrics = &self.store.metrics().pool;
        let mut contended: HashSet<String> = HashSet::new();

        loop {
            let candidates: Vec<String> = self
                .store
                .scan_suffixes(&prefix, CANDIDATE_BATCH + contended.len())?
                .into_iter()
                .filter(|n| !contended.contains(n))
                .collect();

            if candidates.is_empty() {
                metrics.record_unavailable();
                tracing::warn!(
                    tenant = %scope.tenant,
                    product = %scope.product,
                    environment = %scope.environment,
                    kind = %self.kind,
                    "Reference number pool exhausted"
                );
                return Err(PoolError::ReferenceNumberUnavailable {
                    scope: *scope,
                    kind: self.kind,
                });
            }

            for number in candidates {
                if let Some(number) = self.try_claim(scope, &number)? {
                    return Ok(number);
                }
                metrics.record_candidate_conflict();
                tracing::debug!(
                    kind = %self.kind,
                    number = %number,
                    "Candidate already assigned by a concurrent consumer"
                );
                contended.insert(number);
            }
        }
    }

    fn delete_chunk(&self, scope: &Scope, numbers: &[&str]) -> Result<Vec<String>, StorageError> {
        let txn = self.store.transaction();
        let mut deleted = Vec::new();

        for &number in numbers {
            let record_key = RocksDbStore::record_key(scope, self.kind, number);
            let Some(bytes) = txn.get_for_update(record_key.as_bytes(), true)? else {
                continue;
            };
            if Self::decode(&bytes)?.is_assigned {
                continue;
            }
            txn.delete(record_key.as_bytes())?;
            txn.delete(RocksDbStore::available_key(scope, self.kind, number).as_bytes())?;
            deleted.push(number.to_string());
        }

        txn.commit()?;
        Ok(deleted)
    }

    fn purge_chunk(&self, scope: &Scope, numbers: &[String]) -> Result<usize, StorageError> {
        let txn = self.store.transaction();
        let mut removed = 0;

        for number in numbers {
            let record_key = RocksDbStore::record_key(scope, self.kind, number);
            if txn.get_for_update(record_key.as_bytes(), true)?.is_some() {
                txn.delete(record_key.as_bytes())?;
                removed += 1;
            }
            txn.delete(RocksDbStore::available_key(scope, self.kind, number).as_bytes())?;
        }

        txn.commit()?;
        Ok(removed)
    }

    fn purge_orphaned_index(&self, scope: &Scope) -> Result<(), StorageError> {
        let prefix = RocksDbStore::available_prefix(scope, self.kind);
        for chunk in self.store.scan_suffixes(&prefix, usize::MAX)?.chunks(CHUNK_SIZE) {
            let txn: Txn<'_> = self.store.transaction();
            for number in chunk {
                txn.delete(RocksDbStore::available_key(scope, self.kind, number).as_bytes())?;
            }
            txn.commit()?;
        }
        Ok(())
    }
}

impl NumberPool for ReferenceNumberPool {
    fn kind(&self) -> ReferenceKind {
        self.kind
    }

    fn load_for_product(&self, scope: &Scope, numbers: &[String]) -> Result<usize, PoolError> {
        let distinct = Self::distinct_sorted(numbers);
        let retry = &self.store.config().retry;

        let mut inserted = 0;
        for chunk in distinct.chunks(CHUNK_SIZE) {
            inserted += retry.run("pool load", || self.load_chunk(scope, chunk))?;
        }

        self.store.metrics().pool.record_loaded(inserted);
        tracing::info!(
            tenant = %scope.tenant,
            product = %scope.product,
            environment = %scope.environment,
            kind = %self.kind,
            requested = numbers.len(),
            inserted,
            skipped = distinct.len() - inserted,
            "Loaded reference numbers"
        );
        Ok(inserted)
    }

    fn consume_for_product(&self, scope: &Scope) -> Result<String, PoolError> {
        let start = Instant::now();
        let result = self
            .store
            .config()
            .retry
            .run("pool consume", || self.consume_once(scope));

        let metrics = &self.store.metrics().pool;
        metrics.consume_latency_us.observe_since(start);
        if let Ok(number) = &result {
            metrics.record_consumed(self.kind);
            tracing::debug!(
                tenant = %scope.tenant,
                product = %scope.product,
                environment = %scope.environment,
                kind = %self.kind,
                number = %number,
                "Assigned reference number"
            );
        }
        result
    }

    fn delete_for_product(
        &self,
        scope: &Scope,
        numbers: &[String],
    ) -> Result<Vec<String>, PoolError> {
        let distinct = Self::distinct_sorted(numbers);
        let retry = &self.store.config().retry;

        let mut deleted = Vec::new();
        for chunk in distinct.chunks(CHUNK_SIZE) {
            deleted.extend(retry.run("pool delete", || self.delete_chunk(scope, chunk))?);
        }

        self.store.metrics().pool.record_deleted(deleted.len());
        tracing::info!(
            tenant = %scope.tenant,
            product = %scope.product,
            environment = %scope.environment,
            kind = %self.kind,
            requested = numbers.len(),
            deleted = deleted.len(),
            "Deleted unassigned reference numbers"
        );
        Ok(deleted)
    }

    fn purge_for_product(&self, scope: &Scope) -> Result<usize, PoolError> {
        let prefix = RocksDbStore::record_prefix(scope, self.kind);
        let numbers = self.store.scan_suffixes(&prefix, usize::MAX)?;
        let retry = &self.store.config().retry;

        let mut removed = 0;
        for chunk in numbers.chunks(CHUNK_SIZE) {
            removed += retry.run("pool purge", || self.purge_chunk(scope, chunk))?;
        }
        retry.run("pool purge index", || self.purge_orphaned_index(scope))?;

        self.store.metrics().pool.record_purged(removed);
        tracing::info!(
            tenant = %scope.tenant,
            product = %scope.product,
            environment = %scope.environment,
            kind = %self.kind,
            removed,
            "Purged reference numbers"
        );
        Ok(removed)
    }

    fn get_available_for_product(&self, scope: &Scope) -> Result<Vec<String>, PoolError> {
        let prefix = RocksDbStore::available_prefix(scope, self.kind);
        Ok(self.store.scan_suffixes(&prefix, usize::MAX)?)
    }

    fn records_for_product(&self, scope: &Scope) -> Result<Vec<ReferenceNumberRecord>, PoolError> {
        let prefix = RocksDbStore::record_prefix(scope, self.kind);
        self.store
            .scan(&prefix, usize::MAX)?
            .into_iter()
            .map(|(_, bytes)| Self::decode(&bytes).map_err(PoolError::from))
            .collect()
    }
}
