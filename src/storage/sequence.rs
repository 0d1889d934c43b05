use std::sync::Arc;

use crate::conflict::StructuredConflictInterpreter;
use crate::contracts::{
    ConstraintViolationInterpreter, Scope, SequenceCounterRecord, SequenceCounterStore,
    SequenceError, StorageError, Table, UseCase,
};
use crate::storage::rocksdb::RocksDbStore;

/// Durable per-key sequence counters stored under `seq:`.
///
/// `next` locks the counter row for the increment. A missing counter is
/// created at seed 0 with a unique insert; when two callers race on the
/// creation the loser gets a uniqueness violation, which the interpreter
/// recognizes, and it falls back to incrementing the winner's row.
pub struct RocksDbSequenceCounter {
    store: Arc<RocksDbStore>,
    interpreter: Arc<dyn ConstraintViolationInterpreter>,
}

impl RocksDbSequenceCounter {
    pub fn new(store: Arc<RocksDbStore>) -> Self {
        Self::with_interpreter(store, Arc::new(StructuredConflictInterpreter))
    }

    pub fn with_interpreter(
        store: Arc<RocksDbStore>,
        interpreter: Arc<dyn ConstraintViolationInterpreter>,
    ) -> Self {
        Self { store, interpreter }
    }

    fn record(scope: &Scope, use_case: UseCase, seed: u64) -> SequenceCounterRecord {
        SequenceCounterRecord {
            tenant: scope.tenant,
            product: scope.product,
            environment: scope.environment,
            use_case,
            seed,
        }
    }

    fn decode(bytes: &[u8]) -> Result<SequenceCounterRecord, StorageError> {
        Ok(bincode::deserialize(bytes)?)
    }

    /// Increments an existing counter. `None` if the counter does not exist yet.
    fn try_increment(&self, scope: &Scope, use_case: UseCase) -> Result<Option<u64>, SequenceError> {
        let key = RocksDbStore::counter_key(scope, use_case);
        let txn = self.store.transaction();

        let Some(bytes) = txn
            .get_for_update(key.as_bytes(), true)
            .map_err(StorageError::from)?
        else {
            return Ok(None);
        };

        let mut record = Self::decode(&bytes)?;
        record.seed = record.seed.checked_add(1).ok_or(SequenceError::Overflow)?;
        txn.put(key.as_bytes(), bincode::serialize(&record).map_err(StorageError::from)?)
            .map_err(StorageError::from)?;
        txn.commit().map_err(StorageError::from)?;

        Ok(Some(record.seed))
    }

    /// Creates the counter at seed 0.
    fn try_create(&self, scope: &Scope, use_case: UseCase) -> Result<u64, StorageError> {
        let key = RocksDbStore::counter_key(scope, use_case);
        let bytes = bincode::serialize(&Self::record(scope, use_case, 0))?;
        let txn = self.store.transaction();

        RocksDbStore::insert_unique(&txn, &key, &bytes, || {
            RocksDbStore::unique_violation(Table::SequenceCounters, scope, None, use_case.as_str())
        })?;
        txn.commit()?;
        Ok(0)
    }

    fn next_once(&self, scope: &Scope, use_case: UseCase) -> Result<u64, SequenceError> {
        if let Some(seed) = self.try_increment(scope, use_case)? {
            return Ok(seed);
        }

        match self.try_create(scope, use_case) {
            Ok(seed) => {
                tracing::debug!(
                    tenant = %scope.tenant,
                    product = %scope.product,
                    environment = %scope.environment,
                    use_case = %use_case,
                    "Created sequence counter"
                );
                Ok(seed)
            }
            Err(err) => {
                let conflict =
                    self.interpreter
                        .interpret(scope, Table::SequenceCounters, None, &err);
                if !conflict.succeeded {
                    return Err(err.into());
                }

                self.store.metrics().sequence.record_create_race();
                tracing::debug!(
                    use_case = %use_case,
                    "Counter created concurrently, incrementing instead"
                );
                // The row is committed by the winner, so it is visible now.
                self.try_increment(scope, use_case)?.ok_or_else(|| {
                    SequenceError::Storage(StorageError::WriteConflict(
                        "sequence counter vanished after create race".into(),
                    ))
                })
            }
        }
    }
}

impl SequenceCounterStore for RocksDbSequenceCounter {
    fn next(&self, scope: &Scope, use_case: UseCase) -> Result<u64, SequenceError> {
        let seed = self
            .store
            .config()
            .retry
            .run("sequence next", || self.next_once(scope, use_case))?;
        self.store.metrics().sequence.record_issued();
        Ok(seed)
    }

    fn current(&self, scope: &Scope, use_case: UseCase) -> Result<Option<u64>, SequenceError> {
        let key = RocksDbStore::counter_key(scope, use_case);
        match self.store.get(&key)? {
            Some(bytes) => Ok(Some(Self::decode(&bytes)?.seed)),
            None => Ok(None),
        }
    }

    fn reset(&self, scope: &Scope, use_case: UseCase) -> Result<bool, SequenceError> {
        let key = RocksDbStore::counter_key(scope, use_case);
        let txn = self.store.transaction();
        let existed = txn
            .get_for_update(key.as_bytes(), true)
            .map_err(StorageError::from)?
            .is_some();
        if existed {
            txn.delete(key.as_bytes()).map_err(StorageError::from)?;
        }
        txn.commit().map_err(StorageError::from)?;

        tracing::warn!(
            tenant = %scope.tenant,
            product = %scope.product,
            environment = %scope.environment,
            use_case = %use_case,
            existed,
            "Reset sequence counter"
        );
        Ok(existed)
    }
}
