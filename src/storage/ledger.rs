use std::sync::Arc;

use crate::contracts::{IssuedNumberLedger, IssuedNumberRecord, Scope, StorageError, Table, UseCase};
use crate::storage::rocksdb::RocksDbStore;

/// Issued codes stored under `iss:`, one key per `(scope, use_case, number)`.
pub struct RocksDbIssuedLedger {
    store: Arc<RocksDbStore>,
}

impl RocksDbIssuedLedger {
    pub fn new(store: Arc<RocksDbStore>) -> Self {
        Self { store }
    }

    fn reserve_once(
        &self,
        scope: &Scope,
        use_case: UseCase,
        record: &IssuedNumberRecord,
    ) -> Result<(), StorageError> {
        if record.number.is_empty() {
            return Err(StorageError::InvalidInput("issued number must not be empty".into()));
        }

        let key = RocksDbStore::issued_key(scope, use_case, &record.number);
        let bytes = bincode::serialize(record)?;
        let txn = self.store.transaction();

        RocksDbStore::insert_unique(&txn, &key, &bytes, || {
            RocksDbStore::unique_violation(
                Table::IssuedNumbers,
                scope,
                Some(use_case.as_str()),
                &record.number,
            )
        })?;
        txn.commit()?;
        Ok(())
    }
}

impl IssuedNumberLedger for RocksDbIssuedLedger {
    fn reserve(
        &self,
        scope: &Scope,
        use_case: UseCase,
        record: &IssuedNumberRecord,
    ) -> Result<(), StorageError> {
        self.store
            .config()
            .retry
            .run("ledger reserve", || self.reserve_once(scope, use_case, record))
    }

    fn get(
        &self,
        scope: &Scope,
        use_case: UseCase,
        number: &str,
    ) -> Result<Option<IssuedNumberRecord>, StorageError> {
        let key = RocksDbStore::issued_key(scope, use_case, number);
        match self.store.get(&key)? {
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes)?)),
            None => Ok(None),
        }
    }

    fn list(
        &self,
        scope: &Scope,
        use_case: UseCase,
    ) -> Result<Vec<IssuedNumberRecord>, StorageError> {
        let prefix = RocksDbStore::issued_prefix(scope, use_case);
        self.store
            .scan(&prefix, usize::MAX)?
            .into_iter()
            .map(|(_, bytes)| bincode::deserialize(&bytes).map_err(StorageError::from))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contracts::{Environment, ProductId, TenantId};
    use tempfile::TempDir;

    fn create_test_ledger() -> (RocksDbIssuedLedger, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(RocksDbStore::open_at(dir.path()).unwrap());
        (RocksDbIssuedLedger::new(store), dir)
    }

    fn issued(number: &str, seed: Option<u64>) -> IssuedNumberRecord {
        IssuedNumberRecord {
            number: number.to_string(),
            seed,
        }
    }

    #[test]
    fn reserve_then_get() {
        let (ledger, _dir) = create_test_ledger();
        let scope = Scope::new(TenantId::new(), ProductId::new(), Environment::Staging);

        ledger
            .reserve(&scope, UseCase::QuoteNumber, &issued("8RU2CE", Some(0)))
            .unwrap();

        assert_eq!(
            ledger.get(&scope, UseCase::QuoteNumber, "8RU2CE").unwrap(),
            Some(issued("8RU2CE", Some(0)))
        );
        assert_eq!(ledger.get(&scope, UseCase::QuoteNumber, "UYUMG7").unwrap(), None);
    }

    #[test]
    fn duplicate_reserve_is_a_unique_violation() {
        let (ledger, _dir) = create_test_ledger();
        let scope = Scope::new(TenantId::new(), ProductId::new(), Environment::Development);

        ledger
            .reserve(&scope, UseCase::QuoteNumber, &issued("ABC234", None))
            .unwrap();
        let err = ledger
            .reserve(&scope, UseCase::QuoteNumber, &issued("ABC234", Some(9)))
            .unwrap_err();

        assert_eq!(
            err,
            StorageError::UniqueViolation {
                table: Table::IssuedNumbers,
                key: format!("{scope}, quote_number"),
                value: "ABC234".into(),
            }
        );
        // First reservation wins.
        assert_eq!(
            ledger.get(&scope, UseCase::QuoteNumber, "ABC234").unwrap(),
            Some(issued("ABC234", None))
        );
    }

    #[test]
    fn same_number_in_other_scope_is_allowed() {
        let (ledger, _dir) = create_test_ledger();
        let scope = Scope::new(TenantId::new(), ProductId::new(), Environment::Development);
        let other = Scope::new(TenantId::new(), scope.product, Environment::Development);

        ledger.reserve(&scope, UseCase::QuoteNumber, &issued("ABC234", None)).unwrap();
        ledger.reserve(&other, UseCase::QuoteNumber, &issued("ABC234", None)).unwrap();

        assert_eq!(ledger.list(&scope, UseCase::QuoteNumber).unwrap().len(), 1);
        assert_eq!(ledger.list(&other, UseCase::QuoteNumber).unwrap().len(), 1);
    }

    #[test]
    fn empty_number_is_rejected() {
        let (ledger, _dir) = create_test_ledger();
        let scope = Scope::new(TenantId::new(), ProductId::new(), Environment::Development);
        let err = ledger
            .reserve(&scope, UseCase::QuoteNumber, &issued("", None))
            .unwrap_err();
        assert!(matches!(err, StorageError::InvalidInput(_)));
    }
}
