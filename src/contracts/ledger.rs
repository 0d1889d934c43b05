use crate::contracts::error::StorageError;
use crate::contracts::schema::{IssuedNumberRecord, Scope, UseCase};

/// Every code handed out for a `(scope, use_case)` key, unique per key.
pub trait IssuedNumberLedger: Send + Sync {
    /// Records `record.number` as issued.
    ///
    /// Fails with [`StorageError::UniqueViolation`] on `issued_numbers` if the
    /// number is already recorded for the key.
    fn reserve(
        &self,
        scope: &Scope,
        use_case: UseCase,
        record: &IssuedNumberRecord,
    ) -> Result<(), StorageError>;

    fn get(
        &self,
        scope: &Scope,
        use_case: UseCase,
        number: &str,
    ) -> Result<Option<IssuedNumberRecord>, StorageError>;

    /// All issued numbers for the key, in key order.
    fn list(&self, scope: &Scope, use_case: UseCase)
        -> Result<Vec<IssuedNumberRecord>, StorageError>;
}
