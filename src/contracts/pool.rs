use crate::contracts::error::PoolError;
use crate::contracts::schema::{ReferenceKind, ReferenceNumberRecord, Scope};

/// Finite, pre-provisioned sets of numbers, each consumable exactly once.
///
/// One implementation serves every [`ReferenceKind`]; the kind is fixed per
/// pool instance and the scope is passed per call.
///
/// # Invariants
/// - `(scope, kind, number)` is unique across records
/// - A number is returned by `consume_for_product` at most once, ever
/// - An assigned record never becomes unassigned
/// - Scopes are isolated: environments and products never share numbers
pub trait NumberPool: Send + Sync {
    /// Kind of number this pool hands out.
    fn kind(&self) -> ReferenceKind;

    /// Inserts each distinct number as unassigned, skipping any already present
    /// for the exact scope. Returns how many records were inserted.
    fn load_for_product(&self, scope: &Scope, numbers: &[String]) -> Result<usize, PoolError>;

    /// Atomically assigns one unassigned number for the scope and returns it.
    /// Fails with `ReferenceNumberUnavailable` when none is left.
    fn consume_for_product(&self, scope: &Scope) -> Result<String, PoolError>;

    /// Deletes the listed numbers that are still unassigned. Assigned and
    /// unknown numbers are skipped. Returns the numbers actually deleted.
    fn delete_for_product(&self, scope: &Scope, numbers: &[String])
        -> Result<Vec<String>, PoolError>;

    /// Deletes every record of the scope, assigned or not. Returns how many
    /// records were removed.
    fn purge_for_product(&self, scope: &Scope) -> Result<usize, PoolError>;

    /// Returns the unassigned numbers of the scope in a stable order.
    fn get_available_for_product(&self, scope: &Scope) -> Result<Vec<String>, PoolError>;

    /// Returns how many unassigned numbers the scope holds.
    fn available_count_for_product(&self, scope: &Scope) -> Result<usize, PoolError> {
        Ok(self.get_available_for_product(scope)?.len())
    }

    /// Returns every record of the scope, assigned or not.
    fn records_for_product(&self, scope: &Scope) -> Result<Vec<ReferenceNumberRecord>, PoolError>;
}
