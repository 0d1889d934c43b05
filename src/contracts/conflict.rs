use crate::contracts::error::StorageError;
use crate::contracts::schema::{ConflictDescriptor, Scope, Table};

/// Turns a storage failure into a structured uniqueness-conflict descriptor.
///
/// `succeeded` is true only when the failure is a duplicate-key violation on
/// `table` for a row inside `scope` whose kind or use-case column equals
/// `qualifier` (`None` for tables keyed by scope alone); `conflicting_value`
/// then holds the value that collided.
pub trait ConstraintViolationInterpreter: Send + Sync {
    fn interpret(
        &self,
        scope: &Scope,
        table: Table,
        qualifier: Option<&str>,
        error: &StorageError,
    ) -> ConflictDescriptor;
}
