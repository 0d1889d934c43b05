//! Uniqueness-conflict interpretation.
//!
//! The RocksDB store reports duplicate keys as a structured
//! [`StorageError::UniqueViolation`], so [`StructuredConflictInterpreter`] reads
//! the fields directly. [`DiagnosticTextInterpreter`] covers stores that only
//! hand back the rendered `duplicate key value violates unique constraint`
//! message; all of the text parsing lives here and nowhere else.

use crate::contracts::{ConflictDescriptor, ConstraintViolationInterpreter, Scope, StorageError, Table};

const DUPLICATE_KEY_MARKER: &str = "duplicate key value violates unique constraint \"";
const KEY_DETAIL_MARKER: &str = "Key (";
const ALREADY_EXISTS_MARKER: &str = ") already exists";

/// Returns true if a rendered key prefix (all key columns but the last) is
/// exactly `scope` followed by `qualifier`, the kind or use-case column.
fn key_matches(scope: &Scope, qualifier: Option<&str>, key: &str) -> bool {
    let scope_key = scope.to_string();
    match (key.strip_prefix(scope_key.as_str()), qualifier) {
        (Some(rest), Some(qualifier)) => rest.strip_prefix(", ") == Some(qualifier),
        (Some(rest), None) => rest.is_empty(),
        (None, _) => false,
    }
}

/// Reads conflict details straight from [`StorageError::UniqueViolation`].
#[derive(Debug, Clone, Copy, Default)]
pub struct StructuredConflictInterpreter;

impl ConstraintViolationInterpreter for StructuredConflictInterpreter {
    fn interpret(
        &self,
        scope: &Scope,
        table: Table,
        qualifier: Option<&str>,
        error: &StorageError,
    ) -> ConflictDescriptor {
        match error {
            StorageError::UniqueViolation {
                table: violated,
                key,
                value,
            } if *violated == table && key_matches(scope, qualifier, key) => {
                ConflictDescriptor::conflict(value.clone())
            }
            _ => ConflictDescriptor::unrecognized(),
        }
    }
}

/// Recovers conflict details from a duplicate-key diagnostic message.
///
/// Expects the conventional shape
/// `duplicate key value violates unique constraint "<table>_pkey" ... Key (<cols>)=(<vals>) already exists.`
/// where the last column is the value that collided. Anything else is reported
/// as unrecognized.
#[derive(Debug, Clone, Copy, Default)]
pub struct DiagnosticTextInterpreter;

impl DiagnosticTextInterpreter {
    /// Parses `message` for a violation of `table` within `scope` and `qualifier`.
    pub fn parse(
        scope: &Scope,
        table: Table,
        qualifier: Option<&str>,
        message: &str,
    ) -> ConflictDescriptor {
        Self::parse_value(scope, table, qualifier, message)
            .map(ConflictDescriptor::conflict)
            .unwrap_or_default()
    }

    fn parse_value(
        scope: &Scope,
        table: Table,
        qualifier: Option<&str>,
        message: &str,
    ) -> Option<String> {
        let start = message.find(DUPLICATE_KEY_MARKER)? + DUPLICATE_KEY_MARKER.len();
        let rest = &message[start..];
        let constraint = &rest[..rest.find('"')?];
        if constraint != table.constraint_name() {
            return None;
        }

        let detail = &rest[rest.find(KEY_DETAIL_MARKER)? + KEY_DETAIL_MARKER.len()..];
        let (columns, values) = detail.split_once(")=(")?;
        let values = &values[..values.rfind(ALREADY_EXISTS_MARKER)?];

        if columns != table.key_columns() {
            return None;
        }
        let column_count = columns.split(", ").count();

        // The conflicting value is last and may itself contain separators.
        let mut parts: Vec<&str> = values.splitn(column_count, ", ").collect();
        if parts.len() != column_count {
            return None;
        }
        let value = parts.pop()?;
        if !key_matches(scope, qualifier, &parts.join(", ")) {
            return None;
        }

        Some(value.to_string())
    }
}

impl ConstraintViolationInterpreter for DiagnosticTextInterpreter {
    fn interpret(
        &self,
        scope: &Scope,
        table: Table,
        qualifier: Option<&str>,
        error: &StorageError,
    ) -> ConflictDescriptor {
        Self::parse(scope, table, qualifier, &error.to_string())
    }
}
