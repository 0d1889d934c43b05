use thiserror::Error;

use crate::contracts::schema::{ReferenceKind, Scope, Table};

#[derive(Error, Debug)]
pub enum RefNumError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Pool error: {0}")]
    Pool(#[from] PoolError),

    #[error("Sequence error: {0}")]
    Sequence(#[from] SequenceError),

    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("Generator error: {0}")]
    Generator(#[from] GeneratorError),
}

/// Returned when parsing one of the scope enums from text.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown {kind}: {value}")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    #[error("RocksDB error: {0}")]
    RocksDb(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Another transaction holds or changed the row. Safe to retry.
    #[error("Write conflict: {0}")]
    WriteConflict(String),

    /// Lock wait exceeded the configured timeout. Safe to retry.
    #[error("Timed out: {0}")]
    Timeout(String),

    /// Rendered like a relational store's duplicate-key diagnostic.
    #[error(
        "duplicate key value violates unique constraint \"{constraint}\": Key ({columns})=({key}, {value}) already exists.",
        constraint = .table.constraint_name(),
        columns = .table.key_columns()
    )]
    UniqueViolation {
        table: Table,
        key: String,
        value: String,
    },
}

impl StorageError {
    /// Conflicts and lock timeouts clear up on their own; everything else does not.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::WriteConflict(_) | Self::Timeout(_))
    }
}

impl From<rocksdb::Error> for StorageError {
    fn from(err: rocksdb::Error) -> Self {
        use rocksdb::ErrorKind;

        match err.kind() {
            ErrorKind::Busy | ErrorKind::TryAgain => Self::WriteConflict(err.into_string()),
            ErrorKind::TimedOut | ErrorKind::Expired => Self::Timeout(err.into_string()),
            _ => Self::RocksDb(err.into_string()),
        }
    }
}

impl From<bincode::Error> for StorageError {
    fn from(err: bincode::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PoolError {
    #[error("No unassigned {kind} number available for ({scope})")]
    ReferenceNumberUnavailable { scope: Scope, kind: ReferenceKind },

    #[error(transparent)]
    Storage(#[from] StorageError),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SequenceError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("Sequence overflow")]
    Overflow,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("Sequence space exhausted: seed {seed} exceeds capacity {capacity}")]
    SequenceSpaceExhausted { seed: u64, capacity: u64 },

    #[error("Invalid code length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    #[error("Invalid character {0:?} in code")]
    InvalidCharacter(char),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GeneratorError {
    #[error("Generator is not bound to a scope")]
    Unbound,

    #[error("Sequence generation failed after {attempts} attempts, last conflicting value {conflicting_value:?}")]
    SequenceGenerationFailed {
        attempts: usize,
        conflicting_value: Option<String>,
    },

    #[error("Sequence space exhausted: seed {seed} exceeds capacity {capacity}")]
    SequenceSpaceExhausted { seed: u64, capacity: u64 },

    #[error(transparent)]
    Codec(CodecError),

    #[error(transparent)]
    Sequence(#[from] SequenceError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl From<CodecError> for GeneratorError {
    fn from(err: CodecError) -> Self {
        match err {
            CodecError::SequenceSpaceExhausted { seed, capacity } => {
                Self::SequenceSpaceExhausted { seed, capacity }
            }
            other => Self::Codec(other),
        }
    }
}
