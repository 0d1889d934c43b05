pub mod conflict;
pub mod error;
pub mod ledger;
pub mod pool;
pub mod schema;
pub mod sequence;

pub use conflict::ConstraintViolationInterpreter;
pub use error::{
    CodecError, GeneratorError, PoolError, RefNumError, SequenceError, StorageError,
    UnknownVariant,
};
pub use ledger::IssuedNumberLedger;
pub use pool::NumberPool;
pub use schema::{
    ConflictDescriptor, Environment, IssuedNumberRecord, ProductId, ReferenceKind,
    ReferenceNumberRecord, Scope, SequenceCounterRecord, Table, TenantId, UseCase,
};
pub use sequence::SequenceCounterStore;
