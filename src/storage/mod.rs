mod ledger;
mod pool;
mod retry;
mod rocksdb;
mod sequence;

pub use ledger::RocksDbIssuedLedger;
pub use pool::ReferenceNumberPool;
pub use retry::{RetryConfig, Transient};
pub use rocksdb::RocksDbStore;
pub use sequence::RocksDbSequenceCounter;
