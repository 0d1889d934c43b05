use std::path::Path;
use std::sync::Arc;

use rocksdb::{
    Direction, IteratorMode, Options, ReadOptions, Transaction, TransactionDB,
    TransactionDBOptions,
};

use crate::config::StoreConfig;
use crate::contracts::{ReferenceKind, Scope, StorageError, Table, UseCase};
use crate::metrics::MetricsRegistry;

/// Key prefix for reference-number records
const RECORD_PREFIX: &str = "ref";
/// Key prefix for the unassigned-number index
const AVAILABLE_PREFIX: &str = "avl";
/// Key prefix for sequence counters
const COUNTER_PREFIX: &str = "seq";
/// Key prefix for the issued-number ledger
const ISSUED_PREFIX: &str = "iss";

pub(crate) type Txn<'db> = Transaction<'db, TransactionDB>;

/// Shared RocksDB store behind pools, counters and the issued ledger.
///
/// Opened as a pessimistic `TransactionDB`: every mutation runs in a
/// transaction and locks the rows it touches with `get_for_update`, so
/// concurrent callers on the same row serialize while different scopes never
/// contend.
pub struct RocksDbStore {
    db: TransactionDB,
    config: StoreConfig,
    metrics: Arc<MetricsRegistry>,
}

impl RocksDbStore {
    /// Opens or creates the store at `config.data_dir`.
    pub fn open(config: StoreConfig) -> Result<Self, StorageError> {
        Self::open_with_metrics(config, Arc::new(MetricsRegistry::new()))
    }

    /// Opens the store with defaults at `path`.
    pub fn open_at(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        Self::open(StoreConfig::at(path.as_ref()))
    }

    pub fn open_with_metrics(
        config: StoreConfig,
        metrics: Arc<MetricsRegistry>,
    ) -> Result<Self, StorageError> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);

        let parallelism = std::thread::available_parallelism()
            .map(|p| p.get() as i32)
            .unwrap_or(4);
        opts.increase_parallelism(parallelism);

        let lock_timeout_ms = i64::try_from(config.lock_timeout_ms).unwrap_or(i64::MAX);
        let mut txn_opts = TransactionDBOptions::default();
        txn_opts.set_txn_lock_timeout(lock_timeout_ms);
        txn_opts.set_default_lock_timeout(lock_timeout_ms);

        let db = TransactionDB::open(&opts, &txn_opts, &config.data_dir)?;

        tracing::info!(
            data_dir = %config.data_dir.display(),
            lock_timeout_ms = config.lock_timeout_ms,
            "Opened reference-number store"
        );

        Ok(Self {
            db,
            config,
            metrics,
        })
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn metrics(&self) -> &Arc<MetricsRegistry> {
        &self.metrics
    }

    pub(crate) fn transaction(&self) -> Txn<'_> {
        self.db.transaction()
    }

    pub(crate) fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        Ok(self.db.get(key.as_bytes())?)
    }

    /// Returns up to `limit` key suffixes (after `prefix`) in key order.
    pub(crate) fn scan_suffixes(
        &self,
        prefix: &str,
        limit: usize,
    ) -> Result<Vec<String>, StorageError> {
        Ok(self
            .scan(prefix, limit)?
            .into_iter()
            .map(|(suffix, _)| suffix)
            .collect())
    }

    /// Returns up to `limit` `(suffix, value)` pairs under `prefix` in key order.
    pub(crate) fn scan(
        &self,
        prefix: &str,
        limit: usize,
    ) -> Result<Vec<(String, Vec<u8>)>, StorageError> {
        let mut read_opts = ReadOptions::default();
        read_opts.set_iterate_upper_bound(Self::upper_bound(prefix));

        let iter = self.db.iterator_opt(
            IteratorMode::From(prefix.as_bytes(), Direction::Forward),
            read_opts,
        );

        let mut entries = Vec::new();
        for item in iter {
            if entries.len() >= limit {
                break;
            }
            let (key, value) = item?;
            let Some(suffix) = key.strip_prefix(prefix.as_bytes()) else {
                break;
            };
            let suffix = String::from_utf8(suffix.to_vec())
                .map_err(|e| StorageError::Serialization(e.to_string()))?;
            entries.push((suffix, value.into_vec()));
        }

        Ok(entries)
    }

    /// Inserts `key` inside `txn`, failing with `UniqueViolation` if it already exists.
    ///
    /// The row lock is taken before the existence check, so two racing
    /// inserters serialize and the second sees the first one's row.
    pub(crate) fn insert_unique(
        txn: &Txn<'_>,
        key: &str,
        value: &[u8],
        violation: impl FnOnce() -> StorageError,
    ) -> Result<(), StorageError> {
        if txn.get_for_update(key.as_bytes(), true)?.is_some() {
            return Err(violation());
        }
        txn.put(key.as_bytes(), value)?;
        Ok(())
    }

    /// Builds the violation reported for a duplicate row of `table` in `scope`.
    pub(crate) fn unique_violation(
        table: Table,
        scope: &Scope,
        qualifier: Option<&str>,
        value: &str,
    ) -> StorageError {
        let key = match qualifier {
            Some(q) => format!("{scope}, {q}"),
            None => scope.to_string(),
        };
        StorageError::UniqueViolation {
            table,
            key,
            value: value.to_string(),
        }
    }

    /// Exclusive upper bound for every key starting with `prefix`.
    fn upper_bound(prefix: &str) -> Vec<u8> {
        let mut bound = prefix.as_bytes().to_vec();
        while let Some(last) = bound.pop() {
            if last < u8::MAX {
                bound.push(last + 1);
                return bound;
            }
        }
        vec![u8::MAX]
    }

    fn scope_key(prefix: &str, scope: &Scope) -> String {
        format!(
            "{}:{}:{}:{}",
            prefix,
            scope.tenant,
            scope.product,
            scope.environment.as_str()
        )
    }

    /// Format: ref:{tenant}:{product}:{environment}:{kind}:
    pub(crate) fn record_prefix(scope: &Scope, kind: ReferenceKind) -> String {
        format!("{}:{}:", Self::scope_key(RECORD_PREFIX, scope), kind.as_str())
    }

    pub(crate) fn record_key(scope: &Scope, kind: ReferenceKind, number: &str) -> String {
        format!("{}{}", Self::record_prefix(scope, kind), number)
    }

    /// Format: avl:{tenant}:{product}:{environment}:{kind}:
    pub(crate) fn available_prefix(scope: &Scope, kind: ReferenceKind) -> String {
        format!(
            "{}:{}:",
            Self::scope_key(AVAILABLE_PREFIX, scope),
            kind.as_str()
        )
    }

    pub(crate) fn available_key(scope: &Scope, kind: ReferenceKind, number: &str) -> String {
        format!("{}{}", Self::available_prefix(scope, kind), number)
    }

    /// Format: seq:{tenant}:{product}:{environment}:{use_case}
    pub(crate) fn counter_key(scope: &Scope, use_case: UseCase) -> String {
        format!(
            "{}:{}",
            Self::scope_key(COUNTER_PREFIX, scope),
            use_case.as_str()
        )
    }

    /// Format: iss:{tenant}:{product}:{environment}:{use_case}:
    pub(crate) fn issued_prefix(scope: &Scope, use_case: UseCase) -> String {
        format!(
            "{}:{}:",
            Self::scope_key(ISSUED_PREFIX, scope),
            use_case.as_str()
        )
    }

    pub(crate) fn issued_key(scope: &Scope, use_case: UseCase, number: &str) -> String {
        format!("{}{}", Self::issued_prefix(scope, use_case), number)
    }
}
