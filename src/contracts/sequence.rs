use crate::contracts::error::SequenceError;
use crate::contracts::schema::{Scope, UseCase};

/// Hands out seeds per `(tenant, product, environment, use_case)` key.
///
/// # Invariants
/// - Exactly one counter per key, created lazily at seed 0
/// - After N successful `next` calls on a key the issued seeds are exactly `{0..N}`
/// - No seed is issued twice for a key, across threads or processes sharing the store
pub trait SequenceCounterStore: Send + Sync {
    /// Returns the next seed for the key, creating the counter at 0 if absent.
    fn next(&self, scope: &Scope, use_case: UseCase) -> Result<u64, SequenceError>;

    /// Returns the last issued seed without incrementing, or `None` if the
    /// counter has never been used.
    fn current(&self, scope: &Scope, use_case: UseCase) -> Result<Option<u64>, SequenceError>;

    /// Deletes the counter so the next call starts again at 0.
    /// Administrative use only.
    fn reset(&self, scope: &Scope, use_case: UseCase) -> Result<bool, SequenceError>;
}
