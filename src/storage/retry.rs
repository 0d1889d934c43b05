//! Retry of transient storage failures.
//!
//! Write conflicts and lock timeouts are retried with jittered exponential
//! backoff; everything else is returned on the first failure.

use std::fmt::Display;
use std::time::Duration;

use backon::{BlockingRetryable, ExponentialBuilder};

use crate::contracts::{GeneratorError, PoolError, SequenceError, StorageError};

/// Classifies errors that may clear up when the same call is retried.
pub trait Transient {
    fn is_transient(&self) -> bool;
}

impl Transient for StorageError {
    fn is_transient(&self) -> bool {
        StorageError::is_transient(self)
    }
}

impl Transient for PoolError {
    fn is_transient(&self) -> bool {
        matches!(self, PoolError::Storage(e) if e.is_transient())
    }
}

impl Transient for SequenceError {
    fn is_transient(&self) -> bool {
        matches!(self, SequenceError::Storage(e) if e.is_transient())
    }
}

impl Transient for GeneratorError {
    fn is_transient(&self) -> bool {
        match self {
            GeneratorError::Storage(e) => e.is_transient(),
            GeneratorError::Sequence(e) => Transient::is_transient(e),
            _ => false,
        }
    }
}

/// Backoff for transient conflicts against the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryConfig {
    /// Maximum number of retries after the first attempt.
    pub max_retries: usize,
    /// Initial delay between retries in milliseconds.
    pub initial_delay_ms: u64,
    /// Maximum delay between retries in milliseconds.
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 8,
            initial_delay_ms: 5,
            max_delay_ms: 200,
        }
    }
}

impl RetryConfig {
    /// Creates a RetryConfig from environment variables.
    ///
    /// Environment variables:
    /// - `REFNUM_CONFLICT_MAX_RETRIES`: Maximum retry attempts (default: 8)
    /// - `REFNUM_CONFLICT_RETRY_INITIAL_MS`: Initial backoff delay in ms (default: 5)
    /// - `REFNUM_CONFLICT_RETRY_MAX_MS`: Maximum backoff delay in ms (default: 200)
    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            max_retries: crate::config::env_or("REFNUM_CONFLICT_MAX_RETRIES", default.max_retries),
            initial_delay_ms: crate::config::env_or(
                "REFNUM_CONFLICT_RETRY_INITIAL_MS",
                default.initial_delay_ms,
            ),
            max_delay_ms: crate::config::env_or("REFNUM_CONFLICT_RETRY_MAX_MS", default.max_delay_ms),
        }
    }

    /// Exponential backoff builder with jitter.
    pub fn backoff(&self) -> ExponentialBuilder {
        ExponentialBuilder::default()
            .with_min_delay(Duration::from_millis(self.initial_delay_ms))
            .with_max_delay(Duration::from_millis(self.max_delay_ms))
            .with_max_times(self.max_retries)
            .with_jitter()
    }

    /// Runs `op`, retrying while it fails transiently and the budget lasts.
    /// The last error is returned once retries run out.
    pub fn run<T, E, F>(&self, context: &str, op: F) -> Result<T, E>
    where
        F: FnMut() -> Result<T, E>,
        E: Transient + Display,
    {
        op.retry(self.backoff())
            .sleep(std::thread::sleep)
            .when(|e: &E| e.is_transient())
            .notify(|err: &E, dur: Duration| {
                tracing::warn!(
                    context = %context,
                    error = %err,
                    retry_in = ?dur,
                    "Transient storage failure, retrying"
                );
            })
            .call()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::cell::Cell;

    fn fast() -> RetryConfig {
        RetryConfig {
            max_retries: 3,
            initial_delay_ms: 1,
            max_delay_ms: 2,
        }
    }

    #[test]
    fn default_config() {
        let config = RetryConfig::default();
        assert_eq!(config.max_retries, 8);
        assert_eq!(config.initial_delay_ms, 5);
        assert_eq!(config.max_delay_ms, 200);
    }

    #[test]
    fn transient_failures_are_retried_until_success() {
        let calls = Cell::new(0);
        let result: Result<u32, StorageError> = fast().run("test", || {
            calls.set(calls.get() + 1);
            if calls.get() < 3 {
                Err(StorageError::WriteConflict("busy".into()))
            } else {
                Ok(7)
            }
        });
        assert_eq!(result, Ok(7));
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn permanent_failures_are_not_retried() {
        let calls = Cell::new(0);
        let result: Result<u32, StorageError> = fast().run("test", || {
            calls.set(calls.get() + 1);
            Err(StorageError::RocksDb("corruption".into()))
        });
        assert!(result.is_err());
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn exhausted_budget_surfaces_last_error() {
        let calls = Cell::new(0);
        let result: Result<u32, StorageError> = fast().run("test", || {
            calls.set(calls.get() + 1);
            Err(StorageError::Timeout("lock".into()))
        });
        assert_eq!(result, Err(StorageError::Timeout("lock".into())));
        assert_eq!(calls.get(), 4);
    }

    #[test]
    fn pool_unavailable_is_not_transient() {
        use crate::contracts::{Environment, ProductId, ReferenceKind, Scope, TenantId};

        let err = PoolError::ReferenceNumberUnavailable {
            scope: Scope::new(TenantId::new(), ProductId::new(), Environment::Staging),
            kind: ReferenceKind::Policy,
        };
        assert!(!Transient::is_transient(&err));
        assert!(Transient::is_transient(&PoolError::Storage(
            StorageError::WriteConflict("busy".into())
        )));
    }
}
