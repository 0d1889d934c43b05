//! Runtime configuration read from `REFNUM_*` environment variables.

use std::path::PathBuf;
use std::str::FromStr;

pub use crate::storage::RetryConfig;

/// Parses `key` from the environment, falling back to `default` when unset or invalid.
pub(crate) fn env_or<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

/// Where the store lives and how it waits on contended rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    pub data_dir: PathBuf,
    /// How long a transaction waits for a row lock before failing with a timeout.
    pub lock_timeout_ms: u64,
    pub retry: RetryConfig,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            lock_timeout_ms: 1_000,
            retry: RetryConfig::default(),
        }
    }
}

impl StoreConfig {
    /// Defaults with `data_dir` replaced.
    pub fn at(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Self::default()
        }
    }

    /// Environment variables:
    /// - `REFNUM_DATA_DIR`: RocksDB directory (default: `./data`)
    /// - `REFNUM_LOCK_TIMEOUT_MS`: row lock wait in ms (default: 1000)
    /// - `REFNUM_CONFLICT_*`: see [`RetryConfig::from_env`]
    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            data_dir: std::env::var("REFNUM_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or(default.data_dir),
            lock_timeout_ms: env_or("REFNUM_LOCK_TIMEOUT_MS", default.lock_timeout_ms),
            retry: RetryConfig::from_env(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeneratorConfig {
    /// Seeds tried per `generate` call before failing with `SequenceGenerationFailed`.
    pub max_attempts: usize,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self { max_attempts: 5 }
    }
}

impl GeneratorConfig {
    /// Reads `REFNUM_GENERATE_MAX_ATTEMPTS` (default: 5, minimum 1).
    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            max_attempts: env_or("REFNUM_GENERATE_MAX_ATTEMPTS", default.max_attempts).max(1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Each test uses its own variable names so they can run in parallel.

    #[test]
    fn env_or_falls_back_on_missing_and_invalid() {
        std::env::remove_var("REFNUM_TEST_MISSING");
        assert_eq!(env_or("REFNUM_TEST_MISSING", 5u64), 5);

        std::env::set_var("REFNUM_TEST_INVALID", "not_a_number");
        assert_eq!(env_or("REFNUM_TEST_INVALID", 5u64), 5);
        std::env::set_var("REFNUM_TEST_INVALID", "-100");
        assert_eq!(env_or("REFNUM_TEST_INVALID", 5u64), 5);
        std::env::remove_var("REFNUM_TEST_INVALID");
    }

    #[test]
    fn env_or_parses_valid_values() {
        std::env::set_var("REFNUM_TEST_VALID", " 42 ");
        assert_eq!(env_or("REFNUM_TEST_VALID", 5u64), 42);
        std::env::remove_var("REFNUM_TEST_VALID");
    }

    #[test]
    fn store_config_defaults() {
        let config = StoreConfig::default();
        assert_eq!(config.data_dir, PathBuf::from("./data"));
        assert_eq!(config.lock_timeout_ms, 1_000);
        assert_eq!(config.retry, RetryConfig::default());
        assert_eq!(StoreConfig::at("/tmp/x").data_dir, PathBuf::from("/tmp/x"));
    }

    #[test]
    fn generator_config_defaults_to_five_attempts() {
        assert_eq!(GeneratorConfig::default().max_attempts, 5);
    }
}
