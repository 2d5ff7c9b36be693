//! Engine runtime configuration.

use std::time::Duration;

use serde::Deserialize;

/// Runtime configuration for the ledger engine.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EngineConfig {
    /// Locking and retry configuration.
    #[serde(default)]
    pub locking: LockingConfig,
}

/// Locking and retry tuning.
#[derive(Debug, Clone, Deserialize)]
pub struct LockingConfig {
    /// Maximum attempts for an operation interrupted by deadlock or
    /// lock-wait timeout before the error is surfaced.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Base backoff between retry attempts in milliseconds. Doubles per
    /// attempt, with full jitter.
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,
    /// How long a row-lock acquisition may block before the store reports
    /// a lock-wait timeout, in milliseconds.
    #[serde(default = "default_lock_wait_timeout_ms")]
    pub lock_wait_timeout_ms: u64,
    /// Permits one already-open transaction when checking that an operation
    /// starts outermost. For suites that wrap every test in a fixture
    /// transaction.
    #[serde(default)]
    pub fixture_transaction: bool,
}

fn default_max_attempts() -> u32 {
    5
}

fn default_backoff_base_ms() -> u64 {
    10
}

fn default_lock_wait_timeout_ms() -> u64 {
    5000 // 5 seconds
}

impl Default for LockingConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            backoff_base_ms: default_backoff_base_ms(),
            lock_wait_timeout_ms: default_lock_wait_timeout_ms(),
            fixture_transaction: false,
        }
    }
}

impl LockingConfig {
    /// Base backoff as a [`Duration`].
    #[must_use]
    pub const fn backoff_base(&self) -> Duration {
        Duration::from_millis(self.backoff_base_ms)
    }

    /// Lock-wait timeout as a [`Duration`].
    #[must_use]
    pub const fn lock_wait_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_wait_timeout_ms)
    }
}

impl EngineConfig {
    /// Loads configuration from `.env`, config files, and the environment.
    ///
    /// Sources, later ones winning: `config/default.toml`,
    /// `config/{RUN_MODE}.toml`, then `TALLY__`-prefixed environment
    /// variables (e.g. `TALLY__LOCKING__MAX_ATTEMPTS=3`).
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be loaded or deserialized.
    pub fn load() -> Result<Self, config::ConfigError> {
        dotenvy::dotenv().ok();
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{run_mode}")).required(false))
            .add_source(config::Environment::with_prefix("TALLY").separator("__"))
            .build()?;

        config.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.locking.max_attempts, 5);
        assert_eq!(config.locking.backoff_base_ms, 10);
        assert_eq!(config.locking.lock_wait_timeout_ms, 5000);
        assert!(!config.locking.fixture_transaction);
    }

    #[test]
    fn test_duration_helpers() {
        let locking = LockingConfig {
            backoff_base_ms: 25,
            lock_wait_timeout_ms: 100,
            ..LockingConfig::default()
        };
        assert_eq!(locking.backoff_base(), Duration::from_millis(25));
        assert_eq!(locking.lock_wait_timeout(), Duration::from_millis(100));
    }

    #[test]
    fn test_load_with_env_overrides() {
        temp_env::with_vars(
            [
                ("TALLY__LOCKING__MAX_ATTEMPTS", Some("3")),
                ("TALLY__LOCKING__BACKOFF_BASE_MS", Some("1")),
            ],
            || {
                let config = EngineConfig::load().unwrap();
                assert_eq!(config.locking.max_attempts, 3);
                assert_eq!(config.locking.backoff_base_ms, 1);
                // Untouched knobs keep their defaults.
                assert_eq!(config.locking.lock_wait_timeout_ms, 5000);
            },
        );
    }

    #[test]
    fn test_load_without_env_uses_defaults() {
        temp_env::with_vars_unset(
            [
                "TALLY__LOCKING__MAX_ATTEMPTS",
                "TALLY__LOCKING__BACKOFF_BASE_MS",
                "TALLY__LOCKING__LOCK_WAIT_TIMEOUT_MS",
            ],
            || {
                let config = EngineConfig::load().unwrap();
                assert_eq!(config.locking.max_attempts, 5);
            },
        );
    }
}
