use std::time::Duration;

use anyhow::{Context, Result};

pub const DEFAULT_DATABASE_PATH: &str = "spendbook.db";

/// Storage settings shared by the CLI and library callers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub database_path: String,
    pub max_connections: u32,
    /// How long a statement waits on a locked database before failing
    pub busy_timeout: Duration,
    /// How long to wait for a pooled connection before failing
    pub acquire_timeout: Duration,
}

impl Config {
    pub fn new(database_path: impl Into<String>) -> Self {
        Self {
            database_path: database_path.into(),
            max_connections: 5,
            busy_timeout: Duration::from_secs(5),
            acquire_timeout: Duration::from_secs(30),
        }
    }

    /// Read `SPENDBOOK_DB_PATH`, `SPENDBOOK_MAX_CONNECTIONS`, `SPENDBOOK_BUSY_TIMEOUT_MS`
    /// and `SPENDBOOK_ACQUIRE_TIMEOUT_MS`, falling back to defaults.
    pub fn from_env() -> Result<Self> {
        let defaults = Self::new(DEFAULT_DATABASE_PATH);
        let database_path =
            std::env::var("SPENDBOOK_DB_PATH").unwrap_or(defaults.database_path);

        let max_connections = match std::env::var("SPENDBOOK_MAX_CONNECTIONS") {
            Ok(value) => value
                .parse()
                .with_context(|| format!("Invalid SPENDBOOK_MAX_CONNECTIONS '{}'", value))?,
            Err(_) => defaults.max_connections,
        };

        Ok(Self {
            database_path,
            max_connections,
            busy_timeout: duration_from_env("SPENDBOOK_BUSY_TIMEOUT_MS", defaults.busy_timeout)?,
            acquire_timeout: duration_from_env(
                "SPENDBOOK_ACQUIRE_TIMEOUT_MS",
                defaults.acquire_timeout,
            )?,
        })
    }

    pub fn with_database_path(mut self, database_path: impl Into<String>) -> Self {
        self.database_path = database_path.into();
        self
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new(DEFAULT_DATABASE_PATH)
    }
}

fn duration_from_env(key: &str, default: Duration) -> Result<Duration> {
    match std::env::var(key) {
        Ok(value) => {
            let millis: u64 = value
                .parse()
                .with_context(|| format!("Invalid {} '{}'", key, value))?;
            Ok(Duration::from_millis(millis))
        }
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.database_path, DEFAULT_DATABASE_PATH);
        assert_eq!(config.max_connections, 5);
        assert_eq!(config.busy_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_with_database_path() {
        let config = Config::default().with_database_path("/tmp/ledger.db");
        assert_eq!(config.database_path, "/tmp/ledger.db");
    }

    #[test]
    fn test_duration_from_env_falls_back() {
        let value = duration_from_env("SPENDBOOK_TEST_UNSET_TIMEOUT", Duration::from_millis(42));
        assert_eq!(value.unwrap(), Duration::from_millis(42));
    }
}
