//! Connection settings read from the environment.

use std::time::Duration;

use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

/// Connection string variable.
pub const DATABASE_URL_VAR: &str = "DATABASE_URL";
/// Pool size variable.
pub const MAX_CONNECTIONS_VAR: &str = "EVENTIDE_MAX_CONNECTIONS";
/// Row-lock wait limit in milliseconds.
pub const LOCK_TIMEOUT_VAR: &str = "EVENTIDE_LOCK_TIMEOUT_MS";

const DEFAULT_MAX_CONNECTIONS: u32 = 10;

/// Errors raised while reading the store configuration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// A required variable is not set.
    #[error("{0} environment variable must be set")]
    Missing(&'static str),

    /// A variable is set to an unusable value.
    #[error("{var} has invalid value {value:?}: {reason}")]
    Invalid {
        /// The variable name.
        var: &'static str,
        /// The value it was set to.
        value: String,
        /// Why the value was rejected.
        reason: String,
    },
}

/// Settings for a [`crate::PgEventStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PgStoreConfig {
    /// `PostgreSQL` connection string.
    pub database_url: String,
    /// Upper bound of the connection pool.
    pub max_connections: u32,
    /// `None` waits for row locks indefinitely.
    pub lock_timeout: Option<Duration>,
}

impl PgStoreConfig {
    /// Reads the configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if `DATABASE_URL` is missing or a numeric
    /// variable does not parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Reads the configuration through `lookup`.
    ///
    /// # Errors
    ///
    /// Same as [`PgStoreConfig::from_env`].
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let database_url = lookup(DATABASE_URL_VAR)
            .filter(|url| !url.trim().is_empty())
            .ok_or(ConfigError::Missing(DATABASE_URL_VAR))?;

        let max_connections = match lookup(MAX_CONNECTIONS_VAR) {
            Some(value) => match value.trim().parse::<u32>() {
                Ok(0) => {
                    return Err(ConfigError::Invalid {
                        var: MAX_CONNECTIONS_VAR,
                        value,
                        reason: "must be at least 1".into(),
                    });
                }
                Ok(n) => n,
                Err(e) => {
                    return Err(ConfigError::Invalid {
                        var: MAX_CONNECTIONS_VAR,
                        value,
                        reason: e.to_string(),
                    });
                }
            },
            None => DEFAULT_MAX_CONNECTIONS,
        };

        let lock_timeout = lookup(LOCK_TIMEOUT_VAR)
            .map(|value| {
                value
                    .trim()
                    .parse::<u64>()
                    .map(Duration::from_millis)
                    .map_err(|e| ConfigError::Invalid {
                        var: LOCK_TIMEOUT_VAR,
                        value: value.clone(),
                        reason: e.to_string(),
                    })
            })
            .transpose()?;

        Ok(Self {
            database_url,
            max_connections,
            lock_timeout,
        })
    }

    /// Opens a connection pool with these settings.
    ///
    /// # Errors
    ///
    /// Returns the database error if the pool cannot connect.
    pub async fn connect(&self) -> Result<PgPool, sqlx::Error> {
        PgPoolOptions::new()
            .max_connections(self.max_connections)
            .connect(&self.database_url)
            .await
    }
}
