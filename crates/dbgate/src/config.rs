//! Pool and client configuration.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use tokio::sync::Semaphore;

use crate::error::PoolError;

/// Default cap on concurrently held leases.
pub const DEFAULT_MAX_CONNECTIONS: u32 = 10;

/// Default deadline for a guarded operation.
pub const DEFAULT_OPERATION_TIMEOUT: Duration = Duration::from_secs(30);

/// Environment variable holding the database connection string.
pub const DATABASE_URL_ENV: &str = "DATABASE_URL";

/// Environment variable holding a comma-separated list of client log levels.
pub const DATABASE_LOG_ENV: &str = "DATABASE_LOG";

/// Configuration for the resource manager.
///
/// This struct is marked `#[non_exhaustive]` to allow adding new fields
/// in future minor versions without breaking changes. Use the builder
/// pattern methods or [`Default::default()`] to construct instances.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct PoolConfig {
    /// Maximum number of concurrently held leases.
    pub max_connections: u32,

    /// Deadline applied to each guarded operation.
    pub operation_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: DEFAULT_MAX_CONNECTIONS,
            operation_timeout: DEFAULT_OPERATION_TIMEOUT,
        }
    }
}

impl PoolConfig {
    /// Create a new pool configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum number of concurrent leases.
    #[must_use]
    pub fn max_connections(mut self, count: u32) -> Self {
        self.max_connections = count;
        self
    }

    /// Set the per-operation deadline.
    #[must_use]
    pub fn operation_timeout(mut self, timeout: Duration) -> Self {
        self.operation_timeout = timeout;
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), PoolError> {
        if self.max_connections == 0 {
            return Err(PoolError::Configuration(
                "max_connections must be greater than 0".into(),
            ));
        }
        if self.max_connections as usize > Semaphore::MAX_PERMITS {
            return Err(PoolError::Configuration(format!(
                "max_connections cannot exceed {}",
                Semaphore::MAX_PERMITS
            )));
        }
        if self.operation_timeout.is_zero() {
            return Err(PoolError::Configuration(
                "operation_timeout must be greater than 0".into(),
            ));
        }
        Ok(())
    }
}

/// Verbosity categories understood by the resource client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogLevel {
    /// Every statement sent to the database.
    Query,
    /// Informational client events.
    Info,
    /// Warnings.
    Warn,
    /// Errors.
    Error,
}

impl LogLevel {
    /// All recognized levels, most verbose first.
    pub const ALL: [LogLevel; 4] = [Self::Query, Self::Info, Self::Warn, Self::Error];

    /// Lowercase name of the level.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Query => "query",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogLevel {
    type Err = PoolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "query" => Ok(Self::Query),
            "info" => Ok(Self::Info),
            "warn" => Ok(Self::Warn),
            "error" => Ok(Self::Error),
            other => Err(PoolError::Configuration(format!(
                "unknown log level '{other}' (expected query, info, warn or error)"
            ))),
        }
    }
}

/// Parameters handed to a [`ClientFactory`](crate::client::ClientFactory)
/// when the shared client is built.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub struct ClientOptions {
    /// Connection string, passed through to the client untouched.
    pub database_url: Option<String>,

    /// Log levels the client should emit.
    pub log_levels: Vec<LogLevel>,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            database_url: None,
            log_levels: LogLevel::ALL.to_vec(),
        }
    }
}

impl ClientOptions {
    /// Create client options with no connection string and all log levels.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Read options from `DATABASE_URL` and `DATABASE_LOG`.
    pub fn from_env() -> Result<Self, PoolError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read options through an arbitrary variable lookup.
    ///
    /// An unset or blank `DATABASE_LOG` keeps the default levels.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, PoolError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut options = Self::default();
        options.database_url = lookup(DATABASE_URL_ENV).filter(|url| !url.trim().is_empty());

        if let Some(levels) = lookup(DATABASE_LOG_ENV).filter(|v| !v.trim().is_empty()) {
            options.log_levels = levels
                .split(',')
                .filter(|part| !part.trim().is_empty())
                .map(str::parse)
                .collect::<Result<_, _>>()?;
        }

        Ok(options)
    }

    /// Set the connection string.
    #[must_use]
    pub fn database_url(mut self, url: impl Into<String>) -> Self {
        self.database_url = Some(url.into());
        self
    }

    /// Set the log levels.
    #[must_use]
    pub fn log_levels(mut self, levels: impl IntoIterator<Item = LogLevel>) -> Self {
        self.log_levels = levels.into_iter().collect();
        self
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = PoolConfig::default();
        assert_eq!(config.max_connections, 10);
        assert_eq!(config.operation_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_config_builder_methods() {
        let config = PoolConfig::new()
            .max_connections(3)
            .operation_timeout(Duration::from_millis(250));

        assert_eq!(config.max_connections, 3);
        assert_eq!(config.operation_timeout, Duration::from_millis(250));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation_zero_max() {
        let result = PoolConfig::new().max_connections(0).validate();
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("max_connections must be greater than 0")
        );
    }

    #[test]
    fn test_config_validation_zero_timeout() {
        let result = PoolConfig::new()
            .operation_timeout(Duration::ZERO)
            .validate();
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("operation_timeout must be greater than 0")
        );
    }

    #[test]
    fn test_log_level_parsing() {
        assert_eq!("query".parse::<LogLevel>().unwrap(), LogLevel::Query);
        assert_eq!(" WARN ".parse::<LogLevel>().unwrap(), LogLevel::Warn);
        assert!("verbose".parse::<LogLevel>().is_err());
        assert_eq!(LogLevel::Error.to_string(), "error");
    }

    #[test]
    fn test_client_options_default_levels() {
        let options = ClientOptions::new();
        assert!(options.database_url.is_none());
        assert_eq!(options.log_levels, LogLevel::ALL.to_vec());
    }

    #[test]
    fn test_client_options_from_lookup() {
        let options = ClientOptions::from_lookup(|key| match key {
            DATABASE_URL_ENV => Some("postgres://app@db:5432/app".into()),
            DATABASE_LOG_ENV => Some("warn, error".into()),
            _ => None,
        })
        .unwrap();

        assert_eq!(
            options.database_url.as_deref(),
            Some("postgres://app@db:5432/app")
        );
        assert_eq!(options.log_levels, vec![LogLevel::Warn, LogLevel::Error]);
    }

    #[test]
    fn test_client_options_unset_environment() {
        let options = ClientOptions::from_lookup(|_| None).unwrap();
        assert_eq!(options, ClientOptions::default());
    }

    #[test]
    fn test_client_options_bad_log_level() {
        let result = ClientOptions::from_lookup(|key| {
            (key == DATABASE_LOG_ENV).then(|| "info,chatty".to_string())
        });
        assert!(result.unwrap_err().to_string().contains("chatty"));
    }
}
