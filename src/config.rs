//! Environment-driven configuration.

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{name} must be {expected}, got {value:?}")]
    Invalid {
        name: &'static str,
        expected: &'static str,
        value: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Deployment name, only used in logs.
    pub env: String,
    pub http_address: SocketAddr,
    /// Per-request deadline.
    pub http_timeout: Duration,
    pub database_path: PathBuf,
    pub db_connect_attempts: u32,
    pub db_connect_backoff: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build the configuration from an arbitrary variable source.
    ///
    /// Unset and blank variables take their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let env = get("APP_ENV").unwrap_or_else(|| "local".to_string());

        let http_address = parse(get("HTTP_ADDRESS"), "HTTP_ADDRESS", "a socket address", "127.0.0.1:8080")?;

        let http_timeout = Duration::from_secs(parse(
            get("HTTP_TIMEOUT_SECS"),
            "HTTP_TIMEOUT_SECS",
            "a number of seconds",
            "4",
        )?);

        let database_path = get("DATABASE_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("data/reviewer-assigner.db"));

        let db_connect_attempts = parse(
            get("DB_CONNECT_ATTEMPTS"),
            "DB_CONNECT_ATTEMPTS",
            "a positive number",
            "10",
        )?;
        if db_connect_attempts == 0 {
            return Err(ConfigError::Invalid {
                name: "DB_CONNECT_ATTEMPTS",
                expected: "a positive number",
                value: "0".to_string(),
            });
        }

        let db_connect_backoff = Duration::from_millis(parse(
            get("DB_CONNECT_BACKOFF_MS"),
            "DB_CONNECT_BACKOFF_MS",
            "a number of milliseconds",
            "1000",
        )?);

        Ok(Config {
            env,
            http_address,
            http_timeout,
            database_path,
            db_connect_attempts,
            db_connect_backoff,
        })
    }
}

fn parse<T: std::str::FromStr>(
    value: Option<String>,
    name: &'static str,
    expected: &'static str,
    default: &str,
) -> Result<T, ConfigError> {
    let value = value.unwrap_or_else(|| default.to_string());
    value
        .trim()
        .parse::<T>()
        .map_err(|_| ConfigError::Invalid {
            name,
            expected,
            value,
        })
}
