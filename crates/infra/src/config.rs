//! Process configuration loaded from the environment (and `.env`, if present).

use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use crate::engine::RetryPolicy;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{key} must be {expected}, got '{value}'")]
    Invalid {
        key: &'static str,
        expected: &'static str,
        value: String,
    },
}

pub const DEFAULT_FRONTEND_URL: &str = "http://localhost:5173";

/// Runtime settings for the ledger service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    /// Postgres when set, in-memory storage otherwise.
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub retry: RetryPolicy,
    /// Browser origin allowed to call the API with credentials (CORS).
    pub frontend_url: String,
    /// Storage error detail is returned to clients. Off when `APP_ENV=production`.
    pub expose_internal_errors: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 3000)),
            database_url: None,
            database_max_connections: 10,
            retry: RetryPolicy::default(),
            frontend_url: DEFAULT_FRONTEND_URL.to_string(),
            expose_internal_errors: true,
        }
    }
}

impl AppConfig {
    /// Read the process environment after loading `.env`.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Unset or blank keys take defaults;
    /// set but unparseable keys are errors.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let defaults = Self::default();

        let bind_addr = parse_or(get("BIND_ADDR"), "BIND_ADDR", "a socket address", defaults.bind_addr)?;
        let database_max_connections = parse_or(
            get("DATABASE_MAX_CONNECTIONS"),
            "DATABASE_MAX_CONNECTIONS",
            "a positive integer",
            defaults.database_max_connections,
        )?;
        if database_max_connections == 0 {
            return Err(ConfigError::Invalid {
                key: "DATABASE_MAX_CONNECTIONS",
                expected: "a positive integer",
                value: "0".to_string(),
            });
        }

        let max_attempts = parse_or(
            get("LEDGER_MAX_ATTEMPTS"),
            "LEDGER_MAX_ATTEMPTS",
            "a non-negative integer",
            defaults.retry.max_attempts,
        )?;
        let backoff_ms = parse_or(
            get("LEDGER_RETRY_BACKOFF_MS"),
            "LEDGER_RETRY_BACKOFF_MS",
            "a number of milliseconds",
            defaults.retry.base_backoff.as_millis() as u64,
        )?;

        let frontend_url = get("FRONTEND_URL").unwrap_or(defaults.frontend_url);
        if !is_origin(&frontend_url) {
            return Err(ConfigError::Invalid {
                key: "FRONTEND_URL",
                expected: "an http(s) origin",
                value: frontend_url,
            });
        }

        Ok(Self {
            bind_addr,
            database_url: get("DATABASE_URL"),
            database_max_connections,
            retry: RetryPolicy::new(max_attempts, Duration::from_millis(backoff_ms)),
            frontend_url,
            expose_internal_errors: !get("APP_ENV").is_some_and(|env| env.eq_ignore_ascii_case("production")),
        })
    }
}

/// `scheme://host[:port]` with no path, which is what browsers send as `Origin`.
fn is_origin(value: &str) -> bool {
    let Some((scheme, rest)) = value.split_once("://") else {
        return false;
    };
    matches!(scheme, "http" | "https")
        && !rest.is_empty()
        && !rest.contains('/')
        && rest.chars().all(|c| c.is_ascii_graphic())
}

fn parse_or<T: FromStr>(
    raw: Option<String>,
    key: &'static str,
    expected: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match raw {
        None => Ok(default),
        Some(value) => value
            .parse()
            .map_err(|_| ConfigError::Invalid { key, expected, value }),
    }
}
