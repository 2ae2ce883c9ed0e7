//! Application configuration loaded from environment variables.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{name} must be a valid number, got '{value}'")]
    Invalid { name: &'static str, value: String },
}

/// Service configuration.
///
/// Reads from environment variables:
/// - `DATABASE_URL` (required)
/// - `JWT_SECRET` (required), HS256 key shared with the token issuer
/// - `HOST` (default `0.0.0.0`) and `PORT` (default `8080`)
/// - `DB_POOL_MAX_SIZE` (default `10`)
/// - `CHECKOUT_LOCK_TIMEOUT_MS`, unset means wait for product locks
///   indefinitely
#[derive(Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub host: String,
    pub port: u16,
    pub pool_max_size: u32,
    pub checkout_lock_timeout_ms: Option<u64>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |name: &'static str| lookup(name).ok_or(ConfigError::Missing(name));

        Ok(Self {
            database_url: required("DATABASE_URL")?,
            jwt_secret: required("JWT_SECRET")?,
            host: lookup("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: parse_or(&lookup, "PORT", 8080)?,
            pool_max_size: parse_or(&lookup, "DB_POOL_MAX_SIZE", 10)?,
            checkout_lock_timeout_ms: lookup("CHECKOUT_LOCK_TIMEOUT_MS")
                .map(|value| parse("CHECKOUT_LOCK_TIMEOUT_MS", value))
                .transpose()?,
        })
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse<T: FromStr>(name: &'static str, value: String) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::Invalid { name, value })
}

fn parse_or<T, F>(lookup: &F, name: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    lookup(name).map_or(Ok(default), |value| parse(name, value))
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("pool_max_size", &self.pool_max_size)
            .field("checkout_lock_timeout_ms", &self.checkout_lock_timeout_ms)
            .finish_non_exhaustive()
    }
}
