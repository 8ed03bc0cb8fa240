//! Server configuration from environment variables.

use std::str::FromStr;
use std::time::Duration;

use noise_map_database::db::DEFAULT_DATABASE_URL;
use noise_map_query::DEFAULT_RADIUS_METERS;
use thiserror::Error;

/// Errors from reading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A variable was set to a value that could not be used.
    #[error("Invalid value for {key}: '{value}' ({reason})")]
    Invalid {
        /// Environment variable name.
        key: &'static str,
        /// The rejected value.
        value: String,
        /// Why it was rejected.
        reason: String,
    },
}

/// Which [`noise_map_store::NoiseSampleStore`] adapter to run against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    /// `PostGIS` at `DATABASE_URL`.
    Postgis,
    /// Process-local store; data is lost on restart.
    Memory,
}

impl FromStr for StoreBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "postgis" | "postgres" => Ok(Self::Postgis),
            "memory" => Ok(Self::Memory),
            other => Err(format!("unknown store backend '{other}'")),
        }
    }
}

/// Everything the server reads from its environment.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Interface to bind (`BIND_ADDR`).
    pub bind_addr: String,
    /// Port to listen on (`PORT`).
    pub port: u16,
    /// Store connection string (`DATABASE_URL`).
    pub database_url: String,
    /// Radius applied when a request supplies none (`DEFAULT_RADIUS_METERS`).
    pub default_radius_meters: f64,
    /// Upper bound on one store round-trip (`STORE_TIMEOUT_SECS`).
    pub store_timeout: Duration,
    /// Allowed CORS origin (`FRONTEND_URL`); any origin when unset.
    pub frontend_url: Option<String>,
    /// Store adapter (`NOISE_STORE`).
    pub store_backend: StoreBackend,
}

impl ServerConfig {
    /// Reads the configuration from process environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if a variable is set to an unusable value.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads the configuration through `lookup`, which returns the value of
    /// a variable if it is set.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if a variable is set to an unusable value.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let port = parse_or("PORT", get("PORT"), 3000u16)?;

        let default_radius_meters = parse_or(
            "DEFAULT_RADIUS_METERS",
            get("DEFAULT_RADIUS_METERS"),
            DEFAULT_RADIUS_METERS,
        )?;
        if !(default_radius_meters.is_finite() && default_radius_meters > 0.0) {
            return Err(ConfigError::Invalid {
                key: "DEFAULT_RADIUS_METERS",
                value: default_radius_meters.to_string(),
                reason: "must be a positive number of meters".to_string(),
            });
        }

        let timeout_secs = parse_or("STORE_TIMEOUT_SECS", get("STORE_TIMEOUT_SECS"), 10u64)?;
        if timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                key: "STORE_TIMEOUT_SECS",
                value: "0".to_string(),
                reason: "must be at least 1 second".to_string(),
            });
        }

        let store_backend = parse_or("NOISE_STORE", get("NOISE_STORE"), StoreBackend::Postgis)?;

        Ok(Self {
            bind_addr: get("BIND_ADDR").unwrap_or_else(|| "127.0.0.1".to_string()),
            port,
            database_url: get("DATABASE_URL").unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string()),
            default_radius_meters,
            store_timeout: Duration::from_secs(timeout_secs),
            frontend_url: get("FRONTEND_URL"),
            store_backend,
        })
    }
}

fn parse_or<T>(key: &'static str, raw: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match raw {
        None => Ok(default),
        Some(value) => value.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            key,
            reason: e.to_string(),
            value,
        }),
    }
}
