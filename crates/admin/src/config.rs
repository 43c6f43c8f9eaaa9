//! Back-office configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `BAKERY_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//!
//! ## Optional
//! - `BAKERY_HOST` - Bind address (default: 127.0.0.1)
//! - `BAKERY_PORT` - Listen port (default: 3002)
//! - `BAKERY_OFFLINE_DB` - Path of the offline cache file (default: bakery-offline.db)
//! - `BAKERY_PRODUCT_CACHE_TTL_SECS` - Product catalogue cache lifetime (default: 300)
//! - `BAKERY_LOG_JSON` - Emit JSON logs when set to anything but `0`/`false`
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name
//! - `SENTRY_SAMPLE_RATE` - Error sample rate (default: 1.0)
//! - `SENTRY_TRACES_SAMPLE_RATE` - Traces sample rate (default: 0.1)

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;
use thiserror::Error;

const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: &str = "3002";
const DEFAULT_OFFLINE_DB: &str = "bakery-offline.db";
const DEFAULT_PRODUCT_CACHE_TTL_SECS: &str = "300";

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Back-office application configuration.
#[derive(Debug, Clone)]
pub struct BakeryConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Offline cache file
    pub offline_db_path: PathBuf,
    /// How long a company's product list stays cached
    pub product_cache_ttl: Duration,
    /// Emit JSON logs instead of text
    pub log_json: bool,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment (e.g., "development", "production")
    pub sentry_environment: Option<String>,
    /// Sentry error sample rate (0.0 to 1.0)
    pub sentry_sample_rate: f32,
    /// Sentry traces sample rate for performance monitoring (0.0 to 1.0)
    pub sentry_traces_sample_rate: f32,
}

impl BakeryConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary variable source.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let vars = Vars(lookup);

        let database_url = vars
            .optional("BAKERY_DATABASE_URL")
            .or_else(|| vars.optional("DATABASE_URL"))
            .map(SecretString::from)
            .ok_or_else(|| ConfigError::MissingEnvVar("BAKERY_DATABASE_URL".to_string()))?;

        let host = vars.parsed::<IpAddr>("BAKERY_HOST", DEFAULT_HOST)?;
        let port = vars.parsed::<u16>("BAKERY_PORT", DEFAULT_PORT)?;
        let offline_db_path = PathBuf::from(vars.or_default("BAKERY_OFFLINE_DB", DEFAULT_OFFLINE_DB));
        let ttl_secs =
            vars.parsed::<u64>("BAKERY_PRODUCT_CACHE_TTL_SECS", DEFAULT_PRODUCT_CACHE_TTL_SECS)?;
        let log_json = vars
            .optional("BAKERY_LOG_JSON")
            .is_some_and(|v| !matches!(v.trim(), "" | "0" | "false"));

        let sentry_dsn = vars.optional("SENTRY_DSN");
        let sentry_environment = vars.optional("SENTRY_ENVIRONMENT");
        let sentry_sample_rate = vars
            .optional("SENTRY_SAMPLE_RATE")
            .and_then(|s| s.parse().ok())
            .unwrap_or(1.0);
        let sentry_traces_sample_rate = vars
            .optional("SENTRY_TRACES_SAMPLE_RATE")
            .and_then(|s| s.parse().ok())
            .unwrap_or(0.1);

        Ok(Self {
            database_url,
            host,
            port,
            offline_db_path,
            product_cache_ttl: Duration::from_secs(ttl_secs),
            log_json,
            sentry_dsn,
            sentry_environment,
            sentry_sample_rate,
            sentry_traces_sample_rate,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

struct Vars<F>(F);

impl<F> Vars<F>
where
    F: Fn(&str) -> Option<String>,
{
    /// Get an optional variable, treating an empty value as unset.
    fn optional(&self, key: &str) -> Option<String> {
        (self.0)(key).filter(|v| !v.trim().is_empty())
    }

    /// Get a variable with a default value.
    fn or_default(&self, key: &str, default: &str) -> String {
        self.optional(key).unwrap_or_else(|| default.to_string())
    }

    /// Parse a variable, falling back to a default.
    fn parsed<T>(&self, key: &str, default: &str) -> Result<T, ConfigError>
    where
        T: std::str::FromStr,
        T::Err: std::fmt::Display,
    {
        self.or_default(key, default)
            .trim()
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashMap;

    use secrecy::ExposeSecret;

    use super::*;

    fn load(pairs: &[(&str, &str)]) -> Result<BakeryConfig, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        BakeryConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&[("BAKERY_DATABASE_URL", "postgres://localhost/bakery")]).unwrap();

        assert_eq!(config.socket_addr().to_string(), "127.0.0.1:3002");
        assert_eq!(config.offline_db_path, PathBuf::from("bakery-offline.db"));
        assert_eq!(config.product_cache_ttl, Duration::from_secs(300));
        assert!(!config.log_json);
        assert!(config.sentry_dsn.is_none());
    }

    #[test]
    fn test_database_url_falls_back_to_generic_variable() {
        let config = load(&[("DATABASE_URL", "postgres://fallback/db")]).unwrap();
        assert_eq!(config.database_url.expose_secret(), "postgres://fallback/db");

        let config = load(&[
            ("BAKERY_DATABASE_URL", "postgres://primary/db"),
            ("DATABASE_URL", "postgres://fallback/db"),
        ])
        .unwrap();
        assert_eq!(config.database_url.expose_secret(), "postgres://primary/db");
    }

    #[test]
    fn test_missing_database_url() {
        let err = load(&[]).unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnvVar(ref key) if key == "BAKERY_DATABASE_URL"));
    }

    #[test]
    fn test_invalid_port() {
        let err = load(&[
            ("BAKERY_DATABASE_URL", "postgres://localhost/bakery"),
            ("BAKERY_PORT", "bakery"),
        ])
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnvVar(ref key, _) if key == "BAKERY_PORT"));
    }

    #[test]
    fn test_overrides() {
        let config = load(&[
            ("BAKERY_DATABASE_URL", "postgres://localhost/bakery"),
            ("BAKERY_HOST", "0.0.0.0"),
            ("BAKERY_PORT", "8080"),
            ("BAKERY_OFFLINE_DB", "/var/lib/bakery/cache.db"),
            ("BAKERY_PRODUCT_CACHE_TTL_SECS", "30"),
            ("BAKERY_LOG_JSON", "1"),
            ("SENTRY_SAMPLE_RATE", "0.5"),
        ])
        .unwrap();

        assert_eq!(config.socket_addr().to_string(), "0.0.0.0:8080");
        assert_eq!(config.offline_db_path, PathBuf::from("/var/lib/bakery/cache.db"));
        assert_eq!(config.product_cache_ttl, Duration::from_secs(30));
        assert!(config.log_json);
        assert!((config.sentry_sample_rate - 0.5).abs() < f32::EPSILON);
    }

    #[test]
    fn test_log_json_false_values() {
        for value in ["0", "false", ""] {
            let config = load(&[
                ("BAKERY_DATABASE_URL", "postgres://localhost/bakery"),
                ("BAKERY_LOG_JSON", value),
            ])
            .unwrap();
            assert!(!config.log_json, "BAKERY_LOG_JSON={value:?}");
        }
    }

    #[test]
    fn test_debug_redacts_database_url() {
        let config = load(&[("BAKERY_DATABASE_URL", "postgres://user:hunter2@db/bakery")]).unwrap();
        let debug_output = format!("{config:?}");
        assert!(!debug_output.contains("hunter2"));
    }
}
