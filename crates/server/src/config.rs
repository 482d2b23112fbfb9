//! Server configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `FAKESHION_DATABASE_URL` - `PostgreSQL` connection string (not needed when `FAKESHION_STORE=memory`)
//! - `FAKESHION_BACKEND_URL` - Public URL of this server (used for the gateway callback)
//! - `FAKESHION_FRONTEND_URL` - Public URL of the storefront (used for the payment redirect)
//! - `ZALOPAY_APP_ID` - ZaloPay merchant application id
//! - `ZALOPAY_KEY1` - Key signing outbound payment requests
//! - `ZALOPAY_KEY2` - Key verifying inbound payment callbacks
//! - `ZALOPAY_ENDPOINT` - ZaloPay create-order endpoint
//!
//! ## Optional
//! - `FAKESHION_HOST` - Bind address (default: 127.0.0.1)
//! - `FAKESHION_PORT` - Listen port (default: 4000)
//! - `FAKESHION_STORE` - `postgres` or `memory` (default: postgres)
//! - `FAKESHION_CACHE_ENABLED` - Enable the read-through cache (default: true)
//! - `FAKESHION_CACHE_MAX_ENTRIES` - Cache capacity (default: 10000)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use url::Url;

const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "password",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "enter-",
    "put-your",
    "add-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Server application configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Persistent store backing the API
    pub store: StoreConfig,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Read-through cache settings
    pub cache: CacheConfig,
    /// ZaloPay gateway configuration
    pub zalopay: ZaloPayConfig,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name
    pub sentry_environment: Option<String>,
}

/// Which persistent store to use.
#[derive(Debug, Clone)]
pub enum StoreConfig {
    /// `PostgreSQL` (connection URL contains a password)
    Postgres { database_url: SecretString },
    /// In-process store; data is lost on restart.
    Memory,
}

/// Read-through cache settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheConfig {
    /// When false every cache operation is a no-op and reads go to the store.
    pub enabled: bool,
    /// Maximum number of cached entries.
    pub max_entries: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_entries: 10_000,
        }
    }
}

/// ZaloPay gateway configuration.
///
/// Implements `Debug` manually to redact the signing keys.
#[derive(Clone)]
pub struct ZaloPayConfig {
    /// Merchant application id
    pub app_id: String,
    /// Signs outbound create-order requests
    pub key1: SecretString,
    /// Verifies inbound callbacks
    pub key2: SecretString,
    /// Create-order endpoint
    pub endpoint: Url,
    /// Where the gateway delivers payment callbacks
    pub callback_url: Url,
    /// Where the customer lands after paying
    pub redirect_url: Url,
}

impl std::fmt::Debug for ZaloPayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ZaloPayConfig")
            .field("app_id", &self.app_id)
            .field("key1", &"[REDACTED]")
            .field("key2", &"[REDACTED]")
            .field("endpoint", &self.endpoint.as_str())
            .field("callback_url", &self.callback_url.as_str())
            .field("redirect_url", &self.redirect_url.as_str())
            .finish()
    }
}

impl ServerConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if secrets fail validation (placeholder detection, entropy check,
    /// shared gateway keys).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let store = match get_env_or_default("FAKESHION_STORE", "postgres").as_str() {
            "postgres" => StoreConfig::Postgres {
                database_url: get_database_url("FAKESHION_DATABASE_URL")?,
            },
            "memory" => StoreConfig::Memory,
            other => {
                return Err(ConfigError::InvalidEnvVar(
                    "FAKESHION_STORE".to_string(),
                    format!("expected 'postgres' or 'memory', got '{other}'"),
                ));
            }
        };
        let host = get_env_or_default("FAKESHION_HOST", "127.0.0.1")
            .parse::<IpAddr>()
            .map_err(|e| {
                ConfigError::InvalidEnvVar("FAKESHION_HOST".to_string(), e.to_string())
            })?;
        let port = get_env_or_default("FAKESHION_PORT", "4000")
            .parse::<u16>()
            .map_err(|e| {
                ConfigError::InvalidEnvVar("FAKESHION_PORT".to_string(), e.to_string())
            })?;

        let cache = CacheConfig {
            enabled: get_env_or_default("FAKESHION_CACHE_ENABLED", "true")
                .parse::<bool>()
                .map_err(|e| {
                    ConfigError::InvalidEnvVar("FAKESHION_CACHE_ENABLED".to_string(), e.to_string())
                })?,
            max_entries: get_env_or_default("FAKESHION_CACHE_MAX_ENTRIES", "10000")
                .parse::<u64>()
                .map_err(|e| {
                    ConfigError::InvalidEnvVar(
                        "FAKESHION_CACHE_MAX_ENTRIES".to_string(),
                        e.to_string(),
                    )
                })?,
        };

        let backend_url = get_url("FAKESHION_BACKEND_URL")?;
        let frontend_url = get_url("FAKESHION_FRONTEND_URL")?;
        let zalopay = ZaloPayConfig::from_env(&backend_url, &frontend_url)?;

        Ok(Self {
            store,
            host,
            port,
            cache,
            zalopay,
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

impl ZaloPayConfig {
    fn from_env(backend_url: &Url, frontend_url: &Url) -> Result<Self, ConfigError> {
        let key1 = get_validated_secret("ZALOPAY_KEY1")?;
        let key2 = get_validated_secret("ZALOPAY_KEY2")?;
        validate_distinct_keys(&key1, &key2)?;

        let callback_url = join_url(backend_url, "api/payments/zalopay/callback", "FAKESHION_BACKEND_URL")?;
        let redirect_url = join_url(frontend_url, "me/orders", "FAKESHION_FRONTEND_URL")?;

        Ok(Self {
            app_id: get_required_env("ZALOPAY_APP_ID")?,
            key1,
            key2,
            endpoint: get_url("ZALOPAY_ENDPOINT")?,
            callback_url,
            redirect_url,
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get database URL with fallback to generic `DATABASE_URL`.
fn get_database_url(primary_key: &str) -> Result<SecretString, ConfigError> {
    if let Ok(value) = std::env::var(primary_key) {
        return Ok(SecretString::from(value));
    }
    if let Ok(value) = std::env::var("DATABASE_URL") {
        return Ok(SecretString::from(value));
    }
    Err(ConfigError::MissingEnvVar(primary_key.to_string()))
}

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Get a required environment variable and parse it as a URL.
fn get_url(key: &str) -> Result<Url, ConfigError> {
    let value = get_required_env(key)?;
    Url::parse(&value).map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

/// Append a path to a base URL, treating the base as a directory.
fn join_url(base: &Url, path: &str, var_name: &str) -> Result<Url, ConfigError> {
    let mut base = base.clone();
    if !base.path().ends_with('/') {
        let with_slash = format!("{}/", base.path());
        base.set_path(&with_slash);
    }
    base.join(path)
        .map_err(|e| ConfigError::InvalidEnvVar(var_name.to_string(), e.to_string()))
}

/// The outbound and inbound gateway keys must never be the same material.
fn validate_distinct_keys(key1: &SecretString, key2: &SecretString) -> Result<(), ConfigError> {
    if key1.expose_secret() == key2.expose_secret() {
        return Err(ConfigError::InsecureSecret(
            "ZALOPAY_KEY2".to_string(),
            "must differ from ZALOPAY_KEY1".to_string(),
        ));
    }
    Ok(())
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.len() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)] // Character count will never exceed f64 precision
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use a randomly generated secret."
            ),
        ));
    }

    Ok(())
}

/// Load and validate a secret from environment.
fn get_validated_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    validate_secret_strength(&value, key)?;
    Ok(SecretString::from(value))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn zalopay() -> ZaloPayConfig {
        ZaloPayConfig {
            app_id: "2553".to_string(),
            key1: SecretString::from("PcY4iZIKFCIdgZvA6ueMcMHHUbRLYjPL"),
            key2: SecretString::from("kLtgPl8HHhfvMuDHPwKfgfsY4Ydm9eIz"),
            endpoint: Url::parse("https://sb-openapi.zalopay.vn/v2/create").unwrap(),
            callback_url: Url::parse("http://localhost:4000/api/payments/zalopay/callback")
                .unwrap(),
            redirect_url: Url::parse("http://localhost:3000/me/orders").unwrap(),
        }
    }

    #[test]
    fn test_shannon_entropy_empty() {
        assert!((shannon_entropy("") - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_shannon_entropy_two_chars() {
        let entropy = shannon_entropy("ab");
        assert!((entropy - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_validate_secret_strength_placeholder() {
        let result = validate_secret_strength("your-zalopay-key", "TEST_VAR");
        assert!(matches!(result, Err(ConfigError::InsecureSecret(_, _))));
    }

    #[test]
    fn test_validate_secret_strength_low_entropy() {
        let result = validate_secret_strength("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa", "TEST_VAR");
        assert!(matches!(result, Err(ConfigError::InsecureSecret(_, _))));
    }

    #[test]
    fn test_validate_secret_strength_valid() {
        let result = validate_secret_strength("PcY4iZIKFCIdgZvA6ueMcMHHUbRLYjPL", "TEST_VAR");
        assert!(result.is_ok());
    }

    #[test]
    fn test_gateway_keys_must_differ() {
        let key = SecretString::from("PcY4iZIKFCIdgZvA6ueMcMHHUbRLYjPL");
        let same = SecretString::from("PcY4iZIKFCIdgZvA6ueMcMHHUbRLYjPL");
        assert!(validate_distinct_keys(&key, &same).is_err());

        let config = zalopay();
        assert!(validate_distinct_keys(&config.key1, &config.key2).is_ok());
    }

    #[test]
    fn test_join_url_keeps_base_path() {
        let base = Url::parse("https://shop.example.vn/backend").unwrap();
        let joined = join_url(&base, "api/payments/zalopay/callback", "TEST").unwrap();
        assert_eq!(
            joined.as_str(),
            "https://shop.example.vn/backend/api/payments/zalopay/callback"
        );
    }

    #[test]
    fn test_socket_addr() {
        let config = ServerConfig {
            store: StoreConfig::Memory,
            host: "127.0.0.1".parse().unwrap(),
            port: 4000,
            cache: CacheConfig::default(),
            zalopay: zalopay(),
            sentry_dsn: None,
            sentry_environment: None,
        };

        let addr = config.socket_addr();
        assert_eq!(addr.ip().to_string(), "127.0.0.1");
        assert_eq!(addr.port(), 4000);
    }

    #[test]
    fn test_zalopay_config_debug_redacts_keys() {
        let debug_output = format!("{:?}", zalopay());

        assert!(debug_output.contains("2553"));
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("PcY4iZIKFCIdgZvA6ueMcMHHUbRLYjPL"));
        assert!(!debug_output.contains("kLtgPl8HHhfvMuDHPwKfgfsY4Ydm9eIz"));
    }
}
