//! Checkout configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `MADRONA_API_URL` - Base URL of the commerce backend REST API
//! - `MADRONA_API_TOKEN` - Backend API token (validated for strength)
//! - `PAYMENT_GATEWAY_URL` - Base URL of the payment gateway REST API
//! - `PAYMENT_GATEWAY_CLIENT_ID` - Gateway OAuth client ID
//! - `PAYMENT_GATEWAY_CLIENT_SECRET` - Gateway OAuth client secret
//!
//! ## Optional
//! - `MADRONA_CURRENCY` - ISO 4217 checkout currency (default: USD)
//! - `MADRONA_STATE_PATH` - Durable client state file (default: madrona-state.json)
//! - `PAYMENT_POLL_INTERVAL_SECS` - Seconds between payment polls (default: 10)
//! - `PAYMENT_POLL_MAX_ATTEMPTS` - Poll attempt ceiling (default: 30)

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use madrona_core::CurrencyCode;
use secrecy::SecretString;
use thiserror::Error;

const DEFAULT_POLL_INTERVAL_SECS: u64 = 10;
const DEFAULT_POLL_MAX_ATTEMPTS: u32 = 30;

const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "secret",
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

/// Checkout subsystem configuration.
#[derive(Debug, Clone)]
pub struct CheckoutConfig {
    /// Commerce backend REST base URL (no trailing slash).
    pub commerce_api_url: String,
    /// Commerce backend API token.
    pub commerce_api_token: SecretString,
    /// Checkout currency.
    pub currency: CurrencyCode,
    /// Path of the durable client-local state file.
    pub state_path: PathBuf,
    /// Payment gateway configuration.
    pub gateway: GatewayConfig,
    /// Wait between payment status polls.
    pub poll_interval: Duration,
    /// Payment status poll attempt ceiling.
    pub poll_max_attempts: u32,
}

/// Payment gateway API configuration.
///
/// Implements `Debug` manually to redact the client secret.
#[derive(Clone)]
pub struct GatewayConfig {
    /// Gateway REST base URL (no trailing slash).
    pub api_url: String,
    /// OAuth client ID.
    pub client_id: String,
    /// OAuth client secret.
    pub client_secret: SecretString,
}

impl std::fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("api_url", &self.api_url)
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .finish()
    }
}

impl CheckoutConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if secrets fail validation (placeholder detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let commerce_api_url = get_required_url("MADRONA_API_URL")?;
        let commerce_api_token = get_validated_secret("MADRONA_API_TOKEN")?;
        let currency = get_env_or_default("MADRONA_CURRENCY", "USD")
            .parse::<CurrencyCode>()
            .map_err(|e| ConfigError::InvalidEnvVar("MADRONA_CURRENCY".to_string(), e))?;
        let state_path =
            PathBuf::from(get_env_or_default("MADRONA_STATE_PATH", "madrona-state.json"));

        let gateway = GatewayConfig::from_env()?;

        let poll_interval_secs = parse_env_or_default(
            "PAYMENT_POLL_INTERVAL_SECS",
            DEFAULT_POLL_INTERVAL_SECS,
        )?;
        let poll_max_attempts = parse_env_or_default(
            "PAYMENT_POLL_MAX_ATTEMPTS",
            DEFAULT_POLL_MAX_ATTEMPTS,
        )?;
        if poll_max_attempts == 0 {
            return Err(ConfigError::InvalidEnvVar(
                "PAYMENT_POLL_MAX_ATTEMPTS".to_string(),
                "must be at least 1".to_string(),
            ));
        }

        Ok(Self {
            commerce_api_url,
            commerce_api_token,
            currency,
            state_path,
            gateway,
            poll_interval: Duration::from_secs(poll_interval_secs),
            poll_max_attempts,
        })
    }
}

impl GatewayConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            api_url: get_required_url("PAYMENT_GATEWAY_URL")?,
            client_id: get_required_env("PAYMENT_GATEWAY_CLIENT_ID")?,
            client_secret: get_validated_secret("PAYMENT_GATEWAY_CLIENT_SECRET")?,
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

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Parse an environment variable into a number, with a default when absent.
fn parse_env_or_default<T: std::str::FromStr>(key: &str, default: T) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string())),
        Err(_) => Ok(default),
    }
}

/// Get a required environment variable that must parse as an absolute URL.
///
/// The returned string has no trailing slash so clients can join paths
/// uniformly.
fn get_required_url(key: &str) -> Result<String, ConfigError> {
    let raw = get_required_env(key)?;
    url::Url::parse(&raw)
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))?;
    Ok(normalize_url(raw))
}

/// Strip a trailing slash so clients can join paths uniformly.
fn normalize_url(url: String) -> String {
    url.trim_end_matches('/').to_string()
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

    // Check blocklist
    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    // Check entropy (real secrets like API keys have high entropy)
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
