//! Server configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `SHOPVOX_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//! - `OPENAI_API_KEY` - `OpenAI` API key used for query and catalog embeddings
//!
//! ## Optional
//! - `SHOPVOX_HOST` - Bind address (default: 127.0.0.1)
//! - `SHOPVOX_PORT` - Listen port (default: 3002)
//! - `SHOPVOX_CURRENCY` - Catalog currency (default: RUB)
//! - `OPENAI_EMBEDDING_MODEL` - Embedding model (default: text-embedding-3-small)
//! - `OPENAI_EMBEDDING_DIMENSIONS` - Vector length (default: 1536)
//! - `OPENAI_BASE_URL` - Override the embeddings endpoint
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT`, `SENTRY_SAMPLE_RATE`, `SENTRY_TRACES_SAMPLE_RATE`
//!
//! ## Optional (search tuning)
//! - `SEARCH_RESULT_LIMIT` - Products returned per search (default: 5)
//! - `SEARCH_CANDIDATE_MULTIPLIER` - Nearest neighbours fetched per result slot (default: 2)
//! - `SEARCH_EXACT_THRESHOLD` (0.4), `SEARCH_TOKEN_THRESHOLD` (0.5),
//!   `SEARCH_FALLBACK_THRESHOLD` (0.4), `SEARCH_LAST_RESORT_THRESHOLD` (0.25)
//!
//! ## Optional (embedding backfill)
//! - `BACKFILL_CONCURRENCY` (2), `BACKFILL_DELAY_MS` (200),
//!   `BACKFILL_MAX_ATTEMPTS` (3), `BACKFILL_BATCH_SIZE` (500)

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

use secrecy::SecretString;
use thiserror::Error;

use shopvox_core::CurrencyCode;

use crate::embeddings::{DEFAULT_EMBEDDING_DIMENSIONS, DEFAULT_EMBEDDING_MODEL};
use crate::indexing::BackfillConfig;
use crate::search::RankingConfig;

const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;
const DEFAULT_EMBEDDING_TIMEOUT_SECS: u64 = 30;

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

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Currency catalog prices are stored in
    pub currency: CurrencyCode,
    /// `OpenAI` embeddings configuration
    pub openai: OpenAIConfig,
    /// Retrieval and ranking settings
    pub search: SearchSettings,
    /// Embedding backfill worker settings
    pub backfill: BackfillConfig,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment (e.g., "development", "staging", "production")
    pub sentry_environment: Option<String>,
    /// Sentry error sample rate (0.0 to 1.0)
    pub sentry_sample_rate: f32,
    /// Sentry traces sample rate for performance monitoring (0.0 to 1.0)
    pub sentry_traces_sample_rate: f32,
}

/// `OpenAI` API configuration for embeddings.
///
/// Implements `Debug` manually to redact the API key.
#[derive(Clone)]
pub struct OpenAIConfig {
    /// `OpenAI` API key
    pub api_key: SecretString,
    /// Embedding model; changing it invalidates every stored vector
    pub model: String,
    /// Requested vector length
    pub dimensions: usize,
    /// Per-request timeout
    pub timeout: Duration,
    /// Endpoint override (proxies, local mocks)
    pub base_url: Option<String>,
}

impl std::fmt::Debug for OpenAIConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAIConfig")
            .field("api_key", &"[REDACTED]")
            .field("model", &self.model)
            .field("dimensions", &self.dimensions)
            .field("timeout", &self.timeout)
            .field("base_url", &self.base_url)
            .finish()
    }
}

/// Retrieval and ranking settings.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchSettings {
    /// Default number of products returned per search
    pub result_limit: usize,
    /// Nearest neighbours fetched per entity type = `limit * candidate_multiplier`
    pub candidate_multiplier: usize,
    /// Tier thresholds for the ranking cascade
    pub ranking: RankingConfig,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            result_limit: 5,
            candidate_multiplier: 2,
            ranking: RankingConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or a value
    /// fails to parse or validate.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let database_url = get_database_url("SHOPVOX_DATABASE_URL")?;
        let host = parse_env("SHOPVOX_HOST", "127.0.0.1")?;
        let port = parse_env("SHOPVOX_PORT", "3002")?;
        let currency = parse_env("SHOPVOX_CURRENCY", "RUB")?;
        let openai = OpenAIConfig::from_env()?;
        let search = SearchSettings::from_env()?;
        let backfill = backfill_from_env()?;
        let sentry_dsn = get_optional_env("SENTRY_DSN");
        let sentry_environment = get_optional_env("SENTRY_ENVIRONMENT");
        let sentry_sample_rate = get_optional_env("SENTRY_SAMPLE_RATE")
            .and_then(|s| s.parse().ok())
            .unwrap_or(1.0);
        let sentry_traces_sample_rate = get_optional_env("SENTRY_TRACES_SAMPLE_RATE")
            .and_then(|s| s.parse().ok())
            .unwrap_or(1.0);

        Ok(Self {
            database_url,
            host,
            port,
            currency,
            openai,
            search,
            backfill,
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

impl OpenAIConfig {
    /// Load `OpenAI` configuration from environment.
    ///
    /// A weak-looking key is only warned about; the API rejects bad keys anyway.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if `OPENAI_API_KEY` is missing or the model
    /// settings do not parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        let key = get_required_env("OPENAI_API_KEY")?;
        if let Err(e) = validate_secret_strength(&key, "OPENAI_API_KEY") {
            tracing::warn!("OPENAI_API_KEY validation warning: {e}");
        }
        let dimensions: usize = parse_env(
            "OPENAI_EMBEDDING_DIMENSIONS",
            &DEFAULT_EMBEDDING_DIMENSIONS.to_string(),
        )?;
        if dimensions == 0 {
            return Err(ConfigError::InvalidEnvVar(
                "OPENAI_EMBEDDING_DIMENSIONS".to_string(),
                "must be greater than zero".to_string(),
            ));
        }

        Ok(Self {
            api_key: SecretString::from(key),
            model: get_env_or_default("OPENAI_EMBEDDING_MODEL", DEFAULT_EMBEDDING_MODEL),
            dimensions,
            timeout: Duration::from_secs(DEFAULT_EMBEDDING_TIMEOUT_SECS),
            base_url: get_optional_env("OPENAI_BASE_URL"),
        })
    }
}

impl SearchSettings {
    fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let result_limit = parse_env_or("SEARCH_RESULT_LIMIT", defaults.result_limit)?;
        let candidate_multiplier =
            parse_env_or("SEARCH_CANDIDATE_MULTIPLIER", defaults.candidate_multiplier)?;
        if result_limit == 0 || candidate_multiplier == 0 {
            return Err(ConfigError::InvalidEnvVar(
                "SEARCH_*".to_string(),
                "result limit and candidate multiplier must be positive".to_string(),
            ));
        }

        let d = defaults.ranking;
        let ranking = RankingConfig {
            exact_threshold: threshold_env("SEARCH_EXACT_THRESHOLD", d.exact_threshold)?,
            token_threshold: threshold_env("SEARCH_TOKEN_THRESHOLD", d.token_threshold)?,
            fallback_threshold: threshold_env("SEARCH_FALLBACK_THRESHOLD", d.fallback_threshold)?,
            last_resort_threshold: threshold_env(
                "SEARCH_LAST_RESORT_THRESHOLD",
                d.last_resort_threshold,
            )?,
            min_token_chars: d.min_token_chars,
        };

        Ok(Self {
            result_limit,
            candidate_multiplier,
            ranking,
        })
    }
}

/// Load backfill worker settings from environment.
///
/// # Errors
///
/// Returns `ConfigError` if a value does not parse or is zero where a
/// positive value is required.
pub fn backfill_from_env() -> Result<BackfillConfig, ConfigError> {
    let defaults = BackfillConfig::default();
    let default_delay_ms = u64::try_from(defaults.delay.as_millis()).unwrap_or(u64::MAX);

    let concurrency = parse_env_or("BACKFILL_CONCURRENCY", defaults.concurrency)?;
    let delay_ms = parse_env_or("BACKFILL_DELAY_MS", default_delay_ms)?;
    let max_attempts = parse_env_or("BACKFILL_MAX_ATTEMPTS", defaults.max_attempts)?;
    let batch_size = parse_env_or("BACKFILL_BATCH_SIZE", defaults.batch_size)?;

    if concurrency == 0 || max_attempts == 0 || batch_size == 0 {
        return Err(ConfigError::InvalidEnvVar(
            "BACKFILL_*".to_string(),
            "concurrency, attempts and batch size must be positive".to_string(),
        ));
    }

    Ok(BackfillConfig {
        concurrency,
        delay: Duration::from_millis(delay_ms),
        max_attempts,
        batch_size,
    })
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get database URL with fallback to generic `DATABASE_URL` (used by Fly.io postgres attach).
///
/// # Errors
///
/// Returns `ConfigError::MissingEnvVar` when neither variable is set.
pub fn get_database_url(primary_key: &str) -> Result<SecretString, ConfigError> {
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

/// Parse an environment variable, falling back to a textual default.
fn parse_env<T>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    get_env_or_default(key, default)
        .trim()
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

/// Parse an optional environment variable, falling back to a typed default.
fn parse_env_or<T>(key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    get_optional_env(key).map_or(Ok(default), |raw| {
        raw.trim()
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
    })
}

/// Parse a similarity threshold and check it lies in `[0, 1]`.
fn threshold_env(key: &str, default: f64) -> Result<f64, ConfigError> {
    let value: f64 = parse_env_or(key, default)?;
    validate_threshold(value, key)
}

fn validate_threshold(value: f64, key: &str) -> Result<f64, ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            format!("{value} is outside [0, 1]"),
        ))
    }
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
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1})"
            ),
        ));
    }

    Ok(())
}
