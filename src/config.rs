//! Configuration module for bottlemail.

use serde::Deserialize;
use std::path::Path;

use crate::{BottleError, Result};

/// HTTP server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port number to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_db_path")]
    pub path: String,
}

fn default_db_path() -> String {
    "data/bottlemail.db".to_string()
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Path to the log file.
    #[serde(default = "default_log_file")]
    pub file: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_file() -> String {
    "logs/bottlemail.log".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: default_log_file(),
        }
    }
}

/// Outbound mail configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct MailConfig {
    /// Mail provider ("log" or "sendgrid").
    #[serde(default = "default_mail_provider")]
    pub provider: String,
    /// Provider API key.
    #[serde(default)]
    pub api_key: String,
    /// Provider send endpoint.
    #[serde(default = "default_mail_api_url")]
    pub api_url: String,
    /// Sender address for all outgoing mail.
    #[serde(default = "default_from_email")]
    pub from_email: String,
    /// Sender display name for delivered bottles.
    #[serde(default = "default_from_name")]
    pub from_name: String,
    /// Sender display name for confirmation requests.
    #[serde(default = "default_confirm_from_name")]
    pub confirm_from_name: String,
    /// Request timeout in seconds.
    #[serde(default = "default_mail_timeout")]
    pub timeout_secs: u64,
}

fn default_mail_provider() -> String {
    "log".to_string()
}

fn default_mail_api_url() -> String {
    "https://api.sendgrid.com/v3/mail/send".to_string()
}

fn default_from_email() -> String {
    "noreply@bottle.email".to_string()
}

fn default_from_name() -> String {
    "You from the past".to_string()
}

fn default_confirm_from_name() -> String {
    "bottle.email".to_string()
}

fn default_mail_timeout() -> u64 {
    30
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            provider: default_mail_provider(),
            api_key: String::new(),
            api_url: default_mail_api_url(),
            from_email: default_from_email(),
            from_name: default_from_name(),
            confirm_from_name: default_confirm_from_name(),
            timeout_secs: default_mail_timeout(),
        }
    }
}

/// Confirmation link configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ConfirmConfig {
    /// Base URL of the confirmation endpoint. The bottle id is appended as
    /// the `id` query parameter. Links already sent depend on this value.
    #[serde(default = "default_confirm_base_url")]
    pub base_url: String,
}

fn default_confirm_base_url() -> String {
    "http://localhost:8080/confirmBottle".to_string()
}

impl Default for ConfirmConfig {
    fn default() -> Self {
        Self {
            base_url: default_confirm_base_url(),
        }
    }
}

/// Submission limits.
#[derive(Debug, Clone, Deserialize)]
pub struct LimitsConfig {
    /// Maximum outstanding unconfirmed bottles per address.
    #[serde(default = "default_max_unconfirmed")]
    pub max_unconfirmed: i64,
    /// Maximum message length in characters.
    #[serde(default = "default_max_text_length")]
    pub max_text_length: usize,
}

fn default_max_unconfirmed() -> i64 {
    2
}

fn default_max_text_length() -> usize {
    10000
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_unconfirmed: default_max_unconfirmed(),
            max_text_length: default_max_text_length(),
        }
    }
}

/// Delivery reconciler configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ReconcilerConfig {
    /// Whether the background sweep runs.
    #[serde(default = "default_reconciler_enabled")]
    pub enabled: bool,
    /// Seconds between sweeps.
    #[serde(default = "default_reconciler_interval")]
    pub interval_secs: u64,
    /// Wall-clock ceiling for one sweep in seconds.
    #[serde(default = "default_sweep_timeout")]
    pub sweep_timeout_secs: u64,
    /// Bottles claimed per database round trip.
    #[serde(default = "default_batch_size")]
    pub batch_size: u32,
    /// Concurrent dispatches per sweep.
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
    /// Seconds after which a `sending` claim is considered abandoned.
    #[serde(default = "default_stale_after")]
    pub stale_after_secs: u64,
    /// Maximum dispatch claims per bottle.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: i64,
}

fn default_reconciler_enabled() -> bool {
    true
}

fn default_reconciler_interval() -> u64 {
    300 // 5 minutes
}

fn default_sweep_timeout() -> u64 {
    540 // 9 minutes
}

fn default_batch_size() -> u32 {
    100
}

fn default_max_concurrency() -> usize {
    16
}

fn default_stale_after() -> u64 {
    900 // 15 minutes
}

/// Longest accepted stale window (ten years).
const MAX_STALE_AFTER_SECS: u64 = 10 * 365 * 24 * 60 * 60;

fn default_max_attempts() -> i64 {
    2
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            enabled: default_reconciler_enabled(),
            interval_secs: default_reconciler_interval(),
            sweep_timeout_secs: default_sweep_timeout(),
            batch_size: default_batch_size(),
            max_concurrency: default_max_concurrency(),
            stale_after_secs: default_stale_after(),
            max_attempts: default_max_attempts(),
        }
    }
}

/// Web API configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct WebConfig {
    /// CORS allowed origins. Empty allows any origin.
    #[serde(default)]
    pub cors_origins: Vec<String>,
    /// Rate limit for the submit endpoint (requests per minute per IP).
    #[serde(default = "default_submit_rate_limit")]
    pub submit_rate_limit: u32,
}

fn default_submit_rate_limit() -> u32 {
    10
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            cors_origins: vec![],
            submit_rate_limit: default_submit_rate_limit(),
        }
    }
}

/// Main configuration structure.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    /// Server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Database configuration.
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Mail configuration.
    #[serde(default)]
    pub mail: MailConfig,
    /// Confirmation link configuration.
    #[serde(default)]
    pub confirm: ConfirmConfig,
    /// Submission limits.
    #[serde(default)]
    pub limits: LimitsConfig,
    /// Reconciler configuration.
    #[serde(default)]
    pub reconciler: ReconcilerConfig,
    /// Web API configuration.
    #[serde(default)]
    pub web: WebConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(BottleError::Io)?;
        Self::parse(&content)
    }

    /// Load configuration from a TOML file and apply environment variable overrides.
    pub fn load_with_env<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| BottleError::Config(format!("config parse error: {e}")))
    }

    /// Apply environment variable overrides to the configuration.
    ///
    /// Supported environment variables:
    /// - `BOTTLEMAIL_MAIL_API_KEY`: mail provider API key
    /// - `BOTTLEMAIL_CONFIRM_BASE_URL`: confirmation link base URL
    pub fn apply_env_overrides(&mut self) {
        if let Ok(api_key) = std::env::var("BOTTLEMAIL_MAIL_API_KEY") {
            if !api_key.is_empty() {
                self.mail.api_key = api_key;
            }
        }
        if let Ok(base_url) = std::env::var("BOTTLEMAIL_CONFIRM_BASE_URL") {
            if !base_url.is_empty() {
                self.confirm.base_url = base_url;
            }
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        match self.mail.provider.as_str() {
            "log" => {}
            "sendgrid" => {
                if self.mail.api_key.is_empty() {
                    return Err(BottleError::Config(
                        "mail provider is sendgrid but api_key is not set. \
                         Set it in config.toml or via BOTTLEMAIL_MAIL_API_KEY."
                            .to_string(),
                    ));
                }
            }
            other => {
                return Err(BottleError::Config(format!(
                    "unknown mail provider: {other}"
                )));
            }
        }

        url::Url::parse(&self.confirm.base_url)
            .map_err(|e| BottleError::Config(format!("invalid confirm.base_url: {e}")))?;

        let r = &self.reconciler;
        if r.interval_secs == 0 || r.batch_size == 0 || r.max_concurrency == 0 {
            return Err(BottleError::Config(
                "reconciler interval_secs, batch_size and max_concurrency must be positive"
                    .to_string(),
            ));
        }
        if r.max_attempts < 1 {
            return Err(BottleError::Config(
                "reconciler.max_attempts must be at least 1".to_string(),
            ));
        }
        if r.sweep_timeout_secs == 0 {
            return Err(BottleError::Config(
                "reconciler.sweep_timeout_secs must be positive".to_string(),
            ));
        }
        // A claim younger than the sweep ceiling may still be in flight.
        if r.stale_after_secs <= r.sweep_timeout_secs {
            return Err(BottleError::Config(format!(
                "reconciler.stale_after_secs ({}) must exceed sweep_timeout_secs ({})",
                r.stale_after_secs, r.sweep_timeout_secs
            )));
        }
        if r.stale_after_secs > MAX_STALE_AFTER_SECS {
            return Err(BottleError::Config(format!(
                "reconciler.stale_after_secs must be at most {MAX_STALE_AFTER_SECS}"
            )));
        }
        Ok(())
    }
}
