use crate::error::ConfigError;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Default log-aggregation intake endpoint
pub const DEFAULT_DATADOG_URL: &str = "https://api.datadoghq.com/api/v1/logs";

/// Prefix for environment variable overrides
pub const ENV_PREFIX: &str = "CONSOLE_RELAY_";

/// Built-in critical keywords, matched case-insensitively as substrings
pub const DEFAULT_CRITICAL_KEYWORDS: [&str; 12] = [
    "error",
    "fatal",
    "critical",
    "exception",
    "crash",
    "fail",
    "timeout",
    "unauthorized",
    "forbidden",
    "server error",
    "database error",
    "connection lost",
];

/// Relay configuration
///
/// Every recognised option is listed here; unknown keys in a config file are
/// rejected rather than carried along.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Destination for text messages and calls
    pub phone_number: Option<String>,
    /// Endpoint receiving text, call and generic webhook payloads
    pub webhook_url: Option<String>,
    /// Enables the log-aggregation channel when present
    pub datadog_api_key: Option<String>,
    /// Log-aggregation intake endpoint
    pub datadog_url: String,
    /// Substrings that escalate warnings and errors to critical notifications
    pub critical_keywords: Vec<String>,
    pub enable_text: bool,
    pub enable_call: bool,
    /// Sliding window length in milliseconds
    pub rate_limit_window_ms: u64,
    /// Maximum admitted notifications per key within the window
    pub rate_limit_max: usize,
    /// Upper bound on a single channel request
    pub request_timeout_ms: u64,
    /// Log level the binary uses when `RUST_LOG` is unset
    pub log_level: String,
    /// Carried for compatibility; dispatch performs no retries
    pub max_retries: u32,
    /// Carried for compatibility; dispatch performs no retries
    pub retry_delay_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            phone_number: None,
            webhook_url: None,
            datadog_api_key: None,
            datadog_url: DEFAULT_DATADOG_URL.to_string(),
            critical_keywords: DEFAULT_CRITICAL_KEYWORDS
                .iter()
                .map(|k| k.to_string())
                .collect(),
            enable_text: false,
            enable_call: false,
            rate_limit_window_ms: 60_000,
            rate_limit_max: 5,
            request_timeout_ms: 10_000,
            log_level: "info".to_string(),
            max_retries: 3,
            retry_delay_ms: 1000,
        }
    }
}

impl Config {
    /// Build a configuration from a named preset
    ///
    /// Known presets are `default`, `production` and `development`.
    pub fn preset(name: &str) -> Result<Self, ConfigError> {
        let base = Self::default();
        match name {
            "default" => Ok(base),
            "production" => Ok(Self {
                enable_text: true,
                enable_call: true,
                log_level: "error".to_string(),
                ..base
            }),
            "development" => Ok(Self {
                enable_text: false,
                enable_call: false,
                log_level: "debug".to_string(),
                ..base
            }),
            other => Err(ConfigError::UnknownPreset(other.to_string())),
        }
    }

    /// Load configuration from a TOML file
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ReadError` if the file cannot be read, or a parse
    /// or validation error if its contents are invalid.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadError(format!("{}: {}", path.display(), e)))?;
        debug!("Loaded configuration file {}", path.display());
        Self::from_toml_str(&content)
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Render this configuration as TOML
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Apply `CONSOLE_RELAY_*` overrides from the process environment
    pub fn apply_env(&mut self) {
        self.apply_overrides(|key| std::env::var(format!("{}{}", ENV_PREFIX, key)).ok());
    }

    /// Apply overrides from an arbitrary lookup keyed by the unprefixed variable name
    ///
    /// Numeric values that fail to parse leave the current value in place.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(phone) = lookup("PHONE_NUMBER") {
            self.phone_number = Some(phone);
        }
        if let Some(url) = lookup("WEBHOOK_URL") {
            self.webhook_url = Some(url);
        }
        if let Some(key) = lookup("DATADOG_API_KEY") {
            self.datadog_api_key = Some(key);
        }
        if let Some(flag) = lookup("ENABLE_TEXT") {
            self.enable_text = flag == "true";
        }
        if let Some(flag) = lookup("ENABLE_CALL") {
            self.enable_call = flag == "true";
        }
        if let Some(raw) = lookup("RATE_LIMIT_MAX") {
            match raw.parse() {
                Ok(max) => self.rate_limit_max = max,
                Err(_) => warn!("Ignoring unparseable {}RATE_LIMIT_MAX: {}", ENV_PREFIX, raw),
            }
        }
        if let Some(raw) = lookup("RATE_LIMIT_WINDOW") {
            match raw.parse() {
                Ok(window) => self.rate_limit_window_ms = window,
                Err(_) => warn!(
                    "Ignoring unparseable {}RATE_LIMIT_WINDOW: {}",
                    ENV_PREFIX, raw
                ),
            }
        }
    }

    /// Validate value ranges
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.rate_limit_max == 0 {
            return Err(ConfigError::ValidationError(
                "rate_limit_max must be at least 1".to_string(),
            ));
        }
        if self.rate_limit_window_ms == 0 {
            return Err(ConfigError::ValidationError(
                "rate_limit_window_ms must be positive".to_string(),
            ));
        }
        if self.critical_keywords.iter().any(|k| k.is_empty()) {
            return Err(ConfigError::ValidationError(
                "critical_keywords must not contain empty strings".to_string(),
            ));
        }
        Ok(())
    }

    pub fn rate_limit_window(&self) -> Duration {
        Duration::from_millis(self.rate_limit_window_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}
