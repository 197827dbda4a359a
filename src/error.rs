use thiserror::Error;

/// Errors that can occur while delivering a notification to a channel
///
/// These never escape the dispatch pipeline; they are reported on the
/// original sink and folded into the dispatch report.
#[derive(Error, Debug)]
pub enum DeliveryError {
    #[error("Transport failure: {0}")]
    Transport(String),

    #[error("HTTP {status}")]
    Status { status: u16 },

    #[error("Request timed out")]
    Timeout,

    #[error("Failed to serialize payload: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<reqwest::Error> for DeliveryError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            DeliveryError::Timeout
        } else {
            DeliveryError::Transport(error.to_string())
        }
    }
}

/// Errors that can occur during configuration loading
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(String),

    #[error("Failed to parse config: {0}")]
    ParseError(String),

    #[error("Invalid configuration value: {0}")]
    ValidationError(String),

    #[error("Unknown configuration preset: {0}")]
    UnknownPreset(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlError(#[from] toml::de::Error),
}

/// Errors raised when taking over a sink
#[derive(Error, Debug, PartialEq, Eq)]
pub enum InterceptError {
    #[error("Engine already owns an intercepted sink; release it first")]
    AlreadyIntercepted,
}
