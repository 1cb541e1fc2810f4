//! Error types for the maintainers tooling

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for maintainers operations
pub type Result<T> = std::result::Result<T, MaintainersError>;

/// Main error type for maintainers operations
#[derive(Error, Debug)]
pub enum MaintainersError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("YAML parse error at line {line}, column {column}: {message}")]
    YamlParse {
        message: String,
        line: usize,
        column: usize,
    },

    #[error("YAML emit error: {0}")]
    YamlEmit(String),

    #[error("Unsupported YAML construct: {0}")]
    UnsupportedYaml(String),

    #[error("Schema error in {path}: {source}")]
    Schema {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("JSON serialization error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("HTTP request error: {0}")]
    ReqwestError(#[from] reqwest::Error),

    #[error("Network error: {0}")]
    NetworkError(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("API error from {service}: {message}")]
    ApiError { service: String, message: String },

    #[error("Rate limit exceeded for {service}. Retry after: {retry_after:?}")]
    RateLimitExceeded {
        service: String,
        retry_after: Option<std::time::Duration>,
    },

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Failed to rewrite {path} at user #{user_index} ({user}): {source}")]
    Rewrite {
        path: PathBuf,
        user_index: usize,
        user: String,
        #[source]
        source: Box<MaintainersError>,
    },
}

#[derive(Debug)]
struct StringError(String);

impl std::fmt::Display for StringError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for StringError {}

impl MaintainersError {
    /// Create a network error
    pub fn network(msg: impl Into<String>) -> Self {
        Self::NetworkError(Box::new(StringError(msg.into())))
    }

    /// Create an API error
    pub fn api(service: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ApiError {
            service: service.into(),
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    /// Create an unsupported-YAML error
    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::UnsupportedYaml(msg.into())
    }

    /// Wrap a schema decode failure with the file it came from
    pub fn schema(path: impl Into<PathBuf>, source: serde_yaml::Error) -> Self {
        Self::Schema {
            path: path.into(),
            source,
        }
    }
}
