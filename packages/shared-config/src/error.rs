//! Configuration error types

use thiserror::Error;

/// Errors raised while loading configuration at startup
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    /// Variable is set but does not parse or is out of range
    #[error("invalid value for {0}: {1}")]
    InvalidValue(String, String),

    #[error("{0} must be an http(s) URL, got '{1}'")]
    InvalidUrl(String, String),

    /// Optional credentials must be provided together or not at all
    #[error("{0} and {1} must be set together")]
    IncompleteCredentials(&'static str, &'static str),
}

pub type ConfigResult<T> = Result<T, ConfigError>;
