//! TMDB API error types

use thiserror::Error;

/// TMDB API client errors
#[derive(Error, Debug)]
pub enum TmdbError {
    /// API key is missing
    #[error("API key is required for TMDB API access")]
    MissingApiKey,

    /// API key was rejected (HTTP 401)
    #[error("TMDB rejected the API key")]
    InvalidApiKey,

    /// Invalid input provided to API method
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing failed
    #[error("Failed to parse TMDB response: {0}")]
    Parse(#[from] serde_json::Error),

    /// TMDB returned an error status
    #[error("TMDB API error {status}: {message}")]
    Api { status: u16, message: String },

    /// Movie not found
    #[error("Movie not found: {0}")]
    NotFound(i64),

    /// Rate limited by TMDB
    #[error("Rate limited by TMDB API")]
    RateLimited,

    /// Request timeout
    #[error("request timed out")]
    Timeout,
}

impl TmdbError {
    /// Check if this error is retryable (transient failure)
    ///
    /// Retries on timeouts, rate limiting, connection failures and 5xx.
    /// Never retries other client errors.
    pub fn is_retryable(&self) -> bool {
        match self {
            TmdbError::Timeout | TmdbError::RateLimited => true,
            TmdbError::Api { status, .. } => *status >= 500,
            TmdbError::Http(e) => {
                if e.is_timeout() || e.is_connect() {
                    return true;
                }
                matches!(e.status(), Some(status) if status.is_server_error())
            }
            _ => false,
        }
    }
}

/// Result type for TMDB operations
pub type TmdbResult<T> = Result<T, TmdbError>;
