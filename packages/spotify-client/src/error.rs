//! Spotify client error types

use thiserror::Error;

/// Spotify client errors
#[derive(Error, Debug)]
pub enum SpotifyError {
    /// Client credentials are missing
    #[error("Spotify client id and secret are required")]
    MissingCredentials,

    /// Credentials were rejected by the accounts service
    #[error("Spotify rejected the client credentials")]
    Unauthorized,

    /// Invalid input provided to API method
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing failed
    #[error("Failed to parse Spotify response: {0}")]
    Parse(#[from] serde_json::Error),

    /// Spotify returned an error status
    #[error("Spotify API error {status}: {message}")]
    Api { status: u16, message: String },

    /// Rate limited by Spotify
    #[error("Rate limited by Spotify API")]
    RateLimited,

    /// Request timeout
    #[error("request timed out")]
    Timeout,
}

/// Result type for Spotify operations
pub type SpotifyResult<T> = Result<T, SpotifyError>;
