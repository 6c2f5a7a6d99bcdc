//! Error types for the Ollama client

use thiserror::Error;

/// Errors that can occur when talking to Ollama
#[derive(Error, Debug)]
pub enum OllamaError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    /// Failed to serialize/deserialize JSON
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Ollama API returned an error
    #[error("Ollama API error: {0}")]
    ApiError(String),

    /// Model not found or not pulled
    #[error("Model not found: {0}. Try running 'ollama pull {0}'")]
    ModelNotFound(String),

    /// Request timeout
    #[error("Request timed out after {0} seconds")]
    Timeout(u64),

    /// Embedding dimension mismatch
    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Connection refused (Ollama not running)
    #[error("Connection refused. Is Ollama running at {0}?")]
    ConnectionRefused(String),

    /// All retry attempts exhausted
    #[error("All {attempts} retry attempts failed. Last error: {last_error}")]
    RetriesExhausted {
        attempts: u32,
        last_error: String,
        timed_out: bool,
    },
}

impl OllamaError {
    /// Check if this error is retryable (transient)
    ///
    /// Client errors (4xx) surfaced as `ApiError` are never retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            OllamaError::Timeout(_) | OllamaError::ConnectionRefused(_) => true,
            OllamaError::HttpError(e) => {
                e.is_timeout()
                    || e.is_connect()
                    || matches!(e.status(), Some(status) if status.is_server_error())
            }
            _ => false,
        }
    }

    /// Whether the failure was caused by a timeout (possibly after retries)
    pub fn is_timeout(&self) -> bool {
        match self {
            OllamaError::Timeout(_) => true,
            OllamaError::HttpError(e) => e.is_timeout(),
            OllamaError::RetriesExhausted { timed_out, .. } => *timed_out,
            _ => false,
        }
    }
}

/// Result type for Ollama operations
pub type OllamaResult<T> = Result<T, OllamaError>;
