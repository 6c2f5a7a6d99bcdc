//! Ollama configuration types

use crate::{get_env_or_default, parse_env, ConfigError, ConfigResult};

/// Ollama service configuration
///
/// The chat model must support native tool calling (llama3.1, qwen2.5,
/// mistral-nemo and similar).
#[derive(Debug, Clone)]
pub struct OllamaConfig {
    /// Ollama server URL
    pub url: String,

    /// LLM model used for chat and tool calling
    pub model: String,

    /// Embedding model for vector search (e.g., nomic-embed-text)
    pub embedding_model: String,

    /// Request timeout in seconds
    pub timeout_secs: u64,

    /// Maximum tokens for generation
    pub max_tokens: u32,

    /// Temperature for generation (0.0 - 1.0)
    pub temperature: f32,
}

impl OllamaConfig {
    /// Load Ollama configuration from environment variables
    pub fn from_env() -> ConfigResult<Self> {
        let config = Self {
            url: get_env_or_default("OLLAMA_URL", "http://localhost:11434"),
            model: get_env_or_default("OLLAMA_MODEL", "llama3.1:8b"),
            embedding_model: get_env_or_default("OLLAMA_EMBEDDING_MODEL", "nomic-embed-text"),
            timeout_secs: parse_env("OLLAMA_TIMEOUT_SECS", 60)?,
            max_tokens: parse_env("OLLAMA_MAX_TOKENS", 2048)?,
            temperature: parse_env("OLLAMA_TEMPERATURE", 0.4)?,
        };

        if !(0.0..=1.0).contains(&config.temperature) {
            return Err(ConfigError::InvalidValue(
                "OLLAMA_TEMPERATURE".to_string(),
                format!("{} is outside 0.0 - 1.0", config.temperature),
            ));
        }

        Ok(config)
    }

    /// Create a configuration with a custom URL (useful for testing)
    pub fn with_url(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    /// Get the full URL for the embeddings endpoint
    pub fn embeddings_url(&self) -> String {
        format!("{}/api/embeddings", self.url.trim_end_matches('/'))
    }

    /// Get the full URL for the chat endpoint
    pub fn chat_url(&self) -> String {
        format!("{}/api/chat", self.url.trim_end_matches('/'))
    }

    /// Get the full URL for the model listing endpoint (used as a health probe)
    pub fn tags_url(&self) -> String {
        format!("{}/api/tags", self.url.trim_end_matches('/'))
    }
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:11434".to_string(),
            model: "llama3.1:8b".to_string(),
            embedding_model: "nomic-embed-text".to_string(),
            timeout_secs: 60,
            max_tokens: 2048,
            temperature: 0.4,
        }
    }
}
