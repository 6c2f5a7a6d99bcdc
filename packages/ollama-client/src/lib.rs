//! Ollama API client for Marquee
//!
//! This crate provides a client for the Ollama API covering chat
//! completions with native tool calling and embedding generation.
//!
//! # Requirements
//!
//! - Ollama must be running and accessible at the configured URL
//! - Required models must be pulled before use:
//!   ```bash
//!   ollama pull llama3.1:8b
//!   ollama pull nomic-embed-text
//!   ```
//!
//! # Thread Safety
//!
//! `OllamaClient` is `Clone + Send + Sync` and shares one HTTP connection
//! pool between clones.
//!
//! # Example
//!
//! ```no_run
//! use marquee_ollama_client::{ChatMessage, OllamaClient, ToolDefinition};
//! use marquee_shared_config::OllamaConfig;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = OllamaClient::new(&OllamaConfig::default())?;
//!
//! let embedding = client.generate_embedding("A dream heist thriller").await?;
//! println!("Embedding dimensions: {}", embedding.len());
//!
//! let tools = vec![ToolDefinition::function(
//!     "search_movies",
//!     "Search movies by title",
//!     serde_json::json!({"type": "object", "properties": {"query": {"type": "string"}}}),
//! )];
//! let reply = client
//!     .chat_with_tools(&[ChatMessage::user("Find Inception")], &tools)
//!     .await?;
//! for call in &reply.tool_calls {
//!     println!("model wants {}", call.function.name);
//! }
//! # Ok(())
//! # }
//! ```

mod client;
mod error;
mod models;

pub use client::OllamaClient;
pub use error::{OllamaError, OllamaResult};
pub use models::{
    ChatMessage, ChatRequest, ChatResponse, ChatRole, EmbeddingRequest, EmbeddingResponse,
    FunctionCall, FunctionDefinition, GenerateOptions, ListModelsResponse, ModelInfo, ToolCall,
    ToolDefinition,
};

/// Expected embedding dimension for nomic-embed-text
pub const EMBEDDING_DIMENSION: usize = 768;

/// Validate that an embedding has the expected dimension
pub fn validate_embedding_dimension(embedding: &[f32]) -> Result<(), OllamaError> {
    if embedding.len() != EMBEDDING_DIMENSION {
        return Err(OllamaError::DimensionMismatch {
            expected: EMBEDDING_DIMENSION,
            actual: embedding.len(),
        });
    }
    Ok(())
}
