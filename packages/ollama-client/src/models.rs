//! Request and response types for the Ollama API

use serde::{Deserialize, Serialize};

/// Request for generating embeddings
#[derive(Debug, Clone, Serialize)]
pub struct EmbeddingRequest {
    /// Model to use for embeddings
    pub model: String,
    /// Text to generate embeddings for
    pub prompt: String,
}

/// Response from embedding generation
#[derive(Debug, Clone, Deserialize)]
pub struct EmbeddingResponse {
    /// Generated embedding vector
    pub embedding: Vec<f32>,
}

/// Options for generation
#[derive(Debug, Clone, Serialize, Default)]
pub struct GenerateOptions {
    /// Temperature (0.0 - 1.0)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    /// Maximum tokens to generate
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_predict: Option<u32>,
    /// Top-p sampling
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
}

/// Chat message role
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
    /// Result of a tool call, fed back to the model
    Tool,
}

/// A single chat message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Role of the message sender
    pub role: ChatRole,
    /// Content of the message
    #[serde(default)]
    pub content: String,
    /// Tool calls requested by the assistant
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    /// Name of the tool whose result this message carries
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
}

impl ChatMessage {
    fn new(role: ChatRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_name: None,
        }
    }

    /// Create a system message
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(ChatRole::System, content)
    }

    /// Create a user message
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(ChatRole::User, content)
    }

    /// Create an assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(ChatRole::Assistant, content)
    }

    /// Create an assistant message that carries tool calls
    pub fn assistant_with_tool_calls(content: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            tool_calls,
            ..Self::new(ChatRole::Assistant, content)
        }
    }

    /// Create a tool result message
    pub fn tool(tool_name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            tool_name: Some(tool_name.into()),
            ..Self::new(ChatRole::Tool, content)
        }
    }

    /// Whether the assistant asked for any tool calls
    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

/// Tool definition advertised to the model
#[derive(Debug, Clone, Serialize)]
pub struct ToolDefinition {
    #[serde(rename = "type")]
    pub tool_type: String,
    pub function: FunctionDefinition,
}

impl ToolDefinition {
    /// Create a function tool definition
    pub fn function(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: serde_json::Value,
    ) -> Self {
        Self {
            tool_type: "function".to_string(),
            function: FunctionDefinition {
                name: name.into(),
                description: description.into(),
                parameters,
            },
        }
    }
}

/// Function signature inside a tool definition
#[derive(Debug, Clone, Serialize)]
pub struct FunctionDefinition {
    pub name: String,
    pub description: String,
    /// JSON Schema of the parameter object
    pub parameters: serde_json::Value,
}

/// Tool call requested by the model
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolCall {
    pub function: FunctionCall,
}

/// Function name and arguments of a tool call
///
/// Ollama sends `arguments` as a JSON object rather than an encoded string.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FunctionCall {
    pub name: String,
    #[serde(default)]
    pub arguments: serde_json::Value,
}

impl ToolCall {
    /// Build a tool call (mostly useful in tests)
    pub fn new(name: impl Into<String>, arguments: serde_json::Value) -> Self {
        Self {
            function: FunctionCall {
                name: name.into(),
                arguments,
            },
        }
    }
}

/// Request for chat completion
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    /// Model to use
    pub model: String,
    /// Chat messages
    pub messages: Vec<ChatMessage>,
    /// Tools the model may call
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolDefinition>,
    /// Whether to stream the response
    pub stream: bool,
    /// Generation options
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<GenerateOptions>,
}

/// Response from chat completion
#[derive(Debug, Clone, Deserialize)]
pub struct ChatResponse {
    /// The assistant's response message
    pub message: ChatMessage,
    /// Whether generation is complete
    #[serde(default)]
    pub done: bool,
    /// Total duration in nanoseconds
    #[serde(default)]
    pub total_duration: Option<u64>,
    /// Tokens generated
    #[serde(default)]
    pub eval_count: Option<u32>,
}

/// Response from listing models
#[derive(Debug, Clone, Deserialize)]
pub struct ListModelsResponse {
    /// Available models
    pub models: Vec<ModelInfo>,
}

/// Information about a model
#[derive(Debug, Clone, Deserialize)]
pub struct ModelInfo {
    /// Model name
    pub name: String,
    /// Model size in bytes
    #[serde(default)]
    pub size: u64,
}
