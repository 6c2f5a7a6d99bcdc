//! Mock Ollama server for testing chat and embeddings
//!
//! Provides a [`MockOllamaServer`] that simulates the Ollama endpoints used
//! by the chat loop and the semantic recommender.

use std::time::Duration;

use serde_json::{json, Value};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Mock Ollama server
///
/// Wraps a [`wiremock::MockServer`] with helpers for the common responses.
///
/// # Example
///
/// ```rust,ignore
/// use marquee_test_utils::MockOllamaServer;
///
/// #[tokio::test]
/// async fn test_tool_loop() {
///     let server = MockOllamaServer::start().await;
///     server
///         .mock_chat_tool_call_then_reply("search_movies", json!({"query": "Heat"}), "Found it")
///         .await;
///     // Configure your Ollama client with server.url()
/// }
/// ```
pub struct MockOllamaServer {
    server: MockServer,
}

fn chat_body(message: Value) -> Value {
    json!({
        "model": "test-model",
        "message": message,
        "done": true
    })
}

fn tool_call_message(tool: &str, arguments: Value) -> Value {
    json!({
        "role": "assistant",
        "content": "",
        "tool_calls": [{"function": {"name": tool, "arguments": arguments}}]
    })
}

impl MockOllamaServer {
    /// Start a new mock Ollama server
    pub async fn start() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    /// Get the server URL
    pub fn url(&self) -> String {
        self.server.uri()
    }

    /// Mount a mock for successful embedding generation
    ///
    /// Returns a 768-dimensional embedding (nomic-embed-text dimension)
    pub async fn mock_embeddings_success(&self) {
        let embedding: Vec<f32> = (0..768).map(|i| (i as f32 * 0.001) % 1.0).collect();
        self.mock_embeddings_with_value(embedding).await;
    }

    /// Mount a mock for embedding generation with a custom vector
    pub async fn mock_embeddings_with_value(&self, embedding: Vec<f32>) {
        Mock::given(method("POST"))
            .and(path("/api/embeddings"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "embedding": embedding
            })))
            .mount(&self.server)
            .await;
    }

    /// Mount a mock for embedding generation failure
    pub async fn mock_embeddings_failure(&self, status_code: u16, error_message: &str) {
        Mock::given(method("POST"))
            .and(path("/api/embeddings"))
            .respond_with(ResponseTemplate::new(status_code).set_body_json(json!({
                "error": error_message
            })))
            .mount(&self.server)
            .await;
    }

    /// Mount a chat reply with plain content and no tool calls
    pub async fn mock_chat_success(&self, response_text: &str) {
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .respond_with(ResponseTemplate::new(200).set_body_json(chat_body(json!({
                "role": "assistant",
                "content": response_text
            }))))
            .mount(&self.server)
            .await;
    }

    /// Mount a chat reply that always asks for the same tool call
    ///
    /// Drives the loop into its iteration bound.
    pub async fn mock_chat_tool_call_always(&self, tool: &str, arguments: Value) {
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(chat_body(tool_call_message(tool, arguments))),
            )
            .mount(&self.server)
            .await;
    }

    /// Mount a chat reply that requests several tool calls at once, answered once
    pub async fn mock_chat_tool_calls_once(&self, calls: &[(&str, Value)]) {
        let tool_calls: Vec<Value> = calls
            .iter()
            .map(|(name, arguments)| json!({"function": {"name": name, "arguments": arguments}}))
            .collect();

        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .respond_with(ResponseTemplate::new(200).set_body_json(chat_body(json!({
                "role": "assistant",
                "content": "",
                "tool_calls": tool_calls
            }))))
            .up_to_n_times(1)
            .with_priority(1)
            .mount(&self.server)
            .await;
    }

    /// Mount a tool call on the first chat request and plain content afterwards
    pub async fn mock_chat_tool_call_then_reply(
        &self,
        tool: &str,
        arguments: Value,
        final_text: &str,
    ) {
        self.mock_chat_tool_calls_once(&[(tool, arguments)]).await;

        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .respond_with(ResponseTemplate::new(200).set_body_json(chat_body(json!({
                "role": "assistant",
                "content": final_text
            }))))
            .with_priority(2)
            .mount(&self.server)
            .await;
    }

    /// Mount a chat failure
    pub async fn mock_chat_failure(&self, status_code: u16, error_message: &str) {
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .respond_with(ResponseTemplate::new(status_code).set_body_json(json!({
                "error": error_message
            })))
            .mount(&self.server)
            .await;
    }

    /// Mount a mock for the /api/tags endpoint (list models)
    pub async fn mock_list_models(&self, models: &[&str]) {
        let model_list: Vec<Value> = models
            .iter()
            .map(|name| {
                json!({
                    "name": name,
                    "modified_at": "2024-01-01T00:00:00Z",
                    "size": 4_000_000_000_i64
                })
            })
            .collect();

        Mock::given(method("GET"))
            .and(path("/api/tags"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "models": model_list
            })))
            .mount(&self.server)
            .await;
    }

    /// Mount a delayed chat response (for timeout tests)
    pub async fn mock_chat_timeout(&self, delay_ms: u64) {
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_delay(Duration::from_millis(delay_ms))
                    .set_body_json(chat_body(json!({"role": "assistant", "content": "late"}))),
            )
            .mount(&self.server)
            .await;
    }

    /// Bodies of every chat request received so far, in arrival order
    pub async fn chat_requests(&self) -> Vec<Value> {
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .into_iter()
            .filter(|r| r.url.path() == "/api/chat")
            .filter_map(|r| serde_json::from_slice(&r.body).ok())
            .collect()
    }

    /// Number of chat requests received so far
    pub async fn chat_request_count(&self) -> usize {
        self.chat_requests().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_tool_call_then_reply_sequence() {
        let server = MockOllamaServer::start().await;
        server
            .mock_chat_tool_call_then_reply("search_movies", json!({"query": "Heat"}), "done")
            .await;

        let client = reqwest::Client::new();
        let url = format!("{}/api/chat", server.url());

        let first: Value = client
            .post(&url)
            .json(&json!({"messages": []}))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(first["message"]["tool_calls"][0]["function"]["name"], "search_movies");

        let second: Value = client
            .post(&url)
            .json(&json!({"messages": []}))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(second["message"]["content"], "done");

        assert_eq!(server.chat_request_count().await, 2);
    }
}
