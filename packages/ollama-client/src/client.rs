//! Core Ollama HTTP client with retry logic and connection pooling

use std::future::Future;
use std::time::Duration;

use marquee_shared_config::OllamaConfig;
use reqwest::Client;
use tracing::{debug, instrument, warn};

use crate::error::{OllamaError, OllamaResult};
use crate::models::{
    ChatMessage, ChatRequest, ChatResponse, EmbeddingRequest, EmbeddingResponse, GenerateOptions,
    ListModelsResponse, ToolDefinition,
};

/// Maximum error body size to prevent memory exhaustion
const MAX_ERROR_BODY_SIZE: usize = 1000;

/// Default retry configuration
const DEFAULT_RETRY_ATTEMPTS: u32 = 3;
const DEFAULT_RETRY_BASE_DELAY_MS: u64 = 500;

/// Ollama API client with retry logic and connection pooling
#[derive(Debug, Clone)]
pub struct OllamaClient {
    /// HTTP client with connection pool
    http_client: Client,
    /// Configuration
    config: OllamaConfig,
    /// Number of retry attempts for transient failures
    retry_attempts: u32,
    /// Base delay for exponential backoff (milliseconds)
    retry_base_delay_ms: u64,
}

impl OllamaClient {
    /// Create a new Ollama client from configuration
    pub fn new(config: &OllamaConfig) -> OllamaResult<Self> {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_keepalive(Duration::from_secs(60))
            .build()
            .map_err(OllamaError::HttpError)?;

        Ok(Self {
            http_client,
            config: config.clone(),
            retry_attempts: DEFAULT_RETRY_ATTEMPTS,
            retry_base_delay_ms: DEFAULT_RETRY_BASE_DELAY_MS,
        })
    }

    /// Set retry configuration
    pub fn with_retry_config(mut self, attempts: u32, base_delay_ms: u64) -> Self {
        self.retry_attempts = attempts;
        self.retry_base_delay_ms = base_delay_ms;
        self
    }

    /// Get the configuration
    pub fn config(&self) -> &OllamaConfig {
        &self.config
    }

    /// Execute an async operation with retry logic
    async fn with_retry<T, F, Fut>(&self, operation: F) -> OllamaResult<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = OllamaResult<T>>,
    {
        // 0 attempts still runs the operation once
        if self.retry_attempts == 0 {
            return operation().await;
        }

        let mut last_error = None;

        for attempt in 0..self.retry_attempts {
            match operation().await {
                Ok(result) => return Ok(result),
                Err(e) if !e.is_retryable() => return Err(e),
                Err(e) => {
                    if attempt < self.retry_attempts - 1 {
                        let delay = self.retry_base_delay_ms * 2_u64.pow(attempt);
                        warn!(
                            attempt = attempt + 1,
                            max_attempts = self.retry_attempts,
                            delay_ms = delay,
                            error = %e,
                            "Retrying Ollama request after transient error"
                        );
                        tokio::time::sleep(Duration::from_millis(delay)).await;
                    }
                    last_error = Some(e);
                }
            }
        }

        let timed_out = last_error.as_ref().is_some_and(OllamaError::is_timeout);
        Err(OllamaError::RetriesExhausted {
            attempts: self.retry_attempts,
            last_error: last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "Unknown error".to_string()),
            timed_out,
        })
    }

    /// Truncate error body to prevent memory exhaustion
    ///
    /// Cuts on a UTF-8 character boundary.
    fn truncate_error_body(body: String) -> String {
        if body.len() <= MAX_ERROR_BODY_SIZE {
            return body;
        }

        let truncate_at = body
            .char_indices()
            .map(|(i, _)| i)
            .take_while(|i| *i <= MAX_ERROR_BODY_SIZE)
            .last()
            .unwrap_or(0);

        format!("{}... (truncated)", &body[..truncate_at])
    }

    /// Map a transport error onto the client's error taxonomy
    fn map_send_error(&self, e: reqwest::Error) -> OllamaError {
        if e.is_connect() {
            OllamaError::ConnectionRefused(self.config.url.clone())
        } else if e.is_timeout() {
            OllamaError::Timeout(self.config.timeout_secs)
        } else {
            OllamaError::HttpError(e)
        }
    }

    /// Turn a non-success response into an error
    async fn error_from_response(response: reqwest::Response, model: &str) -> OllamaError {
        let status = response.status();
        let body = Self::truncate_error_body(response.text().await.unwrap_or_default());

        if body.contains("model") && body.contains("not found") {
            return OllamaError::ModelNotFound(model.to_string());
        }

        OllamaError::ApiError(format!("Status {}: {}", status, body))
    }

    /// List available models (also the reachability probe)
    pub async fn list_models(&self) -> OllamaResult<Vec<String>> {
        let response = self
            .http_client
            .get(self.config.tags_url())
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        if !response.status().is_success() {
            return Err(Self::error_from_response(response, &self.config.model).await);
        }

        let list: ListModelsResponse = response.json().await?;
        Ok(list.models.into_iter().map(|m| m.name).collect())
    }

    /// Internal embedding generation (single request, no retry)
    async fn generate_embedding_internal(&self, text: &str) -> OllamaResult<Vec<f32>> {
        let request = EmbeddingRequest {
            model: self.config.embedding_model.clone(),
            prompt: text.to_string(),
        };

        let response = self
            .http_client
            .post(self.config.embeddings_url())
            .json(&request)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        if !response.status().is_success() {
            return Err(Self::error_from_response(response, &self.config.embedding_model).await);
        }

        let embedding_response: EmbeddingResponse = response.json().await?;
        Ok(embedding_response.embedding)
    }

    /// Generate embeddings for text with retry logic
    #[instrument(skip(self, text), fields(text_len = text.len()))]
    pub async fn generate_embedding(&self, text: &str) -> OllamaResult<Vec<f32>> {
        debug!(model = %self.config.embedding_model, "Generating embedding");

        let result = self
            .with_retry(|| async move { self.generate_embedding_internal(text).await })
            .await?;

        debug!(dimensions = result.len(), "Embedding generated");

        Ok(result)
    }

    fn default_options(&self) -> GenerateOptions {
        GenerateOptions {
            temperature: Some(self.config.temperature),
            num_predict: Some(self.config.max_tokens),
            ..Default::default()
        }
    }

    /// Internal chat (single request, no retry)
    async fn chat_internal(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolDefinition],
    ) -> OllamaResult<ChatMessage> {
        let request = ChatRequest {
            model: self.config.model.clone(),
            messages: messages.to_vec(),
            tools: tools.to_vec(),
            stream: false,
            options: Some(self.default_options()),
        };

        let response = self
            .http_client
            .post(self.config.chat_url())
            .json(&request)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        if !response.status().is_success() {
            return Err(Self::error_from_response(response, &self.config.model).await);
        }

        let chat_response: ChatResponse = response.json().await?;
        Ok(chat_response.message)
    }

    /// Chat completion with tools attached
    ///
    /// Returns the assistant message. When the model wants to call tools the
    /// message carries `tool_calls` and its content is usually empty.
    #[instrument(skip(self, messages, tools), fields(message_count = messages.len(), tool_count = tools.len()))]
    pub async fn chat_with_tools(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolDefinition],
    ) -> OllamaResult<ChatMessage> {
        debug!(model = %self.config.model, "Sending chat request");

        let message = self
            .with_retry(|| async move { self.chat_internal(messages, tools).await })
            .await?;

        debug!(
            tool_calls = message.tool_calls.len(),
            content_len = message.content.len(),
            "Chat response received"
        );

        Ok(message)
    }
}
