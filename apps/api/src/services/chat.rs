//! Conversation turn driver
//!
//! A turn either takes the deterministic fast path (recommendation intent,
//! answered by the merger without the LLM) or runs the bounded
//! tool-calling loop against Ollama. Either way the assistant reply is
//! persisted before it is returned.

use std::sync::Arc;

use chrono::{DateTime, Datelike, Utc};
use futures_util::future::join_all;
use marquee_ollama_client::{ChatMessage, OllamaClient};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::error::ApiError;
use crate::models::{Conversation, Feedback, ItemType, Message, MessageRole, NewMessage, Rating};
use crate::repositories::{ChatStore, HistoryStore};
use crate::services::constraints::{is_recommendation_intent, TurnConstraints};
use crate::services::merger::RecommendationMerger;
use crate::services::response::{parse_assistant_content, AssistantContent, AssistantPayload};
use crate::services::tools::{DebugEvent, DebugEventKind, ToolRegistry};

/// Chat service errors
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("conversation not found: {0}")]
    ConversationNotFound(Uuid),

    #[error("invalid input: {0}")]
    InvalidInput(String),
}

// ==================== ApiError Integration ====================

impl From<ChatError> for ApiError {
    fn from(err: ChatError) -> Self {
        match err {
            ChatError::Database(e) => ApiError::Database(e),
            ChatError::ConversationNotFound(id) => ApiError::not_found("conversation", id.to_string()),
            ChatError::InvalidInput(msg) => ApiError::ValidationError(msg),
        }
    }
}

impl ChatError {
    /// Failures of a chat turn answer with the generic apology
    pub fn into_turn_error(self) -> ApiError {
        match self {
            ChatError::Database(e) => ApiError::ChatFailed(e.to_string()),
            other => other.into(),
        }
    }
}

/// Result type for chat operations
pub type ChatResult<T> = Result<T, ChatError>;

// ==================== Constants ====================

/// Maximum user message length in characters
pub const MAX_MESSAGE_LENGTH: usize = 10_000;

/// Messages of history sent with each turn
pub const MAX_CONTEXT_MESSAGES: i64 = 20;

/// Maximum tool calling iterations to prevent infinite loops
pub const MAX_TOOL_ITERATIONS: usize = 5;

/// Reply when the loop cannot produce an answer
pub const APOLOGY_MESSAGE: &str =
    "I apologize, but I'm having trouble completing this request. Could you try rephrasing it?";

// ==================== Turn Types ====================

/// Result of one conversation turn
#[derive(Debug, Clone)]
pub struct ChatTurn {
    pub conversation_id: Uuid,
    pub assistant: AssistantPayload,
    pub debug_events: Vec<DebugEvent>,
}

/// Message content as replayed to clients
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum TranscriptContent {
    Text(String),
    Assistant(AssistantPayload),
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptMessage {
    pub id: Uuid,
    pub role: MessageRole,
    pub created_at: DateTime<Utc>,
    pub content: TranscriptContent,
}

impl From<Message> for TranscriptMessage {
    fn from(message: Message) -> Self {
        let content = match message.role {
            MessageRole::Assistant => {
                TranscriptContent::Assistant(parse_assistant_content(&message.content).into_payload())
            }
            MessageRole::User | MessageRole::System => TranscriptContent::Text(message.content),
        };

        Self {
            id: message.id,
            role: message.role,
            created_at: message.created_at,
            content,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Transcript {
    pub conversation_id: Option<Uuid>,
    pub messages: Vec<TranscriptMessage>,
}

/// What `clear` removes
///
/// `All` also wipes the user's watched list and feedback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClearScope {
    Conversation,
    All,
}

/// Row counts removed by one `clear`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClearSummary {
    pub conversations: u64,
    pub watched: u64,
    pub feedback: u64,
}

// ==================== Chat Service ====================

pub struct ChatService {
    store: Arc<dyn ChatStore>,
    history: Arc<dyn HistoryStore>,
    ollama: OllamaClient,
    tools: ToolRegistry,
    merger: RecommendationMerger,
}

impl ChatService {
    pub fn new(
        store: Arc<dyn ChatStore>,
        history: Arc<dyn HistoryStore>,
        ollama: OllamaClient,
        tools: ToolRegistry,
        merger: RecommendationMerger,
    ) -> Self {
        Self {
            store,
            history,
            ollama,
            tools,
            merger,
        }
    }

    /// Run one conversation turn
    ///
    /// This method:
    /// 1. Validates the input before any side effect
    /// 2. Loads or creates the conversation and saves the user message
    /// 3. Answers from the merger when the message asks for recommendations
    /// 4. Otherwise runs the tool-calling loop
    /// 5. Saves and returns the assistant reply
    #[instrument(skip(self, message), fields(message_len = message.len()))]
    pub async fn send_message(
        &self,
        user_id: &str,
        conversation_id: Option<Uuid>,
        message: &str,
    ) -> ChatResult<ChatTurn> {
        let user_id = validate_user_id(user_id)?;

        let char_count = message.chars().count();
        if char_count > MAX_MESSAGE_LENGTH {
            return Err(ChatError::InvalidInput(format!(
                "Message too long: {} characters (max {})",
                char_count, MAX_MESSAGE_LENGTH
            )));
        }

        let message = message.trim();
        if message.is_empty() {
            return Err(ChatError::InvalidInput("Message cannot be empty".to_string()));
        }

        let conversation = match conversation_id {
            Some(id) => self
                .store
                .find_conversation(id, user_id)
                .await?
                .ok_or(ChatError::ConversationNotFound(id))?,
            None => self.store.create_conversation(user_id).await?,
        };

        let user_message = self.store.add_message(NewMessage::user(conversation.id, message)).await?;
        info!(
            conversation_id = %conversation.id,
            message_id = %user_message.id,
            "User message saved"
        );

        let history = self
            .store
            .get_recent_messages(conversation.id, MAX_CONTEXT_MESSAGES)
            .await?;

        let mut events = Vec::new();
        let content = match self.fast_path(user_id, message, &history, &mut events).await {
            Some(payload) => AssistantContent::Structured(payload),
            None => self.tool_loop(user_id, &history, &mut events).await,
        };

        let stored = match &content {
            AssistantContent::Structured(payload) => payload.to_content(),
            AssistantContent::PlainText(text) => text.clone(),
        };
        let assistant_message = self
            .store
            .add_message(NewMessage::assistant(conversation.id, stored))
            .await?;

        info!(
            conversation_id = %conversation.id,
            message_id = %assistant_message.id,
            debug_events = events.len(),
            "Assistant response saved"
        );

        Ok(ChatTurn {
            conversation_id: conversation.id,
            assistant: content.into_payload(),
            debug_events: events,
        })
    }

    /// Recommendation intent answered without the LLM
    async fn fast_path(
        &self,
        user_id: &str,
        message: &str,
        history: &[Message],
        events: &mut Vec<DebugEvent>,
    ) -> Option<AssistantPayload> {
        if !is_recommendation_intent(message) {
            return None;
        }

        let prior = prior_user_turns(history);
        let constraints = TurnConstraints::from_turns(message, &prior);
        debug!(?constraints, "Recommendation intent detected");

        let merged = self.merger.recommend(user_id, &constraints).await?;
        events.push(DebugEvent::new(
            DebugEventKind::FastPath,
            true,
            format!("{} source, {} movies", merged.source.as_str(), merged.payload.movies.len()),
        ));
        Some(merged.payload)
    }

    /// Bounded LLM loop with tools attached
    async fn tool_loop(&self, user_id: &str, history: &[Message], events: &mut Vec<DebugEvent>) -> AssistantContent {
        let definitions = self.tools.definitions();

        let mut messages = Vec::with_capacity(history.len() + 1);
        messages.push(ChatMessage::system(system_prompt(Utc::now().year(), definitions.len())));
        messages.extend(history.iter().map(to_llm_message));

        for iteration in 0..MAX_TOOL_ITERATIONS {
            let reply = match self.ollama.chat_with_tools(&messages, &definitions).await {
                Ok(reply) => reply,
                Err(e) => {
                    warn!(error = %e, iteration, "LLM request failed");
                    events.push(DebugEvent::new(DebugEventKind::LlmError, false, e.to_string()));
                    return AssistantContent::PlainText(APOLOGY_MESSAGE.to_string());
                }
            };

            if !reply.has_tool_calls() {
                return self.final_answer(reply.content, events);
            }

            debug!(iteration, tool_calls = reply.tool_calls.len(), "Executing tool calls");
            let calls = reply.tool_calls.clone();
            messages.push(reply);

            let outcomes = join_all(
                calls
                    .iter()
                    .map(|call| self.tools.execute(&call.function.name, &call.function.arguments, user_id)),
            )
            .await;

            for (call, outcome) in calls.iter().zip(outcomes) {
                let name = &call.function.name;
                events.push(DebugEvent::tool_call(
                    name,
                    &call.function.arguments,
                    outcome.is_ok(),
                    outcome.error_message(),
                ));
                if let Some(reason) = &outcome.fallback {
                    events.push(DebugEvent::fallback(name, reason.clone()));
                }
                messages.push(ChatMessage::tool(name.clone(), outcome.to_json().to_string()));
            }
        }

        warn!(iterations = MAX_TOOL_ITERATIONS, "Tool loop exhausted without a final answer");
        events.push(DebugEvent::new(
            DebugEventKind::Exhausted,
            false,
            format!("no final answer after {} iterations", MAX_TOOL_ITERATIONS),
        ));
        AssistantContent::PlainText(APOLOGY_MESSAGE.to_string())
    }

    fn final_answer(&self, content: String, events: &mut Vec<DebugEvent>) -> AssistantContent {
        if content.trim().is_empty() {
            events.push(DebugEvent::new(DebugEventKind::ParseFallback, false, "empty reply"));
            return AssistantContent::PlainText(APOLOGY_MESSAGE.to_string());
        }

        let parsed = parse_assistant_content(&content);
        if !parsed.is_structured() {
            debug!("Final reply is not structured JSON");
            events.push(DebugEvent::new(
                DebugEventKind::ParseFallback,
                false,
                "reply was not a JSON object with a string message",
            ));
        }
        parsed
    }

    /// Transcript of a conversation, or of the most recent one
    #[instrument(skip(self))]
    pub async fn get_history(&self, user_id: &str, conversation_id: Option<Uuid>) -> ChatResult<Transcript> {
        let user_id = validate_user_id(user_id)?;

        let conversation: Option<Conversation> = match conversation_id {
            Some(id) => Some(
                self.store
                    .find_conversation(id, user_id)
                    .await?
                    .ok_or(ChatError::ConversationNotFound(id))?,
            ),
            None => self.store.latest_conversation(user_id).await?,
        };

        let Some(conversation) = conversation else {
            return Ok(Transcript {
                conversation_id: None,
                messages: Vec::new(),
            });
        };

        let messages = self.store.get_messages(conversation.id).await?;
        Ok(Transcript {
            conversation_id: Some(conversation.id),
            messages: messages.into_iter().map(Into::into).collect(),
        })
    }

    #[instrument(skip(self))]
    pub async fn toggle_feedback(
        &self,
        user_id: &str,
        item_type: ItemType,
        item_id: &str,
        rating: Rating,
    ) -> ChatResult<Option<Rating>> {
        let user_id = validate_user_id(user_id)?;
        let item_id = item_id.trim();
        if item_id.is_empty() {
            return Err(ChatError::InvalidInput("itemId cannot be empty".to_string()));
        }

        Ok(self.history.toggle_feedback(user_id, item_type, item_id, rating).await?)
    }

    #[instrument(skip(self))]
    pub async fn get_feedback(&self, user_id: &str) -> ChatResult<Vec<Feedback>> {
        let user_id = validate_user_id(user_id)?;
        Ok(self.history.get_feedback(user_id).await?)
    }

    /// Delete one conversation, or everything stored for a user
    #[instrument(skip(self))]
    pub async fn clear(
        &self,
        user_id: &str,
        conversation_id: Option<Uuid>,
        scope: ClearScope,
    ) -> ChatResult<ClearSummary> {
        let user_id = validate_user_id(user_id)?;

        let summary = match scope {
            ClearScope::All => {
                let conversations = self.store.delete_all_conversations(user_id).await?;
                let history = self.history.clear_user(user_id).await?;
                ClearSummary {
                    conversations,
                    watched: history.watched,
                    feedback: history.feedback,
                }
            }
            ClearScope::Conversation => {
                let id = conversation_id.ok_or_else(|| {
                    ChatError::InvalidInput("conversationId is required for scope 'conversation'".to_string())
                })?;
                ClearSummary {
                    conversations: u64::from(self.store.delete_conversation(id, user_id).await?),
                    ..ClearSummary::default()
                }
            }
        };

        info!(
            conversations = summary.conversations,
            watched = summary.watched,
            feedback = summary.feedback,
            "User data cleared"
        );
        Ok(summary)
    }
}

fn validate_user_id(user_id: &str) -> ChatResult<&str> {
    let user_id = user_id.trim();
    if user_id.is_empty() {
        return Err(ChatError::InvalidInput("userId cannot be empty".to_string()));
    }
    Ok(user_id)
}

/// User messages before the current (last) one, oldest first
fn prior_user_turns(history: &[Message]) -> Vec<&str> {
    let users: Vec<&str> = history
        .iter()
        .filter(|m| m.role == MessageRole::User)
        .map(|m| m.content.as_str())
        .collect();
    users[..users.len().saturating_sub(1)].to_vec()
}

fn to_llm_message(message: &Message) -> ChatMessage {
    match message.role {
        MessageRole::User => ChatMessage::user(message.content.clone()),
        MessageRole::Assistant => ChatMessage::assistant(message.content.clone()),
        MessageRole::System => ChatMessage::system(message.content.clone()),
    }
}

fn system_prompt(current_year: i32, tool_count: usize) -> String {
    format!(
        r#"You are Marquee, a friendly movie discovery assistant. The current year is {current_year}.

You have {tool_count} tools. Use them to look movies up instead of guessing:
- Find a movie's id with search_movies before asking for details or recommendations.
- For "movies like X" prefer get_semantic_movie_recommendations.
- Respect what the user wants to avoid by passing exclude_genres, min_year and max_year.
- When the user says they watched or rated something, record it with save_watched_movie or rate_movie.

Your final answer MUST be a single JSON object and nothing else:
{{"message": "short reply to the user", "reasoning": "one sentence on why these fit", "movies": [{{"id": 123, "title": "Title", "release_year": 2010, "poster_url": null, "genres": ["Drama"]}}]}}

Only include movies returned by your tools. Use an empty "movies" array when you are not recommending anything."#
    )
}
