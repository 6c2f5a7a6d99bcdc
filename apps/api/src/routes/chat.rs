//! Chat and feedback REST route handlers
//!
//! - `POST /chat` - Run one conversation turn
//! - `GET /chat/history` - Replay a conversation
//! - `POST /chat/clear` - Delete one conversation, or all of a user's data
//! - `POST /feedback` - Toggle a thumbs up/down rating
//! - `GET /feedback` - List a user's ratings

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, rejection::QueryRejection, Query, State},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use crate::error::ApiResult;
use crate::models::{Feedback, ItemType, Rating};
use crate::services::chat::{ChatService, ClearScope, Transcript};
use crate::services::response::AssistantPayload;
use crate::services::tools::DebugEvent;

/// Shared application state for chat handlers
#[derive(Clone)]
pub struct ChatState {
    pub chat_service: Arc<ChatService>,
}

impl ChatState {
    pub fn new(chat_service: ChatService) -> Self {
        Self {
            chat_service: Arc::new(chat_service),
        }
    }
}

pub fn chat_router(state: ChatState) -> Router {
    Router::new()
        .route("/chat", post(send_message))
        .route("/chat/history", get(get_history))
        .route("/chat/clear", post(clear))
        .route("/feedback", post(toggle_feedback).get(list_feedback))
        .with_state(state)
}

// ========== Request/Response Types ==========

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub user_id: String,
    #[serde(default)]
    pub conversation_id: Option<Uuid>,
    pub message: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatResponse {
    pub assistant_message: AssistantPayload,
    pub conversation_id: Uuid,
    pub debug_events: Vec<DebugEvent>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryQuery {
    pub user_id: String,
    #[serde(default)]
    pub conversation_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackRequest {
    pub user_id: String,
    pub item_type: ItemType,
    #[serde(deserialize_with = "deserialize_item_id")]
    pub item_id: String,
    pub rating: Rating,
}

#[derive(Debug, Serialize)]
pub struct FeedbackResponse {
    pub rating: Option<Rating>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackQuery {
    pub user_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackView {
    pub item_type: ItemType,
    pub item_id: String,
    pub rating: i16,
    pub created_at: DateTime<Utc>,
}

impl From<Feedback> for FeedbackView {
    fn from(feedback: Feedback) -> Self {
        Self {
            item_type: feedback.item_type,
            item_id: feedback.item_id,
            rating: feedback.rating,
            created_at: feedback.created_at,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClearRequest {
    pub user_id: String,
    #[serde(default)]
    pub conversation_id: Option<Uuid>,
    pub scope: ClearScope,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClearResponse {
    pub deleted_conversations: u64,
    pub deleted_watched: u64,
    pub deleted_feedback: u64,
}

/// Movie ids arrive as numbers, track ids as strings
fn deserialize_item_id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Number(i64),
        Text(String),
    }

    Ok(match RawId::deserialize(deserializer)? {
        RawId::Number(id) => id.to_string(),
        RawId::Text(id) => id,
    })
}

// ========== Handlers ==========

async fn send_message(
    State(state): State<ChatState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> ApiResult<Json<ChatResponse>> {
    let Json(request) = payload?;

    let turn = state
        .chat_service
        .send_message(&request.user_id, request.conversation_id, &request.message)
        .await
        .map_err(|e| e.into_turn_error())?;

    Ok(Json(ChatResponse {
        assistant_message: turn.assistant,
        conversation_id: turn.conversation_id,
        debug_events: turn.debug_events,
    }))
}

async fn get_history(
    State(state): State<ChatState>,
    query: Result<Query<HistoryQuery>, QueryRejection>,
) -> ApiResult<Json<Transcript>> {
    let Query(query) = query?;
    let transcript = state
        .chat_service
        .get_history(&query.user_id, query.conversation_id)
        .await?;
    Ok(Json(transcript))
}

async fn clear(
    State(state): State<ChatState>,
    payload: Result<Json<ClearRequest>, JsonRejection>,
) -> ApiResult<Json<ClearResponse>> {
    let Json(request) = payload?;
    let summary = state
        .chat_service
        .clear(&request.user_id, request.conversation_id, request.scope)
        .await?;
    Ok(Json(ClearResponse {
        deleted_conversations: summary.conversations,
        deleted_watched: summary.watched,
        deleted_feedback: summary.feedback,
    }))
}

async fn toggle_feedback(
    State(state): State<ChatState>,
    payload: Result<Json<FeedbackRequest>, JsonRejection>,
) -> ApiResult<Json<FeedbackResponse>> {
    let Json(request) = payload?;
    let rating = state
        .chat_service
        .toggle_feedback(&request.user_id, request.item_type, &request.item_id, request.rating)
        .await?;
    Ok(Json(FeedbackResponse { rating }))
}

async fn list_feedback(
    State(state): State<ChatState>,
    query: Result<Query<FeedbackQuery>, QueryRejection>,
) -> ApiResult<Json<Vec<FeedbackView>>> {
    let Query(query) = query?;
    let feedback = state.chat_service.get_feedback(&query.user_id).await?;
    Ok(Json(feedback.into_iter().map(Into::into).collect()))
}
