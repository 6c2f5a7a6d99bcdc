//! Structured assistant response contract
//!
//! Final assistant content is a single JSON object with `message`,
//! `reasoning` and `movies` (and `tracks` when music was requested). The
//! same parser is used for live replies and for history replay.

use marquee_spotify_client::Track;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::CandidateMovie;

/// The assistant message returned to clients
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AssistantPayload {
    pub message: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub reasoning: String,
    #[serde(default)]
    pub movies: Vec<CandidateMovie>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tracks: Vec<Track>,
}

impl AssistantPayload {
    pub fn text(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Default::default()
        }
    }

    /// Serialized form stored as the assistant message content
    pub fn to_content(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| self.message.clone())
    }
}

/// Result of interpreting raw assistant content
#[derive(Debug, Clone, PartialEq)]
pub enum AssistantContent {
    Structured(AssistantPayload),
    PlainText(String),
}

impl AssistantContent {
    pub fn is_structured(&self) -> bool {
        matches!(self, AssistantContent::Structured(_))
    }

    /// Plain text renders as `{message: raw, movies: []}`
    pub fn into_payload(self) -> AssistantPayload {
        match self {
            AssistantContent::Structured(payload) => payload,
            AssistantContent::PlainText(raw) => AssistantPayload::text(raw),
        }
    }
}

pub fn parse_assistant_content(raw: &str) -> AssistantContent {
    let trimmed = strip_code_fence(raw.trim());

    let object = serde_json::from_str::<Value>(trimmed)
        .ok()
        .filter(Value::is_object)
        .or_else(|| {
            let start = trimmed.find('{')?;
            let end = trimmed.rfind('}')?;
            if end <= start {
                return None;
            }
            serde_json::from_str::<Value>(&trimmed[start..=end])
                .ok()
                .filter(Value::is_object)
        });

    match object.and_then(payload_from_value) {
        Some(payload) => AssistantContent::Structured(payload),
        None => AssistantContent::PlainText(raw.to_string()),
    }
}

fn strip_code_fence(text: &str) -> &str {
    let Some(body) = text.strip_prefix("```") else {
        return text;
    };
    let Some(body) = body.strip_suffix("```") else {
        return text;
    };
    // Drop the info string ("json") on the opening fence line
    let body = match body.find('\n') {
        Some(newline) if !body[..newline].trim_start().starts_with('{') => &body[newline + 1..],
        _ => body,
    };
    body.trim()
}

fn payload_from_value(value: Value) -> Option<AssistantPayload> {
    let Value::Object(mut map) = value else {
        return None;
    };

    let message = match map.remove("message") {
        Some(Value::String(message)) => message,
        _ => return None,
    };

    let reasoning = match map.remove("reasoning") {
        Some(Value::String(reasoning)) => reasoning,
        _ => String::new(),
    };

    Some(AssistantPayload {
        message,
        reasoning,
        movies: lenient_list(map.remove("movies")),
        tracks: lenient_list(map.remove("tracks")),
    })
}

/// Items that fail to deserialize are skipped
fn lenient_list<T: serde::de::DeserializeOwned>(value: Option<Value>) -> Vec<T> {
    match value {
        Some(Value::Array(items)) => items
            .into_iter()
            .filter_map(|item| serde_json::from_value(item).ok())
            .collect(),
        _ => Vec::new(),
    }
}
