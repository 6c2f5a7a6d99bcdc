//! In-memory implementations of the storage and semantic seams

use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use marquee_api::models::{
    CandidateMovie, Conversation, Feedback, FeedbackToggle, ItemType, Message, MovieDetails, NewMessage, Rating,
    WatchedMovie,
};
use marquee_api::repositories::{ChatStore, ClearedHistory, HistoryStore};
use marquee_api::services::{MovieFilters, SemanticError, SemanticRecommender};

// ==================== Chat Store ====================

#[derive(Default)]
pub struct InMemoryChatStore {
    conversations: Mutex<Vec<Conversation>>,
    messages: Mutex<Vec<Message>>,
}

impl InMemoryChatStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn conversation_count(&self) -> usize {
        self.conversations.lock().unwrap().len()
    }

    pub fn messages_of(&self, conversation_id: Uuid) -> Vec<Message> {
        self.messages
            .lock()
            .unwrap()
            .iter()
            .filter(|m| m.conversation_id == conversation_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl ChatStore for InMemoryChatStore {
    async fn create_conversation(&self, user_id: &str) -> Result<Conversation, sqlx::Error> {
        let now = Utc::now();
        let conversation = Conversation {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            created_at: now,
            updated_at: now,
        };
        self.conversations.lock().unwrap().push(conversation.clone());
        Ok(conversation)
    }

    async fn find_conversation(&self, id: Uuid, user_id: &str) -> Result<Option<Conversation>, sqlx::Error> {
        Ok(self
            .conversations
            .lock()
            .unwrap()
            .iter()
            .find(|c| c.id == id && c.user_id == user_id)
            .cloned())
    }

    async fn latest_conversation(&self, user_id: &str) -> Result<Option<Conversation>, sqlx::Error> {
        // Insertion order stands in for updated_at; add_message moves the
        // conversation to the back.
        Ok(self
            .conversations
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|c| c.user_id == user_id)
            .cloned())
    }

    async fn add_message(&self, input: NewMessage) -> Result<Message, sqlx::Error> {
        let mut messages = self.messages.lock().unwrap();
        let sequence_number = messages
            .iter()
            .filter(|m| m.conversation_id == input.conversation_id)
            .count() as i32
            + 1;
        let message = Message {
            id: Uuid::new_v4(),
            conversation_id: input.conversation_id,
            role: input.role,
            content: input.content,
            sequence_number,
            created_at: Utc::now(),
        };
        messages.push(message.clone());

        let mut conversations = self.conversations.lock().unwrap();
        if let Some(pos) = conversations.iter().position(|c| c.id == input.conversation_id) {
            let mut conversation = conversations.remove(pos);
            conversation.updated_at = Utc::now();
            conversations.push(conversation);
        }
        Ok(message)
    }

    async fn get_messages(&self, conversation_id: Uuid) -> Result<Vec<Message>, sqlx::Error> {
        Ok(self.messages_of(conversation_id))
    }

    async fn get_recent_messages(&self, conversation_id: Uuid, limit: i64) -> Result<Vec<Message>, sqlx::Error> {
        let all = self.messages_of(conversation_id);
        let skip = all.len().saturating_sub(limit as usize);
        Ok(all.into_iter().skip(skip).collect())
    }

    async fn delete_conversation(&self, id: Uuid, user_id: &str) -> Result<bool, sqlx::Error> {
        let mut conversations = self.conversations.lock().unwrap();
        let before = conversations.len();
        conversations.retain(|c| !(c.id == id && c.user_id == user_id));
        let deleted = conversations.len() < before;
        if deleted {
            self.messages.lock().unwrap().retain(|m| m.conversation_id != id);
        }
        Ok(deleted)
    }

    async fn delete_all_conversations(&self, user_id: &str) -> Result<u64, sqlx::Error> {
        let mut conversations = self.conversations.lock().unwrap();
        let (removed, kept): (Vec<_>, Vec<_>) = conversations.drain(..).partition(|c| c.user_id == user_id);
        *conversations = kept;
        self.messages
            .lock()
            .unwrap()
            .retain(|m| !removed.iter().any(|c| c.id == m.conversation_id));
        Ok(removed.len() as u64)
    }
}

/// Chat store whose every call fails
pub struct FailingChatStore;

#[async_trait]
impl ChatStore for FailingChatStore {
    async fn create_conversation(&self, _user_id: &str) -> Result<Conversation, sqlx::Error> {
        Err(sqlx::Error::PoolTimedOut)
    }

    async fn find_conversation(&self, _id: Uuid, _user_id: &str) -> Result<Option<Conversation>, sqlx::Error> {
        Err(sqlx::Error::PoolTimedOut)
    }

    async fn latest_conversation(&self, _user_id: &str) -> Result<Option<Conversation>, sqlx::Error> {
        Err(sqlx::Error::PoolTimedOut)
    }

    async fn add_message(&self, _input: NewMessage) -> Result<Message, sqlx::Error> {
        Err(sqlx::Error::PoolTimedOut)
    }

    async fn get_messages(&self, _conversation_id: Uuid) -> Result<Vec<Message>, sqlx::Error> {
        Err(sqlx::Error::PoolTimedOut)
    }

    async fn get_recent_messages(&self, _conversation_id: Uuid, _limit: i64) -> Result<Vec<Message>, sqlx::Error> {
        Err(sqlx::Error::PoolTimedOut)
    }

    async fn delete_conversation(&self, _id: Uuid, _user_id: &str) -> Result<bool, sqlx::Error> {
        Err(sqlx::Error::PoolTimedOut)
    }

    async fn delete_all_conversations(&self, _user_id: &str) -> Result<u64, sqlx::Error> {
        Err(sqlx::Error::PoolTimedOut)
    }
}

// ==================== History Store ====================

#[derive(Default)]
pub struct InMemoryHistoryStore {
    watched: Mutex<Vec<WatchedMovie>>,
    feedback: Mutex<Vec<Feedback>>,
}

impl InMemoryHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn watched_count(&self, user_id: &str) -> usize {
        self.watched
            .lock()
            .unwrap()
            .iter()
            .filter(|w| w.user_id == user_id)
            .count()
    }

    pub fn feedback_count(&self, user_id: &str) -> usize {
        self.feedback
            .lock()
            .unwrap()
            .iter()
            .filter(|f| f.user_id == user_id)
            .count()
    }

    /// Seed a watched movie directly (most recent last)
    pub fn push_watched(&self, user_id: &str, movie_id: i64, title: &str) {
        let now = Utc::now();
        self.watched.lock().unwrap().push(WatchedMovie {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            movie_id,
            title: title.to_string(),
            created_at: now,
            updated_at: now,
        });
    }
}

#[async_trait]
impl HistoryStore for InMemoryHistoryStore {
    async fn save_watched(&self, user_id: &str, movie_id: i64, title: &str) -> Result<WatchedMovie, sqlx::Error> {
        let mut watched = self.watched.lock().unwrap();
        let now = Utc::now();
        let entry = match watched.iter().position(|w| w.user_id == user_id && w.movie_id == movie_id) {
            Some(pos) => {
                let mut existing = watched.remove(pos);
                existing.title = title.to_string();
                existing.updated_at = now;
                existing
            }
            None => WatchedMovie {
                id: Uuid::new_v4(),
                user_id: user_id.to_string(),
                movie_id,
                title: title.to_string(),
                created_at: now,
                updated_at: now,
            },
        };
        watched.push(entry.clone());
        Ok(entry)
    }

    async fn get_history(&self, user_id: &str, limit: i64) -> Result<Vec<WatchedMovie>, sqlx::Error> {
        Ok(self
            .watched
            .lock()
            .unwrap()
            .iter()
            .rev()
            .filter(|w| w.user_id == user_id)
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn toggle_feedback(
        &self,
        user_id: &str,
        item_type: ItemType,
        item_id: &str,
        rating: Rating,
    ) -> Result<Option<Rating>, sqlx::Error> {
        let mut feedback = self.feedback.lock().unwrap();
        let pos = feedback
            .iter()
            .position(|f| f.user_id == user_id && f.item_type == item_type && f.item_id == item_id);
        let toggle = FeedbackToggle::resolve(pos.map(|p| feedback[p].rating), rating);

        if let Some(p) = pos {
            feedback.remove(p);
        }
        if let FeedbackToggle::Upsert(rating) = toggle {
            feedback.push(Feedback {
                id: Uuid::new_v4(),
                user_id: user_id.to_string(),
                item_type,
                item_id: item_id.to_string(),
                rating: rating.value(),
                created_at: Utc::now(),
            });
        }
        Ok(toggle.resulting_rating())
    }

    async fn get_feedback(&self, user_id: &str) -> Result<Vec<Feedback>, sqlx::Error> {
        Ok(self
            .feedback
            .lock()
            .unwrap()
            .iter()
            .rev()
            .filter(|f| f.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn clear_user(&self, user_id: &str) -> Result<ClearedHistory, sqlx::Error> {
        let mut watched = self.watched.lock().unwrap();
        let watched_before = watched.len();
        watched.retain(|w| w.user_id != user_id);

        let mut feedback = self.feedback.lock().unwrap();
        let feedback_before = feedback.len();
        feedback.retain(|f| f.user_id != user_id);

        Ok(ClearedHistory {
            watched: (watched_before - watched.len()) as u64,
            feedback: (feedback_before - feedback.len()) as u64,
        })
    }
}

// ==================== Semantic Recommender ====================

/// Scripted answers for the semantic recommender
pub enum FakeSemantic {
    Results(Vec<CandidateMovie>),
    Empty,
    Failing,
}

/// Semantic recommender following a `FakeSemantic` script, recording every
/// movie handed to the index
pub struct ScriptedSemantic {
    script: FakeSemantic,
    indexed: Mutex<Vec<i64>>,
}

impl ScriptedSemantic {
    pub fn new(script: FakeSemantic) -> Self {
        Self {
            script,
            indexed: Mutex::new(Vec::new()),
        }
    }

    pub fn indexed_ids(&self) -> Vec<i64> {
        self.indexed.lock().unwrap().clone()
    }
}

#[async_trait]
impl SemanticRecommender for ScriptedSemantic {
    async fn recommend(
        &self,
        seed: &MovieDetails,
        filters: &MovieFilters,
        limit: usize,
    ) -> Result<Vec<CandidateMovie>, SemanticError> {
        match &self.script {
            FakeSemantic::Results(movies) => Ok(filters
                .apply(movies.clone())
                .into_iter()
                .filter(|m| m.id != seed.id)
                .take(limit)
                .collect()),
            FakeSemantic::Empty => Ok(Vec::new()),
            FakeSemantic::Failing => Err(SemanticError::InvalidEmbedding("index unavailable".to_string())),
        }
    }

    async fn index_movies(&self, movies: &[CandidateMovie]) -> Result<usize, SemanticError> {
        let mut indexed = self.indexed.lock().unwrap();
        let before = indexed.len();
        for movie in movies {
            if !indexed.contains(&movie.id) {
                indexed.push(movie.id);
            }
        }
        Ok(indexed.len() - before)
    }
}
