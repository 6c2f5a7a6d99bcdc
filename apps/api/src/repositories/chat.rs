//! Conversation and message persistence
//!
//! `ChatStore` is the narrow interface the chat service depends on.
//! `PgChatStore` is the PostgreSQL implementation.

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::instrument;
use uuid::Uuid;

use crate::models::chat::{Conversation, Message, NewMessage};

/// Conversation and message storage used by the chat service
#[async_trait]
pub trait ChatStore: Send + Sync {
    /// Create an empty conversation for a user
    async fn create_conversation(&self, user_id: &str) -> Result<Conversation, sqlx::Error>;

    /// Find a conversation owned by `user_id`
    async fn find_conversation(
        &self,
        id: Uuid,
        user_id: &str,
    ) -> Result<Option<Conversation>, sqlx::Error>;

    /// The user's most recently updated conversation
    async fn latest_conversation(&self, user_id: &str) -> Result<Option<Conversation>, sqlx::Error>;

    /// Append a message and bump the conversation's `updated_at`
    async fn add_message(&self, input: NewMessage) -> Result<Message, sqlx::Error>;

    /// All messages of a conversation in order
    async fn get_messages(&self, conversation_id: Uuid) -> Result<Vec<Message>, sqlx::Error>;

    /// The most recent `limit` messages, oldest first
    async fn get_recent_messages(
        &self,
        conversation_id: Uuid,
        limit: i64,
    ) -> Result<Vec<Message>, sqlx::Error>;

    /// Delete one conversation (messages cascade). Returns whether it existed.
    async fn delete_conversation(&self, id: Uuid, user_id: &str) -> Result<bool, sqlx::Error>;

    /// Delete every conversation of a user. Returns the number deleted.
    async fn delete_all_conversations(&self, user_id: &str) -> Result<u64, sqlx::Error>;
}

/// PostgreSQL chat store
#[derive(Clone)]
pub struct PgChatStore {
    pool: PgPool,
}

impl PgChatStore {
    /// Create a new PgChatStore instance
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ChatStore for PgChatStore {
    // ==================== Conversation Operations ====================

    #[instrument(skip(self))]
    async fn create_conversation(&self, user_id: &str) -> Result<Conversation, sqlx::Error> {
        sqlx::query_as::<_, Conversation>(
            r#"
            INSERT INTO conversations (user_id)
            VALUES ($1)
            RETURNING id, user_id, created_at, updated_at
            "#,
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
    }

    #[instrument(skip(self))]
    async fn find_conversation(
        &self,
        id: Uuid,
        user_id: &str,
    ) -> Result<Option<Conversation>, sqlx::Error> {
        sqlx::query_as::<_, Conversation>(
            r#"
            SELECT id, user_id, created_at, updated_at
            FROM conversations
            WHERE id = $1 AND user_id = $2
            "#,
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
    }

    #[instrument(skip(self))]
    async fn latest_conversation(&self, user_id: &str) -> Result<Option<Conversation>, sqlx::Error> {
        sqlx::query_as::<_, Conversation>(
            r#"
            SELECT id, user_id, created_at, updated_at
            FROM conversations
            WHERE user_id = $1
            ORDER BY updated_at DESC
            LIMIT 1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
    }

    /// Locks the conversation row so that `sequence_number` is assigned
    /// without gaps or duplicates.
    #[instrument(skip(self, input), fields(conversation_id = %input.conversation_id, role = %input.role))]
    async fn add_message(&self, input: NewMessage) -> Result<Message, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let locked: Option<(Uuid,)> =
            sqlx::query_as("SELECT id FROM conversations WHERE id = $1 FOR UPDATE")
                .bind(input.conversation_id)
                .fetch_optional(&mut *tx)
                .await?;

        if locked.is_none() {
            return Err(sqlx::Error::RowNotFound);
        }

        let message = sqlx::query_as::<_, Message>(
            r#"
            INSERT INTO messages (conversation_id, role, content, sequence_number)
            VALUES (
                $1, $2, $3,
                (SELECT COALESCE(MAX(sequence_number), 0) + 1 FROM messages WHERE conversation_id = $1)
            )
            RETURNING id, conversation_id, role, content, sequence_number, created_at
            "#,
        )
        .bind(input.conversation_id)
        .bind(input.role.as_str())
        .bind(input.content)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query("UPDATE conversations SET updated_at = NOW() WHERE id = $1")
            .bind(input.conversation_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(message)
    }

    // ==================== Message Queries ====================

    #[instrument(skip(self))]
    async fn get_messages(&self, conversation_id: Uuid) -> Result<Vec<Message>, sqlx::Error> {
        sqlx::query_as::<_, Message>(
            r#"
            SELECT id, conversation_id, role, content, sequence_number, created_at
            FROM messages
            WHERE conversation_id = $1
            ORDER BY sequence_number ASC
            "#,
        )
        .bind(conversation_id)
        .fetch_all(&self.pool)
        .await
    }

    #[instrument(skip(self))]
    async fn get_recent_messages(
        &self,
        conversation_id: Uuid,
        limit: i64,
    ) -> Result<Vec<Message>, sqlx::Error> {
        // Newest N in desc order, then reversed
        sqlx::query_as::<_, Message>(
            r#"
            SELECT * FROM (
                SELECT id, conversation_id, role, content, sequence_number, created_at
                FROM messages
                WHERE conversation_id = $1
                ORDER BY sequence_number DESC
                LIMIT $2
            ) AS recent
            ORDER BY sequence_number ASC
            "#,
        )
        .bind(conversation_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
    }

    // ==================== Deletion ====================

    #[instrument(skip(self))]
    async fn delete_conversation(&self, id: Uuid, user_id: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM conversations WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self))]
    async fn delete_all_conversations(&self, user_id: &str) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM conversations WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}
