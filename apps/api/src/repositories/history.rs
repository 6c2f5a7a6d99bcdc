//! Watch history and feedback persistence

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::instrument;

use crate::models::history::{Feedback, FeedbackToggle, ItemType, Rating, WatchedMovie};

/// Rows removed by `HistoryStore::clear_user`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClearedHistory {
    pub watched: u64,
    pub feedback: u64,
}

/// Per-user watched list and thumbs up/down feedback
///
/// Every write is idempotent or a toggle, so a tool may repeat a save within
/// one turn without creating duplicates.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Insert or refresh a watched movie
    ///
    /// # Arguments
    /// * `user_id` - Owner
    /// * `movie_id` - TMDB movie id
    /// * `title` - Display title; replaces the stored one on repeat saves
    ///
    /// # Returns
    /// * `Ok(WatchedMovie)` - The single row for (user, movie)
    async fn save_watched(
        &self,
        user_id: &str,
        movie_id: i64,
        title: &str,
    ) -> Result<WatchedMovie, sqlx::Error>;

    /// Watched movies, most recently saved first
    async fn get_history(&self, user_id: &str, limit: i64) -> Result<Vec<WatchedMovie>, sqlx::Error>;

    /// Toggle a rating and return the rating left in place (`None` = cleared)
    async fn toggle_feedback(
        &self,
        user_id: &str,
        item_type: ItemType,
        item_id: &str,
        rating: Rating,
    ) -> Result<Option<Rating>, sqlx::Error>;

    /// All feedback of a user, newest first
    async fn get_feedback(&self, user_id: &str) -> Result<Vec<Feedback>, sqlx::Error>;

    /// Delete every watched movie and rating of a user
    async fn clear_user(&self, user_id: &str) -> Result<ClearedHistory, sqlx::Error>;
}

/// PostgreSQL history store
#[derive(Clone)]
pub struct PgHistoryStore {
    pool: PgPool,
}

impl PgHistoryStore {
    /// Create a new PgHistoryStore instance
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl HistoryStore for PgHistoryStore {
    #[instrument(skip(self))]
    async fn save_watched(
        &self,
        user_id: &str,
        movie_id: i64,
        title: &str,
    ) -> Result<WatchedMovie, sqlx::Error> {
        sqlx::query_as::<_, WatchedMovie>(
            r#"
            INSERT INTO watched_movies (user_id, movie_id, title)
            VALUES ($1, $2, $3)
            ON CONFLICT (user_id, movie_id)
            DO UPDATE SET title = EXCLUDED.title, updated_at = NOW()
            RETURNING id, user_id, movie_id, title, created_at, updated_at
            "#,
        )
        .bind(user_id)
        .bind(movie_id)
        .bind(title)
        .fetch_one(&self.pool)
        .await
    }

    #[instrument(skip(self))]
    async fn get_history(&self, user_id: &str, limit: i64) -> Result<Vec<WatchedMovie>, sqlx::Error> {
        sqlx::query_as::<_, WatchedMovie>(
            r#"
            SELECT id, user_id, movie_id, title, created_at, updated_at
            FROM watched_movies
            WHERE user_id = $1
            ORDER BY updated_at DESC
            LIMIT $2
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
    }

    #[instrument(skip(self))]
    async fn toggle_feedback(
        &self,
        user_id: &str,
        item_type: ItemType,
        item_id: &str,
        rating: Rating,
    ) -> Result<Option<Rating>, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let existing: Option<(i16,)> = sqlx::query_as(
            r#"
            SELECT rating FROM feedback
            WHERE user_id = $1 AND item_type = $2 AND item_id = $3
            FOR UPDATE
            "#,
        )
        .bind(user_id)
        .bind(item_type.as_str())
        .bind(item_id)
        .fetch_optional(&mut *tx)
        .await?;

        let toggle = FeedbackToggle::resolve(existing.map(|(r,)| r), rating);
        match toggle {
            FeedbackToggle::Delete => {
                sqlx::query(
                    "DELETE FROM feedback WHERE user_id = $1 AND item_type = $2 AND item_id = $3",
                )
                .bind(user_id)
                .bind(item_type.as_str())
                .bind(item_id)
                .execute(&mut *tx)
                .await?;
            }
            FeedbackToggle::Upsert(rating) => {
                sqlx::query(
                    r#"
                    INSERT INTO feedback (user_id, item_type, item_id, rating)
                    VALUES ($1, $2, $3, $4)
                    ON CONFLICT (user_id, item_type, item_id)
                    DO UPDATE SET rating = EXCLUDED.rating
                    "#,
                )
                .bind(user_id)
                .bind(item_type.as_str())
                .bind(item_id)
                .bind(rating.value())
                .execute(&mut *tx)
                .await?;
            }
        }

        tx.commit().await?;
        Ok(toggle.resulting_rating())
    }

    #[instrument(skip(self))]
    async fn get_feedback(&self, user_id: &str) -> Result<Vec<Feedback>, sqlx::Error> {
        sqlx::query_as::<_, Feedback>(
            r#"
            SELECT id, user_id, item_type, item_id, rating, created_at
            FROM feedback
            WHERE user_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
    }

    #[instrument(skip(self))]
    async fn clear_user(&self, user_id: &str) -> Result<ClearedHistory, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let watched = sqlx::query("DELETE FROM watched_movies WHERE user_id = $1")
            .bind(user_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        let feedback = sqlx::query("DELETE FROM feedback WHERE user_id = $1")
            .bind(user_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        tx.commit().await?;
        Ok(ClearedHistory { watched, feedback })
    }
}
