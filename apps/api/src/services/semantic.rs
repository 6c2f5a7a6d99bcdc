//! Semantic movie recommendations over pgvector
//!
//! The seed's descriptive text is embedded with Ollama and compared against
//! `movie_embeddings` by cosine distance. Seeds are upserted into the index
//! as they are queried, and catalog results are indexed in the background
//! through `spawn_indexing`, so the neighborhood grows with use.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use marquee_ollama_client::{validate_embedding_dimension, OllamaClient, OllamaError};
use sqlx::PgPool;
use thiserror::Error;
use tokio::time::timeout;
use tracing::{debug, info, instrument, warn};

use crate::models::{CandidateMovie, Confidence, MovieDetails};
use crate::services::filters::{dedupe_by_id, MovieFilters};

/// Upper bound on neighbors requested from one query
const MAX_SEMANTIC_RESULTS: usize = 50;

/// Neighbors fetched per requested result, leaving room for the post-filter
const OVERFETCH_FACTOR: usize = 3;

/// Upper bound on one background indexing batch
const INDEX_JOB_TIMEOUT_SECS: u64 = 120;

#[derive(Debug, Error)]
pub enum SemanticError {
    #[error("embedding failed: {0}")]
    Embedding(#[from] OllamaError),

    #[error("invalid embedding: {0}")]
    InvalidEmbedding(String),

    #[error("vector index query failed: {0}")]
    Database(#[from] sqlx::Error),
}

pub type SemanticResult<T> = Result<T, SemanticError>;

/// Nearest-neighbor recommendations for a seed movie
#[async_trait]
pub trait SemanticRecommender: Send + Sync {
    /// Up to `limit` neighbors of `seed` that pass `filters`, best first.
    /// The seed itself is never returned.
    async fn recommend(
        &self,
        seed: &MovieDetails,
        filters: &MovieFilters,
        limit: usize,
    ) -> SemanticResult<Vec<CandidateMovie>>;

    /// Add catalog movies to the index, skipping ones already present
    ///
    /// # Returns
    /// * `Ok(usize)` - Number of movies newly embedded
    async fn index_movies(&self, movies: &[CandidateMovie]) -> SemanticResult<usize>;
}

/// Index `movies` on a background task
///
/// The batch is bounded by a job timeout; failures are logged and dropped.
pub fn spawn_indexing(semantic: Arc<dyn SemanticRecommender>, movies: Vec<CandidateMovie>) {
    if movies.is_empty() {
        return;
    }

    tokio::spawn(async move {
        let count = movies.len();
        match timeout(Duration::from_secs(INDEX_JOB_TIMEOUT_SECS), semantic.index_movies(&movies)).await {
            Ok(Ok(indexed)) => debug!(candidates = count, indexed, "Indexed catalog movies"),
            Ok(Err(e)) => warn!(error = %e, candidates = count, "Catalog indexing failed"),
            Err(_) => warn!(timeout_secs = INDEX_JOB_TIMEOUT_SECS, "Catalog indexing timed out"),
        }
    });
}

pub struct PgSemanticRecommender {
    pool: PgPool,
    ollama: OllamaClient,
}

#[derive(Debug, sqlx::FromRow)]
struct NeighborRow {
    movie_id: i64,
    title: String,
    overview: Option<String>,
    release_year: Option<i32>,
    poster_url: Option<String>,
    genres: Vec<String>,
    score: f64,
}

impl PgSemanticRecommender {
    pub fn new(pool: PgPool, ollama: OllamaClient) -> Self {
        Self { pool, ollama }
    }

    async fn embed(&self, movie: &MovieDetails) -> SemanticResult<String> {
        let embedding = self.ollama.generate_embedding(&movie.embedding_text()).await?;
        validate_embedding_dimension(&embedding)?;
        format_embedding_for_pgvector(&embedding)
    }

    async fn index_movie(&self, movie: &MovieDetails, vector: &str) -> SemanticResult<()> {
        sqlx::query(
            r#"
            INSERT INTO movie_embeddings
                (movie_id, title, overview, release_year, poster_url, genres, embedding, model_used, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7::vector, $8, NOW())
            ON CONFLICT (movie_id) DO UPDATE SET
                title = EXCLUDED.title,
                overview = EXCLUDED.overview,
                release_year = EXCLUDED.release_year,
                poster_url = EXCLUDED.poster_url,
                genres = EXCLUDED.genres,
                embedding = EXCLUDED.embedding,
                model_used = EXCLUDED.model_used,
                updated_at = NOW()
            "#,
        )
        .bind(movie.id)
        .bind(&movie.title)
        .bind(&movie.overview)
        .bind(movie.release_year)
        .bind(&movie.poster_url)
        .bind(&movie.genres)
        .bind(vector)
        .bind(&self.ollama.config().embedding_model)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl SemanticRecommender for PgSemanticRecommender {
    #[instrument(skip(self, seed, filters), fields(seed_id = seed.id))]
    async fn recommend(
        &self,
        seed: &MovieDetails,
        filters: &MovieFilters,
        limit: usize,
    ) -> SemanticResult<Vec<CandidateMovie>> {
        let limit = limit.clamp(1, MAX_SEMANTIC_RESULTS);

        let vector = self.embed(seed).await?;

        if let Err(e) = self.index_movie(seed, &vector).await {
            warn!(error = %e, "Failed to index seed embedding");
        }

        // Lower distance = more similar; converted to a 0..1 similarity
        let rows: Vec<NeighborRow> = sqlx::query_as(
            r#"
            SELECT
                movie_id,
                title,
                overview,
                release_year,
                poster_url,
                genres,
                (1.0 - (embedding <=> $1::vector))::float8 AS score
            FROM movie_embeddings
            WHERE movie_id <> $2
              AND ($3::int IS NULL OR release_year >= $3)
              AND ($4::int IS NULL OR release_year <= $4)
            ORDER BY embedding <=> $1::vector
            LIMIT $5
            "#,
        )
        .bind(&vector)
        .bind(seed.id)
        .bind(filters.min_year)
        .bind(filters.max_year)
        .bind((limit * OVERFETCH_FACTOR) as i64)
        .fetch_all(&self.pool)
        .await?;

        debug!(neighbors = rows.len(), "Vector index returned neighbors");

        let candidates = rows.into_iter().map(|row| {
            let score = row.score.clamp(0.0, 1.0);
            CandidateMovie {
                id: row.movie_id,
                title: row.title,
                overview: row.overview,
                release_year: row.release_year,
                poster_url: row.poster_url,
                genres: row.genres,
                confidence: Some(Confidence::from_similarity(score)),
            }
        });

        Ok(candidates.filter(|m| filters.matches(m)).take(limit).collect())
    }

    #[instrument(skip(self, movies), fields(candidates = movies.len()))]
    async fn index_movies(&self, movies: &[CandidateMovie]) -> SemanticResult<usize> {
        let ids: Vec<i64> = movies.iter().map(|m| m.id).collect();
        let known: Vec<(i64,)> = sqlx::query_as("SELECT movie_id FROM movie_embeddings WHERE movie_id = ANY($1)")
            .bind(&ids)
            .fetch_all(&self.pool)
            .await?;
        let known: HashSet<i64> = known.into_iter().map(|(id,)| id).collect();

        let mut indexed = 0;
        for movie in dedupe_by_id(movies.to_vec()) {
            if known.contains(&movie.id) {
                continue;
            }
            let details = MovieDetails::from(movie);
            let vector = self.embed(&details).await?;
            self.index_movie(&details, &vector).await?;
            indexed += 1;
        }

        if indexed > 0 {
            info!(indexed, "Added catalog movies to the vector index");
        }
        Ok(indexed)
    }
}

/// Render an embedding as a pgvector literal, e.g. `[0.100000,-0.250000]`
fn format_embedding_for_pgvector(embedding: &[f32]) -> SemanticResult<String> {
    if embedding.iter().any(|v| !v.is_finite()) {
        return Err(SemanticError::InvalidEmbedding(
            "embedding contains non-finite values (NaN/inf)".to_string(),
        ));
    }

    let values: Vec<String> = embedding.iter().map(|v| format!("{:.6}", v)).collect();
    Ok(format!("[{}]", values.join(",")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_embedding() {
        let formatted = format_embedding_for_pgvector(&[0.1, -0.25, 1.0]).unwrap();
        assert_eq!(formatted, "[0.100000,-0.250000,1.000000]");
    }

    #[test]
    fn test_format_embedding_rejects_nan() {
        let result = format_embedding_for_pgvector(&[0.1, f32::NAN]);
        assert!(matches!(result, Err(SemanticError::InvalidEmbedding(_))));
    }

    #[test]
    fn test_format_embedding_rejects_infinity() {
        assert!(format_embedding_for_pgvector(&[f32::INFINITY]).is_err());
    }
}
