//! Movie and music catalog collaborators
//!
//! The chat service only sees the `Catalog` / `TrackCatalog` traits. The
//! TMDB and Spotify clients implement them here, normalizing their errors
//! into `CatalogError`.

use async_trait::async_trait;
use marquee_spotify_client::{SpotifyClient, SpotifyError, Track};
use marquee_tmdb_client::{TmdbClient, TmdbError};
use thiserror::Error;

use crate::models::{CandidateMovie, MovieDetails};

/// Catalog errors as seen by the chat service
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CatalogError {
    #[error("request timed out")]
    Timeout,

    #[error("rate limited by catalog")]
    RateLimited,

    #[error("movie not found: {0}")]
    NotFound(i64),

    #[error("invalid request: {0}")]
    InvalidInput(String),

    #[error("catalog error: {0}")]
    Upstream(String),
}

/// Result type for catalog operations
pub type CatalogResult<T> = Result<T, CatalogError>;

impl From<TmdbError> for CatalogError {
    fn from(err: TmdbError) -> Self {
        match err {
            TmdbError::Timeout => CatalogError::Timeout,
            TmdbError::Http(e) if e.is_timeout() => CatalogError::Timeout,
            TmdbError::RateLimited => CatalogError::RateLimited,
            TmdbError::NotFound(id) => CatalogError::NotFound(id),
            TmdbError::InvalidInput(msg) => CatalogError::InvalidInput(msg),
            other => CatalogError::Upstream(other.to_string()),
        }
    }
}

impl From<SpotifyError> for CatalogError {
    fn from(err: SpotifyError) -> Self {
        match err {
            SpotifyError::Timeout => CatalogError::Timeout,
            SpotifyError::RateLimited => CatalogError::RateLimited,
            SpotifyError::InvalidInput(msg) => CatalogError::InvalidInput(msg),
            other => CatalogError::Upstream(other.to_string()),
        }
    }
}

/// Movie catalog operations the recommenders depend on
#[async_trait]
pub trait Catalog: Send + Sync {
    /// Search movies by title
    async fn search_movies(&self, query: &str, year: Option<i32>) -> CatalogResult<Vec<CandidateMovie>>;

    /// Full details for one movie
    async fn movie_details(&self, movie_id: i64) -> CatalogResult<MovieDetails>;

    /// The catalog's own "recommended" list for a movie
    async fn recommendations(&self, movie_id: i64) -> CatalogResult<Vec<CandidateMovie>>;

    /// The catalog's "similar" list for a movie
    async fn similar(&self, movie_id: i64) -> CatalogResult<Vec<CandidateMovie>>;
}

#[async_trait]
impl Catalog for TmdbClient {
    async fn search_movies(&self, query: &str, year: Option<i32>) -> CatalogResult<Vec<CandidateMovie>> {
        let movies = TmdbClient::search_movies(self, query, year).await?;
        Ok(movies.into_iter().map(Into::into).collect())
    }

    async fn movie_details(&self, movie_id: i64) -> CatalogResult<MovieDetails> {
        Ok(TmdbClient::movie_details(self, movie_id).await?.into())
    }

    async fn recommendations(&self, movie_id: i64) -> CatalogResult<Vec<CandidateMovie>> {
        let movies = TmdbClient::recommendations(self, movie_id).await?;
        Ok(movies.into_iter().map(Into::into).collect())
    }

    async fn similar(&self, movie_id: i64) -> CatalogResult<Vec<CandidateMovie>> {
        let movies = TmdbClient::similar(self, movie_id).await?;
        Ok(movies.into_iter().map(Into::into).collect())
    }
}

/// Track search (optional collaborator)
#[async_trait]
pub trait TrackCatalog: Send + Sync {
    async fn search_tracks(&self, query: &str, limit: u32) -> CatalogResult<Vec<Track>>;
}

#[async_trait]
impl TrackCatalog for SpotifyClient {
    async fn search_tracks(&self, query: &str, limit: u32) -> CatalogResult<Vec<Track>> {
        Ok(SpotifyClient::search_tracks(self, query, limit).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tmdb_errors_normalize() {
        assert_eq!(CatalogError::from(TmdbError::Timeout), CatalogError::Timeout);
        assert_eq!(CatalogError::from(TmdbError::NotFound(7)), CatalogError::NotFound(7));
        assert_eq!(
            CatalogError::from(TmdbError::RateLimited),
            CatalogError::RateLimited
        );
        assert!(matches!(
            CatalogError::from(TmdbError::InvalidApiKey),
            CatalogError::Upstream(_)
        ));
    }

    #[test]
    fn test_timeout_message_is_uniform() {
        assert_eq!(CatalogError::Timeout.to_string(), "request timed out");
        assert_eq!(
            CatalogError::from(SpotifyError::Timeout).to_string(),
            "request timed out"
        );
    }
}
