//! TMDB movie catalog client for Marquee
//!
//! This crate wraps the TMDB v3 REST API:
//! - Movie search by title (optionally narrowed by year)
//! - Movie details
//! - Recommendations and similar movies for a given movie
//!
//! Results are normalized: release dates become years, poster paths become
//! full URLs and genre ids become canonical genre names.
//!
//! # Example
//!
//! ```rust,no_run
//! use marquee_tmdb_client::TmdbClient;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = TmdbClient::from_env()?;
//!
//! let results = client.search_movies("Inception", None).await?;
//! if let Some(movie) = results.first() {
//!     for similar in client.recommendations(movie.id).await? {
//!         println!("{} ({:?})", similar.title, similar.release_year);
//!     }
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Environment Variables
//!
//! - `TMDB_API_KEY`: v3 API key (required)
//! - `TMDB_BASE_URL`: API base URL (default `https://api.themoviedb.org/3`)
//! - `TMDB_TIMEOUT_SECS`: request timeout (default 8)

mod client;
mod error;
pub mod genres;
mod models;

pub use client::TmdbClient;
pub use error::{TmdbError, TmdbResult};
pub use models::{MovieDetails, MovieSummary};

#[cfg(test)]
mod tests {
    use crate::models::parse_release_year;

    #[test]
    fn test_parse_release_year() {
        assert_eq!(parse_release_year(Some("1999-03-31")), Some(1999));
        assert_eq!(parse_release_year(Some("")), None);
        assert_eq!(parse_release_year(Some("19")), None);
        assert_eq!(parse_release_year(None), None);
    }
}
