//! Shared test utilities for the Marquee workspace
//!
//! Mock implementations of the HTTP collaborators, so service and route
//! tests run without network access.
//!
//! # Mock Services
//!
//! - [`MockOllamaServer`] - Mock Ollama server for chat (with tool calls) and embeddings
//! - [`MockTmdbServer`] - Mock TMDB v3 API for search, details and recommendations
//!
//! # Example
//!
//! ```rust,ignore
//! use marquee_test_utils::{tmdb_movie, MockOllamaServer, MockTmdbServer};
//!
//! #[tokio::test]
//! async fn test_with_mocks() {
//!     let ollama = MockOllamaServer::start().await;
//!     ollama.mock_chat_success("Hello!").await;
//!
//!     let tmdb = MockTmdbServer::start().await;
//!     tmdb.mock_search(vec![tmdb_movie(27205, "Inception", "2010-07-15", &[28, 878])]).await;
//!
//!     // Use ollama.url() / tmdb.url() to configure your clients
//! }
//! ```

mod ollama;
mod tmdb;

pub use ollama::MockOllamaServer;
pub use tmdb::{tmdb_movie, tmdb_movie_details, MockTmdbServer};
