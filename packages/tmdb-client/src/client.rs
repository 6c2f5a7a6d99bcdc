//! TMDB API client implementation

use std::fmt;
use std::future::Future;
use std::time::Duration;

use marquee_shared_config::TmdbConfig;
use reqwest::{Client, StatusCode};
use tracing::{debug, instrument, warn};

use crate::error::{TmdbError, TmdbResult};
use crate::models::{ErrorResponse, MovieDetails, MovieSummary, PagedResponse, RawMovieDetails};

/// Default connection timeout in seconds
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 5;

/// Maximum search query length
const MAX_QUERY_LENGTH: usize = 256;

/// Default number of retry attempts for transient failures
const DEFAULT_MAX_RETRIES: u32 = 2;

/// Base delay for exponential backoff (milliseconds)
const RETRY_BASE_DELAY_MS: u64 = 100;

/// TMDB v3 API client
#[derive(Clone)]
pub struct TmdbClient {
    http_client: Client,
    api_key: String,
    base_url: String,
    image_base_url: String,
    max_retries: u32,
}

impl fmt::Debug for TmdbClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TmdbClient")
            .field("api_key", &"[REDACTED]")
            .field("base_url", &self.base_url)
            .field("max_retries", &self.max_retries)
            .finish()
    }
}

impl TmdbClient {
    /// Create a new TMDB client from configuration
    ///
    /// # Errors
    /// Returns `TmdbError::MissingApiKey` if the API key is empty
    pub fn new(config: &TmdbConfig) -> TmdbResult<Self> {
        if config.api_key.trim().is_empty() {
            return Err(TmdbError::MissingApiKey);
        }

        let http_client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS))
            .pool_max_idle_per_host(5)
            .pool_idle_timeout(Duration::from_secs(90))
            .user_agent("Marquee/1.0")
            .build()?;

        Ok(Self {
            http_client,
            api_key: config.api_key.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            image_base_url: config.image_base_url.clone(),
            max_retries: DEFAULT_MAX_RETRIES,
        })
    }

    /// Create a TMDB client from environment variables
    ///
    /// # Errors
    /// `TmdbError::MissingApiKey` if `TMDB_API_KEY` is not set or is empty
    pub fn from_env() -> TmdbResult<Self> {
        let config = TmdbConfig::from_env().map_err(|_| TmdbError::MissingApiKey)?;
        Self::new(&config)
    }

    /// Set the number of retries for transient failures
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Validate a search query
    fn validate_query(query: &str) -> TmdbResult<&str> {
        let trimmed = query.trim();
        if trimmed.is_empty() {
            return Err(TmdbError::InvalidInput(
                "search query cannot be empty".to_string(),
            ));
        }
        if trimmed.len() > MAX_QUERY_LENGTH {
            return Err(TmdbError::InvalidInput(format!(
                "search query too long (max {} characters)",
                MAX_QUERY_LENGTH
            )));
        }
        Ok(trimmed)
    }

    /// Execute an operation with retry logic for transient failures
    async fn with_retry<T, F, Fut>(&self, operation: F) -> TmdbResult<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = TmdbResult<T>>,
    {
        let mut attempt = 0;
        loop {
            match operation().await {
                Ok(result) => return Ok(result),
                Err(e) if e.is_retryable() && attempt < self.max_retries => {
                    attempt += 1;
                    let delay_ms = RETRY_BASE_DELAY_MS * 2u64.pow(attempt);
                    warn!(
                        attempt = attempt,
                        max_retries = self.max_retries,
                        delay_ms = delay_ms,
                        error = %e,
                        "TMDB request failed, retrying"
                    );
                    tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Make a GET request and map status codes onto errors
    async fn make_request(&self, path: &str, params: &[(&str, &str)]) -> TmdbResult<String> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .http_client
            .get(&url)
            .query(&[("api_key", self.api_key.as_str())])
            .query(params)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    TmdbError::Timeout
                } else {
                    TmdbError::Http(e)
                }
            })?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            warn!("TMDB API rate limited");
            return Err(TmdbError::RateLimited);
        }
        if status == StatusCode::UNAUTHORIZED {
            return Err(TmdbError::InvalidApiKey);
        }

        let text = response.text().await.map_err(|e| {
            if e.is_timeout() {
                TmdbError::Timeout
            } else {
                TmdbError::Http(e)
            }
        })?;

        if !status.is_success() {
            let message = serde_json::from_str::<ErrorResponse>(&text)
                .map(|e| e.status_message)
                .unwrap_or_else(|_| status.to_string());
            return Err(TmdbError::Api {
                status: status.as_u16(),
                message,
            });
        }

        Ok(text)
    }

    /// Fetch a paged movie list and normalize it
    async fn fetch_movie_list(
        &self,
        path: &str,
        params: &[(&str, &str)],
    ) -> TmdbResult<Vec<MovieSummary>> {
        let text = self
            .with_retry(|| async { self.make_request(path, params).await })
            .await?;

        let response: PagedResponse = serde_json::from_str(&text)?;
        Ok(response
            .results
            .into_iter()
            .map(|raw| raw.normalize(&self.image_base_url))
            .collect())
    }

    /// Map a 404 onto `NotFound` for id-addressed endpoints
    fn not_found_for(id: i64) -> impl Fn(TmdbError) -> TmdbError {
        move |e| match e {
            TmdbError::Api { status: 404, .. } => TmdbError::NotFound(id),
            other => other,
        }
    }

    /// Search movies by title
    ///
    /// # Arguments
    /// * `query` - Free-text title query
    /// * `year` - Optional release year to narrow the search
    ///
    /// # Errors
    /// - `TmdbError::InvalidInput` - If the query is empty or too long
    /// - `TmdbError::Api` - If TMDB returns an error
    /// - `TmdbError::Timeout` - If the request timed out
    #[instrument(skip(self))]
    pub async fn search_movies(
        &self,
        query: &str,
        year: Option<i32>,
    ) -> TmdbResult<Vec<MovieSummary>> {
        let query = Self::validate_query(query)?;
        let year_str = year.map(|y| y.to_string());

        let mut params = vec![("query", query), ("include_adult", "false")];
        if let Some(year) = year_str.as_deref() {
            params.push(("year", year));
        }

        let movies = self.fetch_movie_list("/search/movie", &params).await?;
        debug!(query = %query, result_count = movies.len(), "TMDB search complete");
        Ok(movies)
    }

    /// Get full details for a movie
    ///
    /// # Errors
    /// - `TmdbError::NotFound` - If TMDB has no movie with that id
    #[instrument(skip(self))]
    pub async fn movie_details(&self, movie_id: i64) -> TmdbResult<MovieDetails> {
        let path = format!("/movie/{}", movie_id);
        let text = self
            .with_retry(|| async { self.make_request(&path, &[]).await })
            .await
            .map_err(Self::not_found_for(movie_id))?;

        let raw: RawMovieDetails = serde_json::from_str(&text)?;
        Ok(raw.normalize(&self.image_base_url))
    }

    /// Get TMDB's recommendations for a movie
    #[instrument(skip(self))]
    pub async fn recommendations(&self, movie_id: i64) -> TmdbResult<Vec<MovieSummary>> {
        let path = format!("/movie/{}/recommendations", movie_id);
        let movies = self
            .fetch_movie_list(&path, &[])
            .await
            .map_err(Self::not_found_for(movie_id))?;
        debug!(movie_id, result_count = movies.len(), "Fetched recommendations");
        Ok(movies)
    }

    /// Get movies TMDB considers similar (keyword/genre based)
    #[instrument(skip(self))]
    pub async fn similar(&self, movie_id: i64) -> TmdbResult<Vec<MovieSummary>> {
        let path = format!("/movie/{}/similar", movie_id);
        let movies = self
            .fetch_movie_list(&path, &[])
            .await
            .map_err(Self::not_found_for(movie_id))?;
        debug!(movie_id, result_count = movies.len(), "Fetched similar movies");
        Ok(movies)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_client(server: &MockServer) -> TmdbClient {
        TmdbClient::new(&TmdbConfig::with_url(server.uri(), "test_key"))
            .unwrap()
            .with_max_retries(0)
    }

    #[test]
    fn test_client_requires_api_key() {
        let result = TmdbClient::new(&TmdbConfig::with_url("http://localhost", ""));
        assert!(matches!(result, Err(TmdbError::MissingApiKey)));
    }

    #[test]
    fn test_client_debug_redacts_api_key() {
        let client = TmdbClient::new(&TmdbConfig::with_url("http://localhost", "secret_key")).unwrap();
        let debug_str = format!("{:?}", client);
        assert!(!debug_str.contains("secret_key"));
        assert!(debug_str.contains("[REDACTED]"));
    }

    #[test]
    fn test_validate_query() {
        assert!(matches!(
            TmdbClient::validate_query("   "),
            Err(TmdbError::InvalidInput(_))
        ));
        assert!(matches!(
            TmdbClient::validate_query(&"a".repeat(MAX_QUERY_LENGTH + 1)),
            Err(TmdbError::InvalidInput(_))
        ));
        assert!(matches!(TmdbClient::validate_query("  Heat "), Ok("Heat")));
    }

    #[test]
    fn test_error_is_retryable() {
        assert!(TmdbError::Timeout.is_retryable());
        assert!(TmdbError::RateLimited.is_retryable());
        assert!(!TmdbError::MissingApiKey.is_retryable());
        assert!(!TmdbError::NotFound(1).is_retryable());
        assert!(TmdbError::Api { status: 503, message: String::new() }.is_retryable());
    }

    #[tokio::test]
    async fn test_search_movies_normalizes_results() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/search/movie"))
            .and(query_param("query", "Inception"))
            .and(query_param("api_key", "test_key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "page": 1,
                "results": [{
                    "id": 27205,
                    "title": "Inception",
                    "overview": "A thief who steals corporate secrets...",
                    "release_date": "2010-07-15",
                    "poster_path": "/inception.jpg",
                    "genre_ids": [28, 878, 12]
                }, {
                    "id": 1,
                    "title": "Inception: Unknown",
                    "overview": "",
                    "release_date": "",
                    "poster_path": null,
                    "genre_ids": []
                }]
            })))
            .mount(&server)
            .await;

        let movies = test_client(&server)
            .search_movies("Inception", None)
            .await
            .unwrap();

        assert_eq!(movies.len(), 2);
        assert_eq!(movies[0].release_year, Some(2010));
        assert_eq!(
            movies[0].poster_url.as_deref(),
            Some("https://image.tmdb.org/t/p/w500/inception.jpg")
        );
        assert_eq!(movies[0].genres, vec!["Action", "Science Fiction", "Adventure"]);
        assert_eq!(movies[1].release_year, None);
        assert_eq!(movies[1].overview, None);
        assert_eq!(movies[1].poster_url, None);
    }

    #[tokio::test]
    async fn test_search_passes_year() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/search/movie"))
            .and(query_param("year", "1995"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"results": []})))
            .expect(1)
            .mount(&server)
            .await;

        let movies = test_client(&server)
            .search_movies("Heat", Some(1995))
            .await
            .unwrap();
        assert!(movies.is_empty());
    }

    #[tokio::test]
    async fn test_movie_details() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/movie/27205"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": 27205,
                "title": "Inception",
                "overview": "Dreams within dreams.",
                "release_date": "2010-07-15",
                "poster_path": "/inception.jpg",
                "genres": [{"id": 28, "name": "Action"}, {"id": 878, "name": "Science Fiction"}],
                "runtime": 148,
                "tagline": "Your mind is the scene of the crime.",
                "vote_average": 8.4
            })))
            .mount(&server)
            .await;

        let details = test_client(&server).movie_details(27205).await.unwrap();
        assert_eq!(details.title, "Inception");
        assert_eq!(details.genres, vec!["Action", "Science Fiction"]);
        assert_eq!(details.runtime, Some(148));
    }

    #[tokio::test]
    async fn test_movie_details_not_found() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/movie/999"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "status_code": 34,
                "status_message": "The resource you requested could not be found."
            })))
            .mount(&server)
            .await;

        let result = test_client(&server).movie_details(999).await;
        assert!(matches!(result, Err(TmdbError::NotFound(999))));
    }

    #[tokio::test]
    async fn test_rate_limited() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/movie/1/similar"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let result = test_client(&server).similar(1).await;
        assert!(matches!(result, Err(TmdbError::RateLimited)));
    }

    #[tokio::test]
    async fn test_unauthorized() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/movie/1/recommendations"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let result = test_client(&server).recommendations(1).await;
        assert!(matches!(result, Err(TmdbError::InvalidApiKey)));
    }

    #[tokio::test]
    async fn test_retries_server_errors() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/movie/5/recommendations"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/movie/5/recommendations"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"results": [
                {"id": 6, "title": "Six", "release_date": "2001-01-01", "genre_ids": []}
            ]})))
            .mount(&server)
            .await;

        let client = test_client(&server).with_max_retries(1);
        let movies = client.recommendations(5).await.unwrap();
        assert_eq!(movies.len(), 1);
        assert_eq!(movies[0].release_year, Some(2001));
    }
}
