//! Spotify Web API client (client-credentials flow)

use std::fmt;
use std::time::Duration;

use marquee_shared_config::SpotifyConfig;
use reqwest::{Client, StatusCode};
use tracing::{debug, instrument, warn};

use crate::error::{SpotifyError, SpotifyResult};
use crate::models::{SearchResponse, TokenResponse, Track};
use crate::token::TokenCache;

/// Default request timeout in seconds
const DEFAULT_TIMEOUT_SECS: u64 = 8;

/// Default connection timeout in seconds
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 5;

/// Spotify caps search pages at 50 items
const MAX_SEARCH_LIMIT: u32 = 50;

/// Spotify API client
///
/// The token cache is injected so that clients built for the same
/// credentials share one token.
#[derive(Clone)]
pub struct SpotifyClient {
    http_client: Client,
    client_id: String,
    client_secret: String,
    accounts_url: String,
    api_url: String,
    tokens: TokenCache,
}

impl fmt::Debug for SpotifyClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpotifyClient")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("api_url", &self.api_url)
            .finish()
    }
}

fn map_send_error(e: reqwest::Error) -> SpotifyError {
    if e.is_timeout() {
        SpotifyError::Timeout
    } else {
        SpotifyError::Http(e)
    }
}

impl SpotifyClient {
    /// Create a new Spotify client
    ///
    /// # Errors
    /// Returns `SpotifyError::MissingCredentials` if either credential is empty
    pub fn new(config: &SpotifyConfig, tokens: TokenCache) -> SpotifyResult<Self> {
        if config.client_id.is_empty() || config.client_secret.is_empty() {
            return Err(SpotifyError::MissingCredentials);
        }

        let http_client = Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .connect_timeout(Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS))
            .pool_max_idle_per_host(5)
            .user_agent("Marquee/1.0")
            .build()?;

        Ok(Self {
            http_client,
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            accounts_url: config.accounts_url.trim_end_matches('/').to_string(),
            api_url: config.api_url.trim_end_matches('/').to_string(),
            tokens,
        })
    }

    /// Get a valid access token, fetching a new one when the cache is empty
    async fn access_token(&self) -> SpotifyResult<String> {
        if let Some(token) = self.tokens.get().await {
            return Ok(token);
        }

        debug!("Fetching Spotify access token");

        let response = self
            .http_client
            .post(format!("{}/api/token", self.accounts_url))
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await
            .map_err(map_send_error)?;

        match response.status() {
            StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED => {
                return Err(SpotifyError::Unauthorized)
            }
            status if !status.is_success() => {
                return Err(SpotifyError::Api {
                    status: status.as_u16(),
                    message: response.text().await.unwrap_or_default(),
                })
            }
            _ => {}
        }

        let token: TokenResponse = serde_json::from_str(&response.text().await?)?;
        self.tokens
            .store(token.access_token.clone(), Duration::from_secs(token.expires_in))
            .await;

        Ok(token.access_token)
    }

    /// Search tracks by free text
    ///
    /// # Arguments
    /// * `query` - Search text (artist, track name, or both)
    /// * `limit` - Maximum results, clamped to 1..=50
    ///
    /// # Errors
    /// - `SpotifyError::InvalidInput` - If the query is empty
    /// - `SpotifyError::Unauthorized` - If the credentials are rejected
    /// - `SpotifyError::RateLimited` - On HTTP 429
    #[instrument(skip(self))]
    pub async fn search_tracks(&self, query: &str, limit: u32) -> SpotifyResult<Vec<Track>> {
        let query = query.trim();
        if query.is_empty() {
            return Err(SpotifyError::InvalidInput(
                "search query cannot be empty".to_string(),
            ));
        }
        let limit = limit.clamp(1, MAX_SEARCH_LIMIT).to_string();

        let token = self.access_token().await?;
        let response = self
            .http_client
            .get(format!("{}/search", self.api_url))
            .bearer_auth(&token)
            .query(&[("q", query), ("type", "track"), ("limit", limit.as_str())])
            .send()
            .await
            .map_err(map_send_error)?;

        match response.status() {
            StatusCode::TOO_MANY_REQUESTS => {
                warn!("Spotify API rate limited");
                return Err(SpotifyError::RateLimited);
            }
            StatusCode::UNAUTHORIZED => {
                // Token revoked early; next call fetches a fresh one
                self.tokens.invalidate().await;
                return Err(SpotifyError::Unauthorized);
            }
            status if !status.is_success() => {
                return Err(SpotifyError::Api {
                    status: status.as_u16(),
                    message: response.text().await.unwrap_or_default(),
                });
            }
            _ => {}
        }

        let text = response.text().await.map_err(map_send_error)?;
        let parsed: SearchResponse = serde_json::from_str(&text)?;
        let tracks: Vec<Track> = parsed.tracks.items.into_iter().map(Into::into).collect();

        debug!(query = %query, result_count = tracks.len(), "Spotify search complete");

        Ok(tracks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config(server: &MockServer) -> SpotifyConfig {
        SpotifyConfig {
            client_id: "id".to_string(),
            client_secret: "secret".to_string(),
            accounts_url: server.uri(),
            api_url: format!("{}/v1", server.uri()),
        }
    }

    async fn mount_token(server: &MockServer, expected_calls: u64) {
        Mock::given(method("POST"))
            .and(path("/api/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "tok",
                "token_type": "Bearer",
                "expires_in": 3600
            })))
            .expect(expected_calls)
            .mount(server)
            .await;
    }

    fn search_body() -> serde_json::Value {
        json!({"tracks": {"items": [{
            "id": "t1",
            "name": "Time",
            "artists": [{"name": "Hans Zimmer"}],
            "album": {"name": "Inception", "images": [{"url": "https://img/large"}, {"url": "https://img/small"}]},
            "external_urls": {"spotify": "https://open.spotify.com/track/t1"},
            "preview_url": null
        }]}})
    }

    #[test]
    fn test_client_requires_credentials() {
        let config = SpotifyConfig {
            client_id: String::new(),
            client_secret: "secret".to_string(),
            accounts_url: "http://localhost".to_string(),
            api_url: "http://localhost".to_string(),
        };
        assert!(matches!(
            SpotifyClient::new(&config, TokenCache::new()),
            Err(SpotifyError::MissingCredentials)
        ));
    }

    #[tokio::test]
    async fn test_search_tracks_reuses_cached_token() {
        let server = MockServer::start().await;
        mount_token(&server, 1).await;

        Mock::given(method("GET"))
            .and(path("/v1/search"))
            .and(query_param("type", "track"))
            .and(header("authorization", "Bearer tok"))
            .respond_with(ResponseTemplate::new(200).set_body_json(search_body()))
            .expect(2)
            .mount(&server)
            .await;

        let client = SpotifyClient::new(&test_config(&server), TokenCache::new()).unwrap();
        let tracks = client.search_tracks("inception time", 5).await.unwrap();
        client.search_tracks("inception time", 5).await.unwrap();

        assert_eq!(tracks.len(), 1);
        assert_eq!(tracks[0].artists, vec!["Hans Zimmer"]);
        assert_eq!(tracks[0].image_url.as_deref(), Some("https://img/large"));
        assert_eq!(tracks[0].album.as_deref(), Some("Inception"));
    }

    #[tokio::test]
    async fn test_shared_cache_across_clients() {
        let server = MockServer::start().await;
        mount_token(&server, 1).await;

        Mock::given(method("GET"))
            .and(path("/v1/search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(search_body()))
            .mount(&server)
            .await;

        let cache = TokenCache::new();
        let first = SpotifyClient::new(&test_config(&server), cache.clone()).unwrap();
        let second = SpotifyClient::new(&test_config(&server), cache).unwrap();

        first.search_tracks("a", 1).await.unwrap();
        second.search_tracks("b", 1).await.unwrap();
    }

    #[tokio::test]
    async fn test_bad_credentials() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/token"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({"error": "invalid_client"})))
            .mount(&server)
            .await;

        let client = SpotifyClient::new(&test_config(&server), TokenCache::new()).unwrap();
        let result = client.search_tracks("anything", 5).await;
        assert!(matches!(result, Err(SpotifyError::Unauthorized)));
    }

    #[tokio::test]
    async fn test_revoked_token_invalidates_cache() {
        let server = MockServer::start().await;
        mount_token(&server, 1).await;

        Mock::given(method("GET"))
            .and(path("/v1/search"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let cache = TokenCache::new();
        let client = SpotifyClient::new(&test_config(&server), cache.clone()).unwrap();
        let result = client.search_tracks("anything", 5).await;

        assert!(matches!(result, Err(SpotifyError::Unauthorized)));
        assert!(cache.get().await.is_none());
    }

    #[tokio::test]
    async fn test_empty_query_rejected_before_network() {
        let server = MockServer::start().await;
        mount_token(&server, 0).await;

        let client = SpotifyClient::new(&test_config(&server), TokenCache::new()).unwrap();
        assert!(matches!(
            client.search_tracks("  ", 5).await,
            Err(SpotifyError::InvalidInput(_))
        ));
    }
}
