//! Mock TMDB server
//!
//! Provides a [`MockTmdbServer`] for the v3 endpoints the catalog uses, plus
//! fixture builders producing raw TMDB JSON.

use serde_json::{json, Value};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Raw TMDB list item (`/search/movie`, `/recommendations`, `/similar`)
pub fn tmdb_movie(id: i64, title: &str, release_date: &str, genre_ids: &[i64]) -> Value {
    json!({
        "id": id,
        "title": title,
        "overview": format!("Overview of {}", title),
        "release_date": release_date,
        "poster_path": format!("/{}.jpg", id),
        "genre_ids": genre_ids
    })
}

/// Raw TMDB `/movie/{id}` body
pub fn tmdb_movie_details(id: i64, title: &str, release_date: &str, genres: &[(i64, &str)]) -> Value {
    let genres: Vec<Value> = genres
        .iter()
        .map(|(id, name)| json!({"id": id, "name": name}))
        .collect();

    json!({
        "id": id,
        "title": title,
        "overview": format!("Overview of {}", title),
        "release_date": release_date,
        "poster_path": format!("/{}.jpg", id),
        "genres": genres,
        "runtime": 120,
        "tagline": null,
        "vote_average": 7.5
    })
}

fn page(results: Vec<Value>) -> Value {
    json!({"page": 1, "results": results, "total_pages": 1, "total_results": 0})
}

/// Mock TMDB server
pub struct MockTmdbServer {
    server: MockServer,
}

impl MockTmdbServer {
    /// Start a new mock TMDB server
    pub async fn start() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    /// Get the server URL (use as `TMDB_BASE_URL`)
    pub fn url(&self) -> String {
        self.server.uri()
    }

    /// Mount a search response for any query
    pub async fn mock_search(&self, results: Vec<Value>) {
        Mock::given(method("GET"))
            .and(path("/search/movie"))
            .respond_with(ResponseTemplate::new(200).set_body_json(page(results)))
            .mount(&self.server)
            .await;
    }

    /// Mount a search response for one specific query
    pub async fn mock_search_for(&self, query: &str, results: Vec<Value>) {
        Mock::given(method("GET"))
            .and(path("/search/movie"))
            .and(query_param("query", query))
            .respond_with(ResponseTemplate::new(200).set_body_json(page(results)))
            .with_priority(1)
            .mount(&self.server)
            .await;
    }

    /// Mount a `/movie/{id}` response
    pub async fn mock_details(&self, id: i64, details: Value) {
        Mock::given(method("GET"))
            .and(path(format!("/movie/{}", id)))
            .respond_with(ResponseTemplate::new(200).set_body_json(details))
            .mount(&self.server)
            .await;
    }

    /// Mount a `/movie/{id}/recommendations` response
    pub async fn mock_recommendations(&self, id: i64, results: Vec<Value>) {
        Mock::given(method("GET"))
            .and(path(format!("/movie/{}/recommendations", id)))
            .respond_with(ResponseTemplate::new(200).set_body_json(page(results)))
            .mount(&self.server)
            .await;
    }

    /// Mount a `/movie/{id}/similar` response
    pub async fn mock_similar(&self, id: i64, results: Vec<Value>) {
        Mock::given(method("GET"))
            .and(path(format!("/movie/{}/similar", id)))
            .respond_with(ResponseTemplate::new(200).set_body_json(page(results)))
            .mount(&self.server)
            .await;
    }

    /// Mount an error status for an exact path
    pub async fn mock_failure(&self, request_path: &str, status_code: u16) {
        Mock::given(method("GET"))
            .and(path(request_path.to_string()))
            .respond_with(ResponseTemplate::new(status_code).set_body_json(json!({
                "status_code": 0,
                "status_message": "mock failure"
            })))
            .mount(&self.server)
            .await;
    }

    /// Number of requests received for a path
    pub async fn request_count(&self, request_path: &str) -> usize {
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .filter(|r| r.url.path() == request_path)
            .count()
    }
}
