//! Tool registry and executor for the LLM loop
//!
//! Tools form a closed enum with typed arguments. `ToolRegistry::execute`
//! never fails: every outcome is rendered as `{"result": ...}` or
//! `{"result": null, "error": "..."}` and handed back to the model.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use marquee_ollama_client::ToolDefinition;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, instrument, warn};

use crate::models::{CandidateMovie, Genre, ItemType, Rating};
use crate::repositories::HistoryStore;
use crate::services::catalog::{Catalog, CatalogError, TrackCatalog};
use crate::services::filters::{dedupe_by_id, MovieFilters};
use crate::services::merger::SINGLE_SOURCE_LIMIT;
use crate::services::semantic::{spawn_indexing, SemanticRecommender};

/// Characters of the argument JSON kept in a debug event
pub const ARGUMENT_PREVIEW_CHARS: usize = 200;

const DEFAULT_HISTORY_LIMIT: i64 = 10;
const MAX_HISTORY_LIMIT: i64 = 50;
const DEFAULT_TRACK_LIMIT: u32 = 5;
const MAX_TRACK_LIMIT: u32 = 10;

/// Share of the dispatch timeout the semantic attempt may use before the
/// catalog fallback runs
const SEMANTIC_BUDGET_FRACTION: f64 = 0.5;

// Name fragments of tools that act on the caller's own data
const USER_SCOPED_MARKERS: [&str; 4] = ["save_", "history", "feedback", "rate_"];

// ==================== Debug Events ====================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DebugEventKind {
    ToolCall,
    Fallback,
    ParseFallback,
    LlmError,
    Exhausted,
    FastPath,
}

/// Diagnostic record attached to one turn's response
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DebugEvent {
    pub kind: DebugEventKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub args: Option<String>,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl DebugEvent {
    pub fn new(kind: DebugEventKind, ok: bool, detail: impl Into<String>) -> Self {
        Self {
            kind,
            tool: None,
            args: None,
            ok,
            detail: Some(detail.into()),
        }
    }

    pub fn tool_call(tool: &str, args: &Value, ok: bool, detail: Option<String>) -> Self {
        Self {
            kind: DebugEventKind::ToolCall,
            tool: Some(tool.to_string()),
            args: Some(argument_preview(args)),
            ok,
            detail,
        }
    }

    pub fn fallback(tool: &str, detail: impl Into<String>) -> Self {
        Self {
            tool: Some(tool.to_string()),
            ..Self::new(DebugEventKind::Fallback, true, detail)
        }
    }
}

/// Compact JSON of `args`, cut to `ARGUMENT_PREVIEW_CHARS` characters
pub fn argument_preview(args: &Value) -> String {
    let text = args.to_string();
    if text.chars().count() <= ARGUMENT_PREVIEW_CHARS {
        return text;
    }
    let mut preview: String = text.chars().take(ARGUMENT_PREVIEW_CHARS).collect();
    preview.push('…');
    preview
}

// ==================== Tools ====================

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ToolError {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Invalid arguments for {tool}: {message}")]
    InvalidArguments { tool: String, message: String },
}

// 2^63; `i64::MAX as f64` rounds up to it, so the upper bound is exclusive
const I64_FLOAT_BOUND: f64 = 9_223_372_036_854_775_808.0;

/// LLMs send ids both as numbers and as numeric strings
fn lenient_i64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(i64),
        Float(f64),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Number(n) => Ok(n),
        Raw::Float(f) if f.fract() == 0.0 && (-I64_FLOAT_BOUND..I64_FLOAT_BOUND).contains(&f) => {
            Ok(f as i64)
        }
        Raw::Float(f) => Err(serde::de::Error::custom(format!("expected an integer, got {}", f))),
        Raw::Text(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}

fn lenient_opt_i64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<i64>, D::Error> {
    #[derive(Deserialize)]
    struct Wrapper(#[serde(deserialize_with = "lenient_i64")] i64);

    Ok(Option::<Wrapper>::deserialize(deserializer)?.map(|Wrapper(v)| v))
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SearchMoviesArgs {
    pub query: String,
    #[serde(default, deserialize_with = "lenient_opt_i64")]
    pub year: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MovieIdArgs {
    #[serde(deserialize_with = "lenient_i64")]
    pub movie_id: i64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RecommendationArgs {
    #[serde(deserialize_with = "lenient_i64")]
    pub movie_id: i64,
    #[serde(default)]
    pub exclude_genres: Vec<String>,
    #[serde(default, deserialize_with = "lenient_opt_i64")]
    pub min_year: Option<i64>,
    #[serde(default, deserialize_with = "lenient_opt_i64")]
    pub max_year: Option<i64>,
    #[serde(default, deserialize_with = "lenient_opt_i64")]
    pub limit: Option<i64>,
}

impl RecommendationArgs {
    /// Unknown genre names are ignored
    pub fn filters(&self) -> MovieFilters {
        let excluded: BTreeSet<Genre> = self.exclude_genres.iter().filter_map(|g| Genre::parse(g)).collect();
        MovieFilters::new(
            excluded,
            self.min_year.and_then(|y| i32::try_from(y).ok()),
            self.max_year.and_then(|y| i32::try_from(y).ok()),
        )
    }

    fn limit(&self) -> usize {
        self.limit
            .map_or(SINGLE_SOURCE_LIMIT, |l| l.clamp(1, SINGLE_SOURCE_LIMIT as i64) as usize)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SaveWatchedArgs {
    pub user_id: String,
    #[serde(deserialize_with = "lenient_i64")]
    pub movie_id: i64,
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct WatchHistoryArgs {
    pub user_id: String,
    #[serde(default, deserialize_with = "lenient_opt_i64")]
    pub limit: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RateMovieArgs {
    pub user_id: String,
    #[serde(deserialize_with = "lenient_i64")]
    pub movie_id: i64,
    pub rating: Rating,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct UserArgs {
    pub user_id: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SearchTracksArgs {
    pub query: String,
    #[serde(default, deserialize_with = "lenient_opt_i64")]
    pub limit: Option<i64>,
}

/// A validated tool call
#[derive(Debug, Clone, PartialEq)]
pub enum Tool {
    SearchMovies(SearchMoviesArgs),
    GetMovieDetails(MovieIdArgs),
    GetMovieRecommendations(RecommendationArgs),
    GetSemanticMovieRecommendations(RecommendationArgs),
    SaveWatchedMovie(SaveWatchedArgs),
    GetWatchHistory(WatchHistoryArgs),
    RateMovie(RateMovieArgs),
    GetFeedback(UserArgs),
    SearchTracks(SearchTracksArgs),
}

fn is_user_scoped(name: &str) -> bool {
    USER_SCOPED_MARKERS.iter().any(|marker| name.contains(marker))
}

impl Tool {
    /// Parse an LLM tool call; `user_id` overrides any value the model sent
    /// for tools acting on the caller's data
    pub fn parse(name: &str, args: &Value, user_id: &str) -> Result<Tool, ToolError> {
        let mut args = match args {
            Value::Object(map) => Value::Object(map.clone()),
            Value::Null => json!({}),
            // Some models send the argument object as a JSON string
            Value::String(text) => serde_json::from_str::<Value>(text)
                .ok()
                .filter(Value::is_object)
                .unwrap_or_else(|| json!({})),
            _ => json!({}),
        };
        if is_user_scoped(name) {
            if let Value::Object(map) = &mut args {
                map.insert("user_id".to_string(), Value::String(user_id.to_string()));
            }
        }

        fn typed<T: serde::de::DeserializeOwned>(name: &str, args: Value) -> Result<T, ToolError> {
            serde_json::from_value(args).map_err(|e| ToolError::InvalidArguments {
                tool: name.to_string(),
                message: e.to_string(),
            })
        }

        let tool = match name {
            "search_movies" => Tool::SearchMovies(typed(name, args)?),
            "get_movie_details" => Tool::GetMovieDetails(typed(name, args)?),
            "get_movie_recommendations" => Tool::GetMovieRecommendations(typed(name, args)?),
            "get_semantic_movie_recommendations" => Tool::GetSemanticMovieRecommendations(typed(name, args)?),
            "save_watched_movie" => Tool::SaveWatchedMovie(typed(name, args)?),
            "get_watch_history" => Tool::GetWatchHistory(typed(name, args)?),
            "rate_movie" => Tool::RateMovie(typed(name, args)?),
            "get_feedback" => Tool::GetFeedback(typed(name, args)?),
            "search_tracks" => Tool::SearchTracks(typed(name, args)?),
            other => return Err(ToolError::UnknownTool(other.to_string())),
        };

        if let Tool::SearchMovies(SearchMoviesArgs { query, .. }) | Tool::SearchTracks(SearchTracksArgs { query, .. }) =
            &tool
        {
            if query.trim().is_empty() {
                return Err(ToolError::InvalidArguments {
                    tool: name.to_string(),
                    message: "query must not be empty".to_string(),
                });
            }
        }

        Ok(tool)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Tool::SearchMovies(_) => "search_movies",
            Tool::GetMovieDetails(_) => "get_movie_details",
            Tool::GetMovieRecommendations(_) => "get_movie_recommendations",
            Tool::GetSemanticMovieRecommendations(_) => "get_semantic_movie_recommendations",
            Tool::SaveWatchedMovie(_) => "save_watched_movie",
            Tool::GetWatchHistory(_) => "get_watch_history",
            Tool::RateMovie(_) => "rate_movie",
            Tool::GetFeedback(_) => "get_feedback",
            Tool::SearchTracks(_) => "search_tracks",
        }
    }
}

// ==================== Outcomes ====================

/// Result of one tool execution
#[derive(Debug, Clone, PartialEq)]
pub struct ToolOutcome {
    pub result: Result<Value, String>,
    /// Set when a compound tool answered from its fallback source
    pub fallback: Option<String>,
}

impl ToolOutcome {
    fn ok(value: Value) -> Self {
        Self {
            result: Ok(value),
            fallback: None,
        }
    }

    fn error(message: impl Into<String>) -> Self {
        Self {
            result: Err(message.into()),
            fallback: None,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }

    /// Wire form handed back to the model
    pub fn to_json(&self) -> Value {
        match &self.result {
            Ok(value) => json!({ "result": value }),
            Err(message) => json!({ "result": Value::Null, "error": message }),
        }
    }

    pub fn error_message(&self) -> Option<String> {
        self.result.as_ref().err().cloned()
    }
}

type DispatchResult = Result<(Value, Option<String>), String>;

fn to_value<T: Serialize>(value: &T) -> Result<Value, String> {
    serde_json::to_value(value).map_err(|e| format!("failed to encode result: {}", e))
}

fn store_error(e: sqlx::Error) -> String {
    format!("history store error: {}", e)
}

// ==================== Registry ====================

pub struct ToolRegistry {
    catalog: Arc<dyn Catalog>,
    semantic: Arc<dyn SemanticRecommender>,
    history: Arc<dyn HistoryStore>,
    tracks: Option<Arc<dyn TrackCatalog>>,
    timeout: Duration,
}

impl ToolRegistry {
    pub fn new(
        catalog: Arc<dyn Catalog>,
        semantic: Arc<dyn SemanticRecommender>,
        history: Arc<dyn HistoryStore>,
        tracks: Option<Arc<dyn TrackCatalog>>,
        timeout: Duration,
    ) -> Self {
        Self {
            catalog,
            semantic,
            history,
            tracks,
            timeout,
        }
    }

    /// Tool schemas advertised to the model
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        let genre_filter = json!({
            "exclude_genres": {
                "type": "array",
                "items": {"type": "string"},
                "description": "Genre names to leave out, e.g. [\"Horror\"]"
            },
            "min_year": {"type": "integer", "description": "Earliest release year"},
            "max_year": {"type": "integer", "description": "Latest release year"}
        });

        let mut recommendation_props = json!({
            "movie_id": {"type": "integer", "description": "TMDB id of the seed movie"}
        });
        if let (Some(props), Some(extra)) = (recommendation_props.as_object_mut(), genre_filter.as_object()) {
            props.extend(extra.clone());
        }
        let mut semantic_props = recommendation_props.clone();
        if let Some(props) = semantic_props.as_object_mut() {
            props.insert(
                "limit".to_string(),
                json!({"type": "integer", "description": "Maximum results (1-10)"}),
            );
        }

        let mut definitions = vec![
            ToolDefinition::function(
                "search_movies",
                "Search TMDB for movies by title. Use this to find a movie's id.",
                json!({
                    "type": "object",
                    "properties": {
                        "query": {"type": "string", "description": "Movie title or keywords"},
                        "year": {"type": "integer", "description": "Release year to narrow the search"}
                    },
                    "required": ["query"]
                }),
            ),
            ToolDefinition::function(
                "get_movie_details",
                "Get runtime, tagline, genres and overview for a movie id.",
                json!({
                    "type": "object",
                    "properties": {
                        "movie_id": {"type": "integer", "description": "TMDB movie id"}
                    },
                    "required": ["movie_id"]
                }),
            ),
            ToolDefinition::function(
                "get_movie_recommendations",
                "Get TMDB's recommendations for a movie, optionally filtered by genre and year.",
                json!({
                    "type": "object",
                    "properties": recommendation_props,
                    "required": ["movie_id"]
                }),
            ),
            ToolDefinition::function(
                "get_semantic_movie_recommendations",
                "Find movies with similar plot, themes and tone to a seed movie. Preferred for 'movies like X'.",
                json!({
                    "type": "object",
                    "properties": semantic_props,
                    "required": ["movie_id"]
                }),
            ),
            ToolDefinition::function(
                "save_watched_movie",
                "Record that the user has watched a movie.",
                json!({
                    "type": "object",
                    "properties": {
                        "movie_id": {"type": "integer", "description": "TMDB movie id"},
                        "title": {"type": "string", "description": "Movie title"}
                    },
                    "required": ["movie_id", "title"]
                }),
            ),
            ToolDefinition::function(
                "get_watch_history",
                "List the movies the user has watched, most recent first.",
                json!({
                    "type": "object",
                    "properties": {
                        "limit": {"type": "integer", "description": "Maximum entries (default 10)"}
                    }
                }),
            ),
            ToolDefinition::function(
                "rate_movie",
                "Give a movie a thumbs up (1) or down (-1). Rating it the same way twice clears the rating.",
                json!({
                    "type": "object",
                    "properties": {
                        "movie_id": {"type": "integer", "description": "TMDB movie id"},
                        "rating": {"type": "integer", "enum": [1, -1]}
                    },
                    "required": ["movie_id", "rating"]
                }),
            ),
            ToolDefinition::function(
                "get_feedback",
                "List the user's thumbs up/down ratings.",
                json!({"type": "object", "properties": {}}),
            ),
        ];

        if self.tracks.is_some() {
            definitions.push(ToolDefinition::function(
                "search_tracks",
                "Search Spotify for songs, e.g. soundtracks or music matching a movie's mood.",
                json!({
                    "type": "object",
                    "properties": {
                        "query": {"type": "string", "description": "Track, artist or soundtrack name"},
                        "limit": {"type": "integer", "description": "Maximum results (1-10)"}
                    },
                    "required": ["query"]
                }),
            ));
        }

        definitions
    }

    /// Run one tool call under the dispatch timeout
    #[instrument(skip(self, args), fields(tool = %name))]
    pub async fn execute(&self, name: &str, args: &Value, user_id: &str) -> ToolOutcome {
        let tool = match Tool::parse(name, args, user_id) {
            Ok(tool) => tool,
            Err(e) => {
                debug!(error = %e, "Rejected tool call");
                return ToolOutcome::error(e.to_string());
            }
        };

        if matches!(tool, Tool::SearchTracks(_)) && self.tracks.is_none() {
            return ToolOutcome::error(ToolError::UnknownTool(name.to_string()).to_string());
        }

        match tokio::time::timeout(self.timeout, self.dispatch(tool)).await {
            Ok(Ok((value, fallback))) => ToolOutcome {
                fallback,
                ..ToolOutcome::ok(value)
            },
            Ok(Err(message)) => {
                warn!(error = %message, "Tool failed");
                ToolOutcome::error(message)
            }
            Err(_) => {
                warn!(timeout_secs = self.timeout.as_secs(), "Tool timed out");
                ToolOutcome::error(CatalogError::Timeout.to_string())
            }
        }
    }

    async fn dispatch(&self, tool: Tool) -> DispatchResult {
        match tool {
            Tool::SearchMovies(args) => {
                let year = args.year.and_then(|y| i32::try_from(y).ok());
                let movies = self
                    .catalog
                    .search_movies(&args.query, year)
                    .await
                    .map_err(|e| e.to_string())?;
                let movies: Vec<CandidateMovie> = movies.into_iter().take(SINGLE_SOURCE_LIMIT).collect();
                Ok((to_value(&movies)?, None))
            }
            Tool::GetMovieDetails(args) => {
                let details = self
                    .catalog
                    .movie_details(args.movie_id)
                    .await
                    .map_err(|e| e.to_string())?;
                Ok((to_value(&details)?, None))
            }
            Tool::GetMovieRecommendations(args) => {
                let movies = self
                    .catalog_recommendations(&args)
                    .await
                    .map_err(|e| e.to_string())?;
                Ok((to_value(&movies)?, None))
            }
            Tool::GetSemanticMovieRecommendations(args) => self.semantic_with_fallback(&args).await,
            Tool::SaveWatchedMovie(args) => {
                let watched = self
                    .history
                    .save_watched(&args.user_id, args.movie_id, &args.title)
                    .await
                    .map_err(store_error)?;
                Ok((
                    json!({"saved": true, "movie_id": watched.movie_id, "title": watched.title}),
                    None,
                ))
            }
            Tool::GetWatchHistory(args) => {
                let limit = args.limit.unwrap_or(DEFAULT_HISTORY_LIMIT).clamp(1, MAX_HISTORY_LIMIT);
                let watched = self
                    .history
                    .get_history(&args.user_id, limit)
                    .await
                    .map_err(store_error)?;
                let entries: Vec<Value> = watched
                    .iter()
                    .map(|w| json!({"movie_id": w.movie_id, "title": w.title, "watched_at": w.updated_at}))
                    .collect();
                Ok((Value::Array(entries), None))
            }
            Tool::RateMovie(args) => {
                let rating = self
                    .history
                    .toggle_feedback(&args.user_id, ItemType::Movie, &args.movie_id.to_string(), args.rating)
                    .await
                    .map_err(store_error)?;
                Ok((json!({"movie_id": args.movie_id, "rating": rating}), None))
            }
            Tool::GetFeedback(args) => {
                let feedback = self.history.get_feedback(&args.user_id).await.map_err(store_error)?;
                let entries: Vec<Value> = feedback
                    .iter()
                    .map(|f| json!({"item_type": f.item_type, "item_id": f.item_id, "rating": f.rating}))
                    .collect();
                Ok((Value::Array(entries), None))
            }
            Tool::SearchTracks(args) => {
                let Some(tracks) = &self.tracks else {
                    return Err(ToolError::UnknownTool("search_tracks".to_string()).to_string());
                };
                let limit = args
                    .limit
                    .map_or(DEFAULT_TRACK_LIMIT, |l| l.clamp(1, i64::from(MAX_TRACK_LIMIT)) as u32);
                let found = tracks
                    .search_tracks(&args.query, limit)
                    .await
                    .map_err(|e| e.to_string())?;
                Ok((to_value(&found)?, None))
            }
        }
    }

    async fn catalog_recommendations(&self, args: &RecommendationArgs) -> Result<Vec<CandidateMovie>, CatalogError> {
        let movies = self.catalog.recommendations(args.movie_id).await?;
        spawn_indexing(self.semantic.clone(), movies.clone());
        let filtered = args.filters().apply(dedupe_by_id(movies));
        Ok(filtered
            .into_iter()
            .filter(|m| m.id != args.movie_id)
            .take(args.limit())
            .collect())
    }

    /// Semantic neighbors, or catalog recommendations when the semantic
    /// attempt fails, finds nothing or outlives its share of the budget
    ///
    /// The semantic attempt covers the seed details lookup too; the catalog
    /// fallback only needs the movie id.
    async fn semantic_with_fallback(&self, args: &RecommendationArgs) -> DispatchResult {
        let budget = self.timeout.mul_f64(SEMANTIC_BUDGET_FRACTION);
        let reason = match tokio::time::timeout(budget, self.semantic_attempt(args)).await {
            Ok(Ok(movies)) if !movies.is_empty() => return Ok((to_value(&movies)?, None)),
            Ok(Ok(_)) => "semantic recommender returned no results".to_string(),
            Ok(Err(reason)) => reason,
            Err(_) => format!("semantic recommender timed out after {}ms", budget.as_millis()),
        };

        warn!(movie_id = args.movie_id, reason = %reason, "Falling back to catalog recommendations");
        let movies = self
            .catalog_recommendations(args)
            .await
            .map_err(|e| e.to_string())?;
        Ok((to_value(&movies)?, Some(reason)))
    }

    async fn semantic_attempt(&self, args: &RecommendationArgs) -> Result<Vec<CandidateMovie>, String> {
        let seed = self
            .catalog
            .movie_details(args.movie_id)
            .await
            .map_err(|e| format!("seed details unavailable: {}", e))?;

        self.semantic
            .recommend(&seed, &args.filters(), args.limit())
            .await
            .map_err(|e| format!("semantic recommender failed: {}", e))
    }
}
