use std::net::SocketAddr;
use std::sync::Arc;

use axum::http::{header, Method};
use marquee_api::config::Config;
use marquee_api::repositories::{PgChatStore, PgHistoryStore};
use marquee_api::routes::{app_router, ChatState, HealthState};
use marquee_api::services::catalog::TrackCatalog;
use marquee_api::services::{ChatService, HealthService, PgSemanticRecommender, RecommendationMerger, ToolRegistry};
use marquee_ollama_client::OllamaClient;
use marquee_spotify_client::{SpotifyClient, TokenCache};
use marquee_tmdb_client::TmdbClient;
use sqlx::postgres::PgPoolOptions;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Build the CORS layer based on configuration.
///
/// `*` is permissive (rejected at config load in production). Otherwise only
/// the listed origins are allowed.
fn build_cors_layer(config: &Config) -> CorsLayer {
    if config.allows_any_origin() {
        tracing::warn!("Using permissive CORS. Set CORS_ALLOWED_ORIGINS for production-like behavior.");
        return CorsLayer::permissive();
    }

    let allowed_origins: Vec<_> = config
        .cors_allowed_origins
        .iter()
        .filter_map(|origin| {
            origin.parse().ok().or_else(|| {
                tracing::warn!("Invalid CORS origin '{}', skipping", origin);
                None
            })
        })
        .collect();

    if allowed_origins.is_empty() {
        tracing::error!("No valid CORS origins configured, CORS requests will be rejected");
        return CorsLayer::new();
    }

    tracing::info!(
        "CORS configured with {} allowed origin(s): {:?}",
        allowed_origins.len(),
        config.cors_allowed_origins
    );
    CorsLayer::new()
        .allow_origin(allowed_origins)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT, header::ORIGIN])
        .max_age(std::time::Duration::from_secs(3600))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "marquee_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load environment variables
    dotenvy::dotenv().ok();

    let config = Config::from_env()?;

    tracing::info!(
        environment = %config.environment(),
        "Starting Marquee API server on port {}",
        config.port
    );

    // Initialize database pool
    tracing::info!("Connecting to database...");
    let pool = PgPoolOptions::new()
        .min_connections(config.database().min_connections)
        .max_connections(config.database().max_connections)
        .acquire_timeout(std::time::Duration::from_secs(config.database().connect_timeout_secs))
        .connect(&config.database().url)
        .await?;
    tracing::info!("Database connection established");

    tracing::info!("Running database migrations...");
    sqlx::migrate!("./migrations").run(&pool).await?;
    tracing::info!("Migrations completed successfully");

    // External collaborators
    let ollama = OllamaClient::new(config.ollama())?;
    let tmdb = Arc::new(TmdbClient::new(config.tmdb())?);
    let tracks: Option<Arc<dyn TrackCatalog>> = match config.spotify() {
        Some(spotify) => {
            tracing::info!("Spotify track search enabled");
            Some(Arc::new(SpotifyClient::new(spotify, TokenCache::new())?) as Arc<dyn TrackCatalog>)
        }
        None => {
            tracing::info!("Spotify not configured, search_tracks disabled");
            None
        }
    };

    let chat_store = Arc::new(PgChatStore::new(pool.clone()));
    let history_store = Arc::new(PgHistoryStore::new(pool.clone()));
    let semantic = Arc::new(PgSemanticRecommender::new(pool.clone(), ollama.clone()));

    let tools = ToolRegistry::new(
        tmdb.clone(),
        semantic.clone(),
        history_store.clone(),
        tracks,
        config.tool_timeout(),
    );
    let merger = RecommendationMerger::new(tmdb, semantic, history_store.clone(), config.sticky_genres.clone());
    let chat_service = ChatService::new(chat_store, history_store, ollama.clone(), tools, merger);

    let chat_state = ChatState::new(chat_service);
    let health_state = HealthState::new(HealthService::new(pool, ollama));

    let app = app_router(chat_state, health_state)
        .layer(TraceLayer::new_for_http())
        .layer(build_cors_layer(&config));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
