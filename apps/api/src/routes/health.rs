//! Health check HTTP route handlers
//!
//! - `GET /health` - Simple liveness check (returns 200 OK)
//! - `GET /health/live` - Kubernetes-style liveness probe
//! - `GET /health/ready` - Readiness check (database and Ollama)

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use std::sync::Arc;

use crate::services::HealthService;

/// Shared application state for health check handlers
#[derive(Clone)]
pub struct HealthState {
    pub health_service: Arc<HealthService>,
}

impl HealthState {
    pub fn new(health_service: HealthService) -> Self {
        Self {
            health_service: Arc::new(health_service),
        }
    }
}

/// Create health check router
pub fn health_router(state: HealthState) -> Router {
    Router::new()
        .route("/", get(simple_health))
        .route("/live", get(liveness_probe))
        .route("/ready", get(readiness_probe))
        .with_state(state)
}

/// Always OK while the server is accepting requests
async fn simple_health() -> &'static str {
    "OK"
}

/// Liveness probe; never checks external dependencies
async fn liveness_probe() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "alive",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Readiness probe
///
/// # Response
/// - 200 OK when the database answers (Ollama may be degraded)
/// - 503 Service Unavailable otherwise
async fn readiness_probe(State(state): State<HealthState>) -> impl IntoResponse {
    let response = state.health_service.check_all().await;

    let status_code = if response.is_ready() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(response))
}
