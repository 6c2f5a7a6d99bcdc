//! HTTP route handlers for the Marquee API
//!
//! - Chat, history and feedback endpoints (nested under `/api`)
//! - Health check and status endpoints

pub mod chat;
pub mod health;

pub use chat::{chat_router, ChatState};
pub use health::{health_router, HealthState};

use axum::Router;

/// Full router without the tower layers added by the binary
pub fn app_router(chat_state: ChatState, health_state: HealthState) -> Router {
    Router::new()
        .nest("/api", chat_router(chat_state))
        .nest("/health", health_router(health_state))
}
