//! Health checks for the database and Ollama

use std::time::{Duration, Instant};

use marquee_ollama_client::OllamaClient;
use serde::Serialize;
use sqlx::PgPool;

/// Status of an individual service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceStatus {
    Healthy,
    /// Reachable but missing something it needs (e.g. a model not pulled)
    Degraded,
    Unhealthy,
}

/// Result of a single service health check
#[derive(Debug, Clone, Serialize)]
pub struct ServiceHealth {
    pub name: &'static str,
    pub status: ServiceStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_time_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ServiceHealth {
    pub fn healthy(name: &'static str, response_time: Duration, details: Option<serde_json::Value>) -> Self {
        Self {
            name,
            status: ServiceStatus::Healthy,
            response_time_ms: Some(response_time.as_millis() as u64),
            error: None,
            details,
        }
    }

    pub fn unhealthy(name: &'static str, error: impl Into<String>, response_time: Duration) -> Self {
        Self {
            name,
            status: ServiceStatus::Unhealthy,
            response_time_ms: Some(response_time.as_millis() as u64),
            error: Some(error.into()),
            details: None,
        }
    }
}

/// Aggregated health check response
#[derive(Debug, Clone, Serialize)]
pub struct HealthCheckResponse {
    /// Unhealthy if any service is unhealthy; degraded services still serve
    pub status: ServiceStatus,
    pub services: Vec<ServiceHealth>,
    pub total_time_ms: u64,
    pub version: &'static str,
}

impl HealthCheckResponse {
    pub fn new(services: Vec<ServiceHealth>, total_time: Duration) -> Self {
        let status = if services.iter().any(|s| s.status == ServiceStatus::Unhealthy) {
            ServiceStatus::Unhealthy
        } else if services.iter().any(|s| s.status == ServiceStatus::Degraded) {
            ServiceStatus::Degraded
        } else {
            ServiceStatus::Healthy
        };

        Self {
            status,
            services,
            total_time_ms: total_time.as_millis() as u64,
            version: env!("CARGO_PKG_VERSION"),
        }
    }

    pub fn is_ready(&self) -> bool {
        self.status != ServiceStatus::Unhealthy
    }
}

pub struct HealthService {
    pool: PgPool,
    ollama: OllamaClient,
}

impl HealthService {
    pub fn new(pool: PgPool, ollama: OllamaClient) -> Self {
        Self { pool, ollama }
    }

    /// Database round trip plus the size of the embedding index
    pub async fn check_database(&self) -> ServiceHealth {
        let start = Instant::now();

        if let Err(e) = sqlx::query_scalar::<_, i32>("SELECT 1").fetch_one(&self.pool).await {
            return ServiceHealth::unhealthy("database", format!("Query failed: {}", e), start.elapsed());
        }

        let indexed = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM movie_embeddings")
            .fetch_one(&self.pool)
            .await
            .ok();

        ServiceHealth::healthy(
            "database",
            start.elapsed(),
            indexed.map(|count| serde_json::json!({ "indexed_movies": count })),
        )
    }

    /// Ollama reachability and presence of the chat and embedding models
    pub async fn check_ollama(&self) -> ServiceHealth {
        let start = Instant::now();
        let config = self.ollama.config();

        let models = match self.ollama.list_models().await {
            Ok(models) => models,
            Err(e) => return ServiceHealth::unhealthy("ollama", e.to_string(), start.elapsed()),
        };

        let is_available =
            |wanted: &str| models.iter().any(|m| m == wanted || m.starts_with(&format!("{}:", wanted)));
        let missing: Vec<&str> = [config.model.as_str(), config.embedding_model.as_str()]
            .into_iter()
            .filter(|m| !is_available(*m))
            .collect();

        let details = serde_json::json!({
            "chat_model": config.model,
            "embedding_model": config.embedding_model,
            "available_models": models.len(),
        });

        let mut health = ServiceHealth::healthy("ollama", start.elapsed(), Some(details));
        if !missing.is_empty() {
            health.status = ServiceStatus::Degraded;
            health.error = Some(format!("Models not pulled: {}", missing.join(", ")));
        }
        health
    }

    pub async fn check_all(&self) -> HealthCheckResponse {
        let start = Instant::now();
        let (database, ollama) = tokio::join!(self.check_database(), self.check_ollama());
        HealthCheckResponse::new(vec![database, ollama], start.elapsed())
    }
}
