use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::SystemTime;

use crate::catalog::Catalog;
use crate::error::ApiError;
use crate::generator::ActionKind;
use crate::handlers::SharedState;
use crate::metrics::GenerationMetrics;

static START_TIME: std::sync::LazyLock<SystemTime> = std::sync::LazyLock::new(SystemTime::now);

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub timestamp: u64,
    pub version: String,
    pub uptime_seconds: u64,
    pub sessions: usize,
}

impl HealthStatus {
    pub fn healthy(sessions: usize) -> Self {
        let now = SystemTime::now();
        Self {
            status: "healthy".to_string(),
            timestamp: now
                .duration_since(SystemTime::UNIX_EPOCH)
                .unwrap_or_default()
                .as_secs(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            uptime_seconds: now.duration_since(*START_TIME).unwrap_or_default().as_secs(),
            sessions,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MetricsResponse {
    pub global: GenerationMetrics,
    pub by_kind: HashMap<ActionKind, GenerationMetrics>,
}

/// Health check endpoint
pub async fn health_check(State(state): State<SharedState>) -> impl IntoResponse {
    Json(HealthStatus::healthy(state.sessions.len().await))
}

/// Ready once both catalog tables can be loaded
pub async fn readiness_check(State(state): State<SharedState>) -> impl IntoResponse {
    match load_catalog(state.generator.catalog()).await {
        Ok((topics, styles)) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "status": "ready",
                "catalog": "loaded",
                "topics": topics.len(),
                "styles": styles.len(),
            })),
        ),
        Err(err) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({
                "status": "not_ready",
                "catalog": "unavailable",
                "error": err.to_string(),
            })),
        ),
    }
}

async fn load_catalog(catalog: &Catalog) -> Result<(Arc<Vec<String>>, Arc<Vec<String>>), ApiError> {
    Ok((catalog.topics().await?, catalog.styles().await?))
}

/// Generation outcome counters
pub async fn metrics(State(state): State<SharedState>) -> impl IntoResponse {
    let metrics = state.metrics();
    Json(MetricsResponse {
        global: metrics.global().await,
        by_kind: metrics.snapshot().await,
    })
}
