//! Health check endpoint.
//!
//! Reports process liveness and read-through cache counters. No caller
//! identity is required.

use std::sync::atomic::Ordering;

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use serde::{Deserialize, Serialize};

use crate::state::AppState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheHealth {
    pub enabled: bool,
    pub hits: u64,
    pub misses: u64,
    pub errors: u64,
    /// Errors since the previous health check.
    pub recent_errors: u64,
    pub fenced: u64,
    pub hit_rate: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub version: String,
    pub uptime_seconds: u64,
    pub cache: CacheHealth,
}

/// GET /health
///
/// The cache never makes the service unhealthy. Cache errors since the
/// previous check downgrade the report to `degraded`; once the backend
/// recovers the next check is healthy again.
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let stats = state.cache.stats();
    let seen = state.cache_errors_seen.swap(stats.errors, Ordering::SeqCst);
    let recent_errors = stats.errors.saturating_sub(seen);
    let status = if recent_errors > 0 {
        HealthStatus::Degraded
    } else {
        HealthStatus::Healthy
    };

    let response = HealthResponse {
        status,
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.started_at.elapsed().as_secs(),
        cache: CacheHealth {
            enabled: state.cache.config().enabled,
            hit_rate: stats.hit_rate(),
            hits: stats.hits,
            misses: stats.misses,
            errors: stats.errors,
            recent_errors,
            fenced: stats.fenced,
        },
    };
    (StatusCode::OK, Json(response))
}

pub fn create_router() -> Router<AppState> {
    Router::new().route("/", get(health))
}
