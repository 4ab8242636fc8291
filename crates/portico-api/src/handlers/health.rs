//! Health check handlers and response types.

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;
use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use utoipa::ToSchema;

use crate::state::AppState;

const CHECK_TIMEOUT: Duration = Duration::from_secs(5);

/// Run an async check with timeout; returns "healthy", "timeout", or "{prefix}: {error}".
async fn run_check<F, E>(timeout: Duration, f: F, error_prefix: &str) -> String
where
    F: Future<Output = Result<(), E>>,
    E: Display,
{
    match tokio::time::timeout(timeout, f).await {
        Ok(Ok(())) => "healthy".to_string(),
        Ok(Err(e)) => format!("{}: {}", error_prefix, e),
        Err(_) => "timeout".to_string(),
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthCheckResponse {
    pub status: String,
    pub database: String,
    pub version: String,
}

async fn database_status(state: &AppState) -> String {
    match &state.db_pool {
        Some(pool) => {
            let pool = pool.clone();
            run_check(
                CHECK_TIMEOUT,
                async move { sqlx::query("SELECT 1").execute(&pool).await.map(drop) },
                "unhealthy",
            )
            .await
        }
        None => "not_configured".to_string(),
    }
}

/// Liveness probe - process is running.
#[utoipa::path(
    get,
    path = "/health/live",
    responses((status = 200, description = "Process is alive")),
    tag = "health"
)]
pub async fn liveness_check() -> impl IntoResponse {
    (StatusCode::OK, Json(serde_json::json!({ "status": "alive" })))
}

/// Service health including the database.
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthCheckResponse),
        (status = 503, description = "A dependency is unhealthy", body = HealthCheckResponse)
    ),
    tag = "health"
)]
pub async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let database = database_status(&state).await;
    let healthy = database == "healthy" || database == "not_configured";

    if !healthy {
        tracing::error!(database = %database, "Health check failed");
    }

    let response = HealthCheckResponse {
        status: if healthy { "healthy" } else { "unhealthy" }.to_string(),
        database,
        version: env!("CARGO_PKG_VERSION").to_string(),
    };
    let status_code = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(response))
}
