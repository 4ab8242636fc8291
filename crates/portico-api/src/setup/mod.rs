//! Application setup and initialization

pub mod database;
pub mod routes;
pub mod server;
pub mod services;

use crate::state::AppState;
use anyhow::{Context, Result};
use portico_core::Config;
use std::sync::Arc;

/// Initialize the entire application
pub async fn initialize_app(config: Config) -> Result<(Arc<AppState>, axum::Router)> {
    // Fail fast on misconfiguration
    config.validate().context("Configuration validation failed")?;

    portico_infra::init_telemetry(config.environment())
        .map_err(|e| anyhow::anyhow!("Failed to initialize telemetry: {}", e))?;

    tracing::info!(
        environment = %config.environment(),
        "Configuration loaded and validated successfully"
    );

    let pool = database::setup_database(&config).await?;
    let state = services::initialize_services(&config, pool)?;
    let router = routes::setup_routes(&config, state.clone())?;

    Ok((state, router))
}
