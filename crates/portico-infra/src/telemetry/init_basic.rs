use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_FILTER: &str =
    "portico_api=debug,portico_core=debug,portico_db=debug,portico_infra=debug,tower_http=debug";

/// Initialize tracing.
///
/// `RUST_LOG` overrides the default filter. Production emits JSON lines,
/// everything else gets the human-readable formatter.
pub fn init_telemetry(environment: &str) -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_FILTER.into());
    let registry = tracing_subscriber::registry().with(filter);

    if environment == "production" {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_current_span(true))
            .try_init()?;
    } else {
        registry.with(tracing_subscriber::fmt::layer()).try_init()?;
    }

    let host = hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "unknown".to_string());
    tracing::info!(environment = %environment, host = %host, "Tracing initialized");
    Ok(())
}

pub async fn shutdown_telemetry() {
    tracing::debug!("Tracing shutdown");
}
