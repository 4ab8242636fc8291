//! Service and repository initialization

use anyhow::Result;
use portico_core::{Config, EmailSender, NoOpEmailSender};
use portico_db::{
    ApiKeyRepository, InvitationRepository, MembershipRepository, OrganizationRepository,
};
use portico_infra::InMemoryRateLimitStore;
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;

use crate::auth::JwtSessionProvider;
use crate::services::SmtpEmailSender;
use crate::state::{AppState, Stores};

const RATE_LIMIT_CLEANUP_INTERVAL: Duration = Duration::from_secs(300);

/// Initialize repositories, services and shared state
pub fn initialize_services(config: &Config, pool: PgPool) -> Result<Arc<AppState>> {
    let stores = Stores {
        memberships: Arc::new(MembershipRepository::new(pool.clone())),
        organizations: Arc::new(OrganizationRepository::new(pool.clone())),
        invitations: Arc::new(InvitationRepository::new(
            pool.clone(),
            config.invitation_redeem_timeout(),
        )),
        api_keys: Arc::new(ApiKeyRepository::new(pool.clone())),
    };

    let mailer: Arc<dyn EmailSender> = match SmtpEmailSender::from_config(config)? {
        Some(smtp) => {
            tracing::info!(host = ?config.smtp_host(), "SMTP email delivery enabled");
            Arc::new(smtp)
        }
        None => {
            tracing::info!("Email delivery disabled; invitation emails are only logged");
            Arc::new(NoOpEmailSender)
        }
    };

    let sessions = Arc::new(JwtSessionProvider::new(
        config.jwt_secret(),
        config.session_cookie_name(),
    ));

    let rate_limit_store = setup_rate_limit_store(config);

    let state = AppState::new(
        config.clone(),
        stores,
        sessions,
        mailer,
        rate_limit_store,
        Some(pool),
    );

    tracing::info!("Services initialized");
    Ok(Arc::new(state))
}

/// Sharded in-memory counters with a periodic sweep of expired windows
fn setup_rate_limit_store(config: &Config) -> Arc<InMemoryRateLimitStore> {
    let store = Arc::new(InMemoryRateLimitStore::new(config.rate_limiter_shard_count()));

    let store_for_cleanup = store.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(RATE_LIMIT_CLEANUP_INTERVAL);
        loop {
            interval.tick().await;
            store_for_cleanup.cleanup_expired().await;
        }
    });

    tracing::info!(
        rate_limit_per_minute = config.http_rate_limit_per_minute(),
        org_rate_limit_per_minute = config.http_org_rate_limit_per_minute(),
        shard_count = config.rate_limiter_shard_count(),
        "HTTP rate limiting enabled"
    );
    store
}
