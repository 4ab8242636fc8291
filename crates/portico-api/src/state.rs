//! Application state shared by handlers and middleware.

use portico_core::access::{
    ApiKeyService, ContextResolver, InvitationPolicy, InvitationService, OrganizationService,
};
use portico_core::{
    ApiKeyStore, Config, EmailSender, InvitationStore, MembershipStore, OrganizationStore,
};
use portico_infra::RateLimitStore;
use sqlx::PgPool;
use std::sync::Arc;

use crate::auth::session::SessionProvider;

/// Persistence backends behind the core store traits.
#[derive(Clone)]
pub struct Stores {
    pub memberships: Arc<dyn MembershipStore>,
    pub organizations: Arc<dyn OrganizationStore>,
    pub invitations: Arc<dyn InvitationStore>,
    pub api_keys: Arc<dyn ApiKeyStore>,
}

impl Stores {
    /// Use one backend for every store.
    pub fn shared<S>(store: Arc<S>) -> Self
    where
        S: MembershipStore + OrganizationStore + InvitationStore + ApiKeyStore + 'static,
    {
        Self {
            memberships: store.clone(),
            organizations: store.clone(),
            invitations: store.clone(),
            api_keys: store,
        }
    }
}

/// Rate-limit settings applied by the HTTP middleware.
#[derive(Clone)]
pub struct RateLimitState {
    pub store: Arc<dyn RateLimitStore>,
    pub ip_limit_per_minute: u32,
    pub org_limit_per_minute: u32,
    pub trusted_proxy_count: usize,
}

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub sessions: Arc<dyn SessionProvider>,
    pub context_resolver: ContextResolver,
    pub organizations: OrganizationService,
    pub invitations: InvitationService,
    pub api_keys: ApiKeyService,
    pub rate_limit: RateLimitState,
    /// None when running against non-database stores.
    pub db_pool: Option<PgPool>,
}

impl AppState {
    pub fn new(
        config: Config,
        stores: Stores,
        sessions: Arc<dyn SessionProvider>,
        mailer: Arc<dyn EmailSender>,
        rate_limit_store: Arc<dyn RateLimitStore>,
        db_pool: Option<PgPool>,
    ) -> Self {
        let policy = InvitationPolicy {
            ttl: config.invitation_ttl(),
            accept_url_base: config.app_base_url().to_string(),
        };
        let rate_limit = RateLimitState {
            store: rate_limit_store,
            ip_limit_per_minute: config.http_rate_limit_per_minute(),
            org_limit_per_minute: config.http_org_rate_limit_per_minute(),
            trusted_proxy_count: config.trusted_proxy_count(),
        };

        Self {
            context_resolver: ContextResolver::new(stores.memberships.clone()),
            organizations: OrganizationService::new(
                stores.organizations.clone(),
                stores.memberships.clone(),
            ),
            invitations: InvitationService::new(stores.invitations.clone(), mailer, policy),
            api_keys: ApiKeyService::new(stores.api_keys.clone()),
            sessions,
            rate_limit,
            db_pool,
            config,
        }
    }
}
