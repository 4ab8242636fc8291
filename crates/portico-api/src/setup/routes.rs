//! Route configuration and setup

use axum::{
    extract::Request,
    http::{header, HeaderName, HeaderValue, Method},
    middleware::from_fn_with_state,
    routing::{get, patch, post},
    Json, Router,
};
use portico_core::access::context::ORGANIZATION_HEADER;
use portico_core::Config;
use std::sync::Arc;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;

use crate::api_doc::ApiDoc;
use crate::auth::api_key_auth_middleware;
use crate::constants::{API_PREFIX, PUBLIC_API_PREFIX, X_API_KEY_HEADER};
use crate::handlers;
use crate::middleware::{get_request_id, rate_limit_middleware, request_id_middleware};
use crate::state::AppState;

/// JSON bodies on this API are small; anything larger is refused before parsing.
const MAX_BODY_BYTES: usize = 64 * 1024;
const HTTP_CONCURRENCY_LIMIT: usize = 10_000;

/// Setup all application routes
pub fn setup_routes(config: &Config, state: Arc<AppState>) -> Result<Router<()>, anyhow::Error> {
    let cors = setup_cors(config)?;

    let dashboard = dashboard_routes()
        .layer(from_fn_with_state(state.clone(), rate_limit_middleware));

    // Layers run outermost-first: the key is authenticated before the limiter
    // looks for its organization. Failed authentications are limited per client IP
    // inside the auth layer.
    let public_api = public_api_routes()
        .layer(from_fn_with_state(state.clone(), rate_limit_middleware))
        .layer(from_fn_with_state(state.clone(), api_key_auth_middleware));

    let trace_layer = TraceLayer::new_for_http().make_span_with(|request: &Request| {
        let request_id = get_request_id(request).unwrap_or_default();
        tracing::info_span!(
            "http_request",
            method = %request.method(),
            uri = %request.uri(),
            request_id = %request_id,
        )
    });

    let app = Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/health/live", get(handlers::health::liveness_check))
        .route("/api/openapi.json", get(|| async { Json(ApiDoc::openapi()) }))
        .nest(API_PREFIX, dashboard)
        .nest(PUBLIC_API_PREFIX, public_api)
        .layer(ConcurrencyLimitLayer::new(HTTP_CONCURRENCY_LIMIT))
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(cors)
        .layer(trace_layer)
        .layer(axum::middleware::from_fn(request_id_middleware))
        .with_state(state);

    Ok(app)
}

/// Session-authenticated routes used by the dashboard and the portal.
fn dashboard_routes() -> Router<Arc<AppState>> {
    use handlers::{api_keys, context, invitations, organizations};

    Router::new()
        .route("/me/organizations", get(organizations::list_my_organizations))
        .route("/organizations", post(organizations::create_organization))
        .route("/organizations/select", post(organizations::select_organization))
        .route(
            "/organizations/{organization_id}/members",
            get(organizations::list_members),
        )
        .route(
            "/organizations/{organization_id}/invitations",
            get(invitations::list_invitations).post(invitations::create_invitation),
        )
        .route("/invitations/{token}/accept", post(invitations::accept_invitation))
        .route("/context", get(context::get_context))
        .route("/portal/context", get(context::get_portal_context))
        .route(
            "/api-keys",
            get(api_keys::list_api_keys).post(api_keys::create_api_key),
        )
        .route(
            "/api-keys/{id}",
            patch(api_keys::update_api_key).delete(api_keys::delete_api_key),
        )
}

/// API-key authenticated routes.
fn public_api_routes() -> Router<Arc<AppState>> {
    Router::new().route("/whoami", get(handlers::public::whoami))
}

/// Setup CORS configuration
fn setup_cors(config: &Config) -> Result<CorsLayer, anyhow::Error> {
    let methods = [
        Method::GET,
        Method::POST,
        Method::PATCH,
        Method::DELETE,
        Method::OPTIONS,
    ];
    let headers = [
        header::CONTENT_TYPE,
        header::AUTHORIZATION,
        HeaderName::from_static(X_API_KEY_HEADER),
        HeaderName::from_static(ORGANIZATION_HEADER),
    ];

    let cors = if config.cors_origins().iter().any(|o| o == "*") {
        tracing::warn!("CORS configured to allow all origins - not recommended for production");
        CorsLayer::new()
            .allow_origin(AllowOrigin::any())
            .allow_methods(methods)
            .allow_headers(headers)
    } else {
        let origins = config
            .cors_origins()
            .iter()
            .map(|o| o.parse::<HeaderValue>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| anyhow::anyhow!("Invalid CORS origin: {}", e))?;

        // Cookies carry the session and the active organization.
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(methods)
            .allow_headers(headers)
            .allow_credentials(true)
    };
    Ok(cors)
}
