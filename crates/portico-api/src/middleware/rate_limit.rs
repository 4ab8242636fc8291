//! HTTP rate limiting
//!
//! Requests carrying an authenticated API key are counted per organization
//! (`org:<id>`); everything else per client IP (`ip:<addr>`). Failed API-key
//! authentications are charged to the `ip:<addr>` bucket by the auth middleware.
//! The counter store is pluggable; the in-memory one only sees the traffic of its
//! own process.

use axum::{
    extract::{Request, State},
    http::HeaderValue,
    middleware::Next,
    response::{IntoResponse, Response},
};
use portico_core::access::ApiKeyPrincipal;
use portico_core::AppError;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use crate::constants::{X_RATELIMIT_LIMIT, X_RATELIMIT_REMAINING};
use crate::error::HttpAppError;
use crate::middleware::audit;
use crate::state::AppState;
use crate::utils::ip_extraction::request_client_ip;

pub(crate) const WINDOW: Duration = Duration::from_secs(60);

fn set_header(response: &mut Response, name: &'static str, value: u32) {
    if let Ok(value) = HeaderValue::from_str(&value.to_string()) {
        response.headers_mut().insert(name, value);
    }
}

/// Bucket key for traffic without an authenticated principal.
pub(crate) fn client_ip_key(client_ip: Option<IpAddr>) -> String {
    format!(
        "ip:{}",
        client_ip.map_or_else(|| "unknown".to_string(), |ip| ip.to_string())
    )
}

/// 429 response for an exhausted bucket, audited.
pub(crate) fn limit_exceeded_response(
    key: &str,
    limit: u32,
    reset_in: Duration,
    client_ip: Option<IpAddr>,
    path: &str,
) -> Response {
    let retry_after_secs = reset_in.as_secs().max(1);
    tracing::warn!(key = %key, limit, retry_after_secs, "Rate limit exceeded");
    audit::log_rate_limit_exceeded(
        key,
        client_ip.map(|ip| ip.to_string()),
        path.to_string(),
        limit,
    );

    let mut response = HttpAppError(AppError::RateLimited { retry_after_secs }).into_response();
    set_header(&mut response, X_RATELIMIT_LIMIT, limit);
    set_header(&mut response, X_RATELIMIT_REMAINING, 0);
    response
}

pub async fn rate_limit_middleware(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    let settings = &state.rate_limit;
    let client_ip = request_client_ip(
        request.headers(),
        request.extensions(),
        settings.trusted_proxy_count,
    );

    let (key, limit) = match request.extensions().get::<ApiKeyPrincipal>() {
        Some(principal) => (
            format!("org:{}", principal.organization_id),
            settings.org_limit_per_minute,
        ),
        None => (client_ip_key(client_ip), settings.ip_limit_per_minute),
    };

    match settings.store.hit(&key, limit, WINDOW).await {
        Ok(remaining) => {
            let mut response = next.run(request).await;
            set_header(&mut response, X_RATELIMIT_LIMIT, limit);
            set_header(&mut response, X_RATELIMIT_REMAINING, remaining);
            response
        }
        Err(reset_in) => {
            limit_exceeded_response(&key, limit, reset_in, client_ip, request.uri().path())
        }
    }
}
