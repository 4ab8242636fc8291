//! API-key authentication for the public API.

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Response},
};
use portico_core::access::api_key::credential_from_headers;
use portico_core::access::{ApiKeyAuthError, ApiKeyPrincipal};
use std::sync::Arc;

use crate::constants::X_API_KEY_HEADER;
use crate::error::HttpAppError;
use crate::middleware::audit::{self, AuthMethod};
use crate::middleware::rate_limit::{client_ip_key, limit_exceeded_response, WINDOW};
use crate::state::AppState;
use crate::utils::ip_extraction::request_client_ip;

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|h| h.to_str().ok())
}

/// Authenticate the request by API key and store the [`ApiKeyPrincipal`] in extensions.
///
/// Session cookies are ignored here: the public API is bound to the key's organization only.
///
/// Every failed attempt counts against the client's `ip:<addr>` bucket. Once that bucket
/// is exhausted the client gets 429 before any key is looked at, valid or not.
pub async fn api_key_auth_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Response {
    let limits = &state.rate_limit;
    let client_ip = request_client_ip(
        request.headers(),
        request.extensions(),
        limits.trusted_proxy_count,
    );
    let ip_key = client_ip_key(client_ip);
    let ip_limit = limits.ip_limit_per_minute;

    if let Err(reset_in) = limits.store.check(&ip_key, ip_limit).await {
        return limit_exceeded_response(
            &ip_key,
            ip_limit,
            reset_in,
            client_ip,
            request.uri().path(),
        );
    }

    let credential = credential_from_headers(
        header_str(request.headers(), X_API_KEY_HEADER),
        header_str(request.headers(), header::AUTHORIZATION.as_str()),
    );

    match state.api_keys.authenticate(credential.as_deref()).await {
        Ok(principal) => {
            audit::log_authentication_attempt(
                AuthMethod::ApiKey,
                Some(&principal.organization_id),
                None,
                Some(&principal.api_key_id),
                client_ip.map(|ip| ip.to_string()),
                None,
            );
            request.extensions_mut().insert(principal);
            next.run(request).await
        }
        Err(e) => {
            audit::log_authentication_attempt(
                AuthMethod::ApiKey,
                None,
                None,
                None,
                client_ip.map(|ip| ip.to_string()),
                Some(e.code()),
            );
            if let Err(reset_in) = limits.store.hit(&ip_key, ip_limit, WINDOW).await {
                return limit_exceeded_response(
                    &ip_key,
                    ip_limit,
                    reset_in,
                    client_ip,
                    request.uri().path(),
                );
            }
            HttpAppError::from(e).into_response()
        }
    }
}

/// Principal established by [`api_key_auth_middleware`].
#[derive(Debug, Clone)]
pub struct ApiKeyAuth(pub ApiKeyPrincipal);

impl<S> FromRequestParts<S> for ApiKeyAuth
where
    S: Send + Sync,
{
    type Rejection = HttpAppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<ApiKeyPrincipal>()
            .cloned()
            .map(ApiKeyAuth)
            .ok_or_else(|| ApiKeyAuthError::MissingApiKey.into())
    }
}
