//! Request extractors for session identity and organization context.

use axum::extract::{FromRequestParts, Query};
use axum::http::request::Parts;
use portico_core::access::context::{
    ORGANIZATION_COOKIE, ORGANIZATION_HEADER, ORGANIZATION_QUERY_PARAM,
};
use portico_core::access::{
    AccessDenial, ContextError, OrganizationHints, ResolveOptions, ResolvedContext,
};
use portico_core::models::SessionUser;
use portico_core::{AppError, ErrorMetadata};
use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::Arc;

use crate::error::HttpAppError;
use crate::middleware::audit::{self, AuthMethod};
use crate::state::AppState;
use crate::utils::cookies::cookie_value;
use crate::utils::ip_extraction::request_client_ip;

/// Session lookup result cached for the rest of the request.
#[derive(Clone)]
struct SessionLookup(Option<SessionUser>);

async fn session_of(parts: &mut Parts, state: &AppState) -> Option<SessionUser> {
    if let Some(SessionLookup(user)) = parts.extensions.get::<SessionLookup>() {
        return user.clone();
    }
    let user = state.sessions.get_session(&parts.headers).await;
    parts.extensions.insert(SessionLookup(user.clone()));
    user
}

/// Organization id candidates from the query string, header and cookie.
pub fn hints_from_parts(parts: &Parts) -> OrganizationHints {
    let query = Query::<HashMap<String, String>>::try_from_uri(&parts.uri)
        .ok()
        .and_then(|Query(params)| params.get(ORGANIZATION_QUERY_PARAM).cloned());
    let header = parts
        .headers
        .get(ORGANIZATION_HEADER)
        .and_then(|h| h.to_str().ok())
        .map(String::from);

    OrganizationHints {
        explicit: None,
        query,
        header,
        cookie: cookie_value(&parts.headers, ORGANIZATION_COOKIE),
    }
}

/// Authenticated dashboard user. Rejects with 401 when there is no valid session.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub SessionUser);

impl FromRequestParts<Arc<AppState>> for CurrentUser {
    type Rejection = HttpAppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        match session_of(parts, state).await {
            Some(user) => Ok(CurrentUser(user)),
            None => {
                let client_ip = request_client_ip(
                    &parts.headers,
                    &parts.extensions,
                    state.rate_limit.trusted_proxy_count,
                )
                .map(|ip| ip.to_string());
                audit::log_authentication_attempt(
                    AuthMethod::Session,
                    None,
                    None,
                    None,
                    client_ip,
                    Some("UNAUTHORIZED"),
                );
                Err(AccessDenial::Unauthenticated.into())
            }
        }
    }
}

/// Session user if there is one; never rejects.
#[derive(Debug, Clone)]
pub struct MaybeUser(pub Option<SessionUser>);

impl FromRequestParts<Arc<AppState>> for MaybeUser {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        Ok(MaybeUser(session_of(parts, state).await))
    }
}

/// Organization hints of the request, for handlers that add an explicit override.
#[derive(Debug, Clone)]
pub struct RequestHints(pub OrganizationHints);

impl<S> FromRequestParts<S> for RequestHints
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(RequestHints(hints_from_parts(parts)))
    }
}

/// A signed-in member acting inside one organization.
#[derive(Debug, Clone)]
pub struct OrganizationContext {
    pub user: SessionUser,
    pub context: ResolvedContext,
}

impl OrganizationContext {
    /// Resolve `hints` for `user`, requiring membership.
    pub async fn resolve(
        state: &AppState,
        user: SessionUser,
        hints: &OrganizationHints,
    ) -> Result<Self, HttpAppError> {
        match state
            .context_resolver
            .resolve(hints, Some(&user), ResolveOptions::members_only())
            .await
        {
            Ok(context) => Ok(Self { user, context }),
            Err(ContextError::AccessDenied) => {
                audit::log_permission_denied(
                    hints.pick().map(|(id, _)| id).as_ref(),
                    Some(&user.id),
                    None,
                    "ORGANIZATION_ACCESS_DENIED",
                );
                Err(ContextError::AccessDenied.into())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Pass a service error through, recording permission denials in the audit log.
    pub fn audit_denial(&self, err: AppError) -> HttpAppError {
        if matches!(err, AppError::Forbidden(_) | AppError::Unauthorized(_)) {
            audit::log_permission_denied(
                Some(&self.context.organization_id),
                Some(&self.user.id),
                None,
                err.error_code(),
            );
        }
        HttpAppError(err)
    }
}

impl FromRequestParts<Arc<AppState>> for OrganizationContext {
    type Rejection = HttpAppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let CurrentUser(user) = CurrentUser::from_request_parts(parts, state).await?;
        let hints = hints_from_parts(parts);
        Self::resolve(state, user, &hints).await
    }
}
