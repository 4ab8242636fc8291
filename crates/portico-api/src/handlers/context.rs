//! Organization context lookups for the dashboard and the public portal.

use axum::{extract::State, response::IntoResponse, Json};
use portico_core::access::{ContextError, ResolveOptions, ResolvedContext};
use portico_core::models::Organization;
use portico_core::AppError;
use serde::Serialize;
use std::sync::Arc;
use utoipa::ToSchema;

use crate::auth::{MaybeUser, OrganizationContext, RequestHints};
use crate::error::HttpAppError;
use crate::state::AppState;

#[derive(Debug, Serialize, ToSchema)]
pub struct PortalContextResponse {
    pub organization: Organization,
    pub context: ResolvedContext,
}

/// Resolve the active organization and the caller's role in it
#[utoipa::path(
    get,
    path = "/api/v1/context",
    params(
        ("organizationId" = Option<String>, Query, description = "Organization override")
    ),
    responses(
        (status = 200, description = "Resolved organization context", body = ResolvedContext),
        (status = 400, description = "No organization id supplied"),
        (status = 401, description = "Not signed in"),
        (status = 403, description = "Not a member of the organization")
    ),
    tag = "context"
)]
pub async fn get_context(ctx: OrganizationContext) -> impl IntoResponse {
    Json(ctx.context)
}

/// Resolve the organization of a public portal page
///
/// Works without a session. A signed-in member also gets their role; anyone else
/// gets a context without one.
#[utoipa::path(
    get,
    path = "/api/v1/portal/context",
    params(
        ("organizationId" = Option<String>, Query, description = "Organization of the portal")
    ),
    responses(
        (status = 200, description = "Portal organization", body = PortalContextResponse),
        (status = 400, description = "No organization id supplied"),
        (status = 404, description = "Organization not found")
    ),
    tag = "context"
)]
#[tracing::instrument(skip(state, user, hints))]
pub async fn get_portal_context(
    State(state): State<Arc<AppState>>,
    MaybeUser(user): MaybeUser,
    RequestHints(hints): RequestHints,
) -> Result<impl IntoResponse, HttpAppError> {
    let resolver = &state.context_resolver;
    let context = match resolver
        .resolve(&hints, user.as_ref(), ResolveOptions::allow_anonymous())
        .await
    {
        // Signed-in visitors outside the organization see the portal anonymously.
        Err(ContextError::AccessDenied) if user.is_some() => {
            resolver
                .resolve(&hints, None, ResolveOptions::allow_anonymous())
                .await?
        }
        result => result?,
    };

    let organization = state
        .organizations
        .get(&context.organization_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Organization not found".to_string()))?;

    Ok(Json(PortalContextResponse {
        organization,
        context,
    }))
}
