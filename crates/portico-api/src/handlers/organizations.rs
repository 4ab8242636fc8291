//! Organization creation, switching and membership listing.

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json},
};
use portico_core::access::context::ORGANIZATION_COOKIE;
use portico_core::models::{
    Membership, NewOrganization, Organization, OrganizationId, OrganizationSummary, Role,
};
use portico_core::AppError;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;

use crate::auth::{CurrentUser, OrganizationContext, RequestHints};
use crate::error::{HttpAppError, ValidatedJson};
use crate::middleware::audit;
use crate::state::AppState;
use crate::utils::cookies::http_only_cookie;

#[derive(Debug, Serialize, ToSchema)]
pub struct CreateOrganizationResponse {
    pub organization: Organization,
    pub role: Role,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SelectOrganizationRequest {
    pub organization_id: OrganizationId,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SelectOrganizationResponse {
    pub organization_id: OrganizationId,
    pub role: Role,
}

/// List organizations the current user belongs to
#[utoipa::path(
    get,
    path = "/api/v1/me/organizations",
    responses(
        (status = 200, description = "Organizations with the caller's role", body = Vec<OrganizationSummary>),
        (status = 401, description = "Not signed in")
    ),
    tag = "organizations"
)]
#[tracing::instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn list_my_organizations(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
) -> Result<impl IntoResponse, HttpAppError> {
    let organizations = state.organizations.list_for_user(&user).await?;
    Ok(Json(organizations))
}

/// Create an organization owned by the current user
#[utoipa::path(
    post,
    path = "/api/v1/organizations",
    request_body = NewOrganization,
    responses(
        (status = 201, description = "Organization created", body = CreateOrganizationResponse),
        (status = 400, description = "Invalid name or slug"),
        (status = 401, description = "Not signed in"),
        (status = 409, description = "Slug already taken")
    ),
    tag = "organizations"
)]
#[tracing::instrument(skip(state, user, request), fields(user_id = %user.id))]
pub async fn create_organization(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    ValidatedJson(request): ValidatedJson<NewOrganization>,
) -> Result<impl IntoResponse, HttpAppError> {
    let (organization, owner) = state.organizations.create(&user, request).await?;
    audit::log_organization_created(&organization.id, &user.id);

    Ok((
        StatusCode::CREATED,
        Json(CreateOrganizationResponse {
            organization,
            role: owner.role,
        }),
    ))
}

/// Switch the active organization (sets the `orgId` cookie)
#[utoipa::path(
    post,
    path = "/api/v1/organizations/select",
    request_body = SelectOrganizationRequest,
    responses(
        (status = 200, description = "Organization selected", body = SelectOrganizationResponse),
        (status = 401, description = "Not signed in"),
        (status = 403, description = "Not a member of this organization")
    ),
    tag = "organizations"
)]
#[tracing::instrument(skip(state, user, request), fields(user_id = %user.id))]
pub async fn select_organization(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    ValidatedJson(request): ValidatedJson<SelectOrganizationRequest>,
) -> Result<impl IntoResponse, HttpAppError> {
    let membership = state
        .organizations
        .select(&user, &request.organization_id)
        .await
        .inspect_err(|e| {
            if matches!(e, AppError::Forbidden(_)) {
                audit::log_permission_denied(
                    Some(&request.organization_id),
                    Some(&user.id),
                    None,
                    "ORGANIZATION_ACCESS_DENIED",
                );
            }
        })?;

    let cookie = http_only_cookie(
        ORGANIZATION_COOKIE,
        membership.organization_id.as_str(),
        state.config.is_production(),
    )
    .ok_or_else(|| {
        AppError::InvalidInput("organization_id is not a valid cookie value".to_string())
    })?;

    Ok((
        [(header::SET_COOKIE, cookie)],
        Json(SelectOrganizationResponse {
            organization_id: membership.organization_id,
            role: membership.role,
        }),
    ))
}

/// List members of an organization
#[utoipa::path(
    get,
    path = "/api/v1/organizations/{organization_id}/members",
    params(
        ("organization_id" = String, Path, description = "Organization ID")
    ),
    responses(
        (status = 200, description = "Members of the organization", body = Vec<Membership>),
        (status = 401, description = "Not signed in"),
        (status = 403, description = "Not a member or missing VIEW_MEMBERS")
    ),
    tag = "organizations"
)]
#[tracing::instrument(skip(state, user, hints))]
pub async fn list_members(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    RequestHints(hints): RequestHints,
    Path(organization_id): Path<String>,
) -> Result<impl IntoResponse, HttpAppError> {
    let ctx =
        OrganizationContext::resolve(&state, user, &hints.with_explicit(organization_id)).await?;
    let members = state
        .organizations
        .list_members(&ctx.context)
        .await
        .map_err(|e| ctx.audit_denial(e))?;
    Ok(Json(members))
}
