//! Invitation creation, listing and redemption.

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json},
};
use chrono::Utc;
use portico_core::access::context::ORGANIZATION_COOKIE;
use portico_core::models::{InvitationResponse, Membership, Role};
use serde::Deserialize;
use std::sync::Arc;
use utoipa::ToSchema;

use crate::auth::{CurrentUser, MaybeUser, OrganizationContext, RequestHints};
use crate::error::{HttpAppError, ValidatedJson};
use crate::middleware::audit;
use crate::state::AppState;
use crate::utils::cookies::http_only_cookie;

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateInvitationRequest {
    #[schema(example = "new.member@example.com")]
    pub email: String,
    pub role: Role,
}

/// Invite someone to an organization
#[utoipa::path(
    post,
    path = "/api/v1/organizations/{organization_id}/invitations",
    params(
        ("organization_id" = String, Path, description = "Organization ID")
    ),
    request_body = CreateInvitationRequest,
    responses(
        (status = 201, description = "Invitation created and email queued", body = InvitationResponse),
        (status = 400, description = "Invalid email"),
        (status = 401, description = "Not signed in"),
        (status = 403, description = "Missing MANAGE_MEMBERS or role above the inviter's own")
    ),
    tag = "invitations"
)]
#[tracing::instrument(skip(state, user, hints, request))]
pub async fn create_invitation(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    RequestHints(hints): RequestHints,
    Path(organization_id): Path<String>,
    ValidatedJson(request): ValidatedJson<CreateInvitationRequest>,
) -> Result<impl IntoResponse, HttpAppError> {
    let ctx =
        OrganizationContext::resolve(&state, user, &hints.with_explicit(organization_id)).await?;
    let invitation = state
        .invitations
        .create(&ctx.context, &ctx.user, &request.email, request.role)
        .await
        .map_err(|e| ctx.audit_denial(e))?;

    audit::log_invitation_created(
        &invitation.organization_id,
        &invitation.id,
        &ctx.user.id,
        invitation.role,
    );

    Ok((
        StatusCode::CREATED,
        Json(InvitationResponse::from_invitation(invitation, Utc::now())),
    ))
}

/// List pending invitations of an organization
#[utoipa::path(
    get,
    path = "/api/v1/organizations/{organization_id}/invitations",
    params(
        ("organization_id" = String, Path, description = "Organization ID")
    ),
    responses(
        (status = 200, description = "Pending invitations", body = Vec<InvitationResponse>),
        (status = 401, description = "Not signed in"),
        (status = 403, description = "Missing MANAGE_MEMBERS")
    ),
    tag = "invitations"
)]
#[tracing::instrument(skip(state, user, hints))]
pub async fn list_invitations(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    RequestHints(hints): RequestHints,
    Path(organization_id): Path<String>,
) -> Result<impl IntoResponse, HttpAppError> {
    let ctx =
        OrganizationContext::resolve(&state, user, &hints.with_explicit(organization_id)).await?;
    let invitations = state
        .invitations
        .list_pending(&ctx.context)
        .await
        .map_err(|e| ctx.audit_denial(e))?;

    let now = Utc::now();
    let response: Vec<InvitationResponse> = invitations
        .into_iter()
        .map(|invitation| InvitationResponse::from_invitation(invitation, now))
        .collect();
    Ok(Json(response))
}

/// Accept an invitation and join its organization
///
/// On success the joined organization becomes the active one.
#[utoipa::path(
    post,
    path = "/api/v1/invitations/{token}/accept",
    params(
        ("token" = String, Path, description = "Invitation token from the email link")
    ),
    responses(
        (status = 200, description = "Invitation accepted", body = Membership),
        (status = 401, description = "Not signed in"),
        (status = 404, description = "Unknown invitation"),
        (status = 409, description = "Already accepted, or already a member"),
        (status = 410, description = "Invitation expired")
    ),
    tag = "invitations"
)]
#[tracing::instrument(skip(state, user, token))]
pub async fn accept_invitation(
    State(state): State<Arc<AppState>>,
    MaybeUser(user): MaybeUser,
    Path(token): Path<String>,
) -> Result<impl IntoResponse, HttpAppError> {
    let membership = state.invitations.redeem(user.as_ref(), &token).await?;
    audit::log_invitation_redeemed(
        &membership.organization_id,
        &membership.user_id,
        membership.role,
    );

    let cookie = http_only_cookie(
        ORGANIZATION_COOKIE,
        membership.organization_id.as_str(),
        state.config.is_production(),
    );

    let mut response = Json(membership).into_response();
    if let Some(cookie) = cookie {
        response.headers_mut().insert(header::SET_COOKIE, cookie);
    }
    Ok(response)
}
