//! API key management handlers
//!
//! Create, list, disable/enable and delete API keys of the organization resolved for the
//! request (`organizationId` query, `x-organization-id` header or `orgId` cookie).

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use portico_core::models::{ApiKeyId, ApiKeyResponse, CreateApiKeyRequest, CreateApiKeyResponse};
use serde::Deserialize;
use std::sync::Arc;
use utoipa::ToSchema;

use crate::auth::OrganizationContext;
use crate::error::{HttpAppError, ValidatedJson};
use crate::middleware::audit;
use crate::state::AppState;

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateApiKeyRequest {
    pub disabled: bool,
}

/// Create a new API key
#[utoipa::path(
    post,
    path = "/api/v1/api-keys",
    request_body = CreateApiKeyRequest,
    responses(
        (status = 201, description = "API key created; the secret is only returned here", body = CreateApiKeyResponse),
        (status = 400, description = "Invalid name or expiry"),
        (status = 403, description = "Missing MANAGE_API_KEYS")
    ),
    tag = "api-keys"
)]
#[tracing::instrument(skip(state, ctx, request), fields(organization_id = %ctx.context.organization_id))]
pub async fn create_api_key(
    State(state): State<Arc<AppState>>,
    ctx: OrganizationContext,
    ValidatedJson(request): ValidatedJson<CreateApiKeyRequest>,
) -> Result<impl IntoResponse, HttpAppError> {
    let created = state
        .api_keys
        .create(&ctx.context, &request.name, request.expires_in_days)
        .await
        .map_err(|e| ctx.audit_denial(e))?;

    let record = created.record;
    audit::log_api_key_created(&record.organization_id, &record.id, &ctx.user.id);

    Ok((
        StatusCode::CREATED,
        Json(CreateApiKeyResponse {
            id: record.id,
            api_key: created.raw_secret,
            name: record.name,
            key_prefix: record.key_prefix,
            expires_at: record.expires_at,
            created_at: record.created_at,
        }),
    ))
}

/// List API keys of the current organization
#[utoipa::path(
    get,
    path = "/api/v1/api-keys",
    responses(
        (status = 200, description = "API keys (prefix only, never the secret)", body = Vec<ApiKeyResponse>),
        (status = 403, description = "Missing MANAGE_API_KEYS")
    ),
    tag = "api-keys"
)]
#[tracing::instrument(skip(state, ctx), fields(organization_id = %ctx.context.organization_id))]
pub async fn list_api_keys(
    State(state): State<Arc<AppState>>,
    ctx: OrganizationContext,
) -> Result<impl IntoResponse, HttpAppError> {
    let api_keys = state
        .api_keys
        .list(&ctx.context)
        .await
        .map_err(|e| ctx.audit_denial(e))?;

    let response: Vec<ApiKeyResponse> = api_keys.into_iter().map(ApiKeyResponse::from).collect();
    Ok(Json(response))
}

/// Disable or re-enable an API key
#[utoipa::path(
    patch,
    path = "/api/v1/api-keys/{id}",
    params(
        ("id" = String, Path, description = "API key ID")
    ),
    request_body = UpdateApiKeyRequest,
    responses(
        (status = 200, description = "API key updated", body = ApiKeyResponse),
        (status = 403, description = "Missing MANAGE_API_KEYS"),
        (status = 404, description = "API key not found")
    ),
    tag = "api-keys"
)]
#[tracing::instrument(skip(state, ctx, request), fields(organization_id = %ctx.context.organization_id))]
pub async fn update_api_key(
    State(state): State<Arc<AppState>>,
    ctx: OrganizationContext,
    Path(id): Path<ApiKeyId>,
    ValidatedJson(request): ValidatedJson<UpdateApiKeyRequest>,
) -> Result<impl IntoResponse, HttpAppError> {
    let api_key = state
        .api_keys
        .set_disabled(&ctx.context, &id, request.disabled)
        .await
        .map_err(|e| ctx.audit_denial(e))?;

    audit::log_api_key_toggled(
        &api_key.organization_id,
        &api_key.id,
        &ctx.user.id,
        api_key.disabled,
    );
    Ok(Json(ApiKeyResponse::from(api_key)))
}

/// Delete an API key
#[utoipa::path(
    delete,
    path = "/api/v1/api-keys/{id}",
    params(
        ("id" = String, Path, description = "API key ID")
    ),
    responses(
        (status = 204, description = "API key deleted"),
        (status = 403, description = "Missing MANAGE_API_KEYS"),
        (status = 404, description = "API key not found")
    ),
    tag = "api-keys"
)]
#[tracing::instrument(skip(state, ctx), fields(organization_id = %ctx.context.organization_id))]
pub async fn delete_api_key(
    State(state): State<Arc<AppState>>,
    ctx: OrganizationContext,
    Path(id): Path<ApiKeyId>,
) -> Result<impl IntoResponse, HttpAppError> {
    state
        .api_keys
        .delete(&ctx.context, &id)
        .await
        .map_err(|e| ctx.audit_denial(e))?;

    audit::log_api_key_deleted(&ctx.context.organization_id, &id, &ctx.user.id);
    Ok(StatusCode::NO_CONTENT)
}
