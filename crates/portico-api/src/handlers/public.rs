//! Public API reached with an API key instead of a session.

use axum::{response::IntoResponse, Json};
use portico_core::models::{ApiKeyId, OrganizationId};
use serde::Serialize;
use utoipa::ToSchema;

use crate::auth::ApiKeyAuth;

#[derive(Debug, Serialize, ToSchema)]
pub struct WhoAmIResponse {
    pub organization_id: OrganizationId,
    pub api_key_id: ApiKeyId,
}

/// Identify the organization bound to the presented API key
#[utoipa::path(
    get,
    path = "/api/public/v1/whoami",
    responses(
        (status = 200, description = "API key is valid", body = WhoAmIResponse),
        (status = 401, description = "Missing, unknown, disabled or expired API key"),
        (status = 429, description = "Organization rate limit exceeded")
    ),
    security(("api_key" = [])),
    tag = "public"
)]
pub async fn whoami(ApiKeyAuth(principal): ApiKeyAuth) -> impl IntoResponse {
    Json(WhoAmIResponse {
        organization_id: principal.organization_id,
        api_key_id: principal.api_key_id,
    })
}
