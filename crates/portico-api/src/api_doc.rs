//! OpenAPI documentation, served at `/api/openapi.json`.

use utoipa::openapi::security::{ApiKey, ApiKeyValue, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::constants::X_API_KEY_HEADER;
use crate::error;
use crate::handlers;
use portico_core::access::{ContextSource, ResolvedContext};
use portico_core::models;

struct ApiKeySecurity;

impl Modify for ApiKeySecurity {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "api_key",
                SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::new(X_API_KEY_HEADER))),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Portico API",
        version = "0.1.0",
        description = "Multi-tenant organization access: organizations and memberships, role-based permissions, invitations and organization API keys. Dashboard endpoints live under /api/v1/ and use the session; the public API lives under /api/public/v1/ and uses API keys."
    ),
    paths(
        // Health
        handlers::health::health_check,
        handlers::health::liveness_check,
        // Organizations
        handlers::organizations::list_my_organizations,
        handlers::organizations::create_organization,
        handlers::organizations::select_organization,
        handlers::organizations::list_members,
        // Context
        handlers::context::get_context,
        handlers::context::get_portal_context,
        // Invitations
        handlers::invitations::create_invitation,
        handlers::invitations::list_invitations,
        handlers::invitations::accept_invitation,
        // API keys
        handlers::api_keys::create_api_key,
        handlers::api_keys::list_api_keys,
        handlers::api_keys::update_api_key,
        handlers::api_keys::delete_api_key,
        // Public
        handlers::public::whoami,
    ),
    components(
        schemas(
            models::Organization,
            models::OrganizationSummary,
            models::NewOrganization,
            models::Membership,
            models::Role,
            models::InvitationResponse,
            models::InvitationStatus,
            models::CreateApiKeyRequest,
            models::CreateApiKeyResponse,
            models::ApiKeyResponse,
            ResolvedContext,
            ContextSource,
            handlers::organizations::CreateOrganizationResponse,
            handlers::organizations::SelectOrganizationRequest,
            handlers::organizations::SelectOrganizationResponse,
            handlers::context::PortalContextResponse,
            handlers::invitations::CreateInvitationRequest,
            handlers::api_keys::UpdateApiKeyRequest,
            handlers::public::WhoAmIResponse,
            handlers::health::HealthCheckResponse,
            error::ErrorResponse,
        )
    ),
    modifiers(&ApiKeySecurity),
    tags(
        (name = "organizations", description = "Organization creation, switching and membership"),
        (name = "context", description = "Active organization resolution"),
        (name = "invitations", description = "Invite members by email and accept invitations"),
        (name = "api-keys", description = "Organization API key management"),
        (name = "public", description = "API-key authenticated public API"),
        (name = "health", description = "Service health")
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spec_lists_dashboard_and_public_paths() {
        let spec = ApiDoc::openapi();
        let paths = &spec.paths.paths;
        assert!(paths.contains_key("/api/v1/api-keys"));
        assert!(paths.contains_key("/api/v1/invitations/{token}/accept"));
        assert!(paths.contains_key("/api/public/v1/whoami"));

        let components = spec.components.expect("components");
        assert!(components.security_schemes.contains_key("api_key"));
    }
}
