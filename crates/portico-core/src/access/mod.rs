//! Organization-scoped access control
//!
//! Request flow: identity (session or API key) -> [`ContextResolver`] or
//! [`ApiKeyService::authenticate`] -> [`require_permission`] -> handler.

pub mod api_key;
pub mod context;
pub mod gate;
pub mod invitation;
pub mod organization;
pub mod permissions;

pub use api_key::{ApiKeyAuthError, ApiKeyPrincipal, ApiKeyService, CreatedApiKey};
pub use context::{
    ContextError, ContextResolver, ContextSource, OrganizationHints, ResolveOptions,
    ResolvedContext,
};
pub use gate::{require_permission, AccessDenial};
pub use invitation::{InvitationError, InvitationPolicy, InvitationService};
pub use organization::OrganizationService;
pub use permissions::{
    can_delete_feedback, can_edit_feedback, can_grant_role, can_submit_on_behalf,
    can_update_feedback_status, grantable_roles, has_all_permissions, has_permission,
    permissions_for, Permission,
};
