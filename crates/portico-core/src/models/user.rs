use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::UserId;

/// Platform-wide flag set by the auth provider. Distinct from organization roles and
/// never consulted by organization-scoped authorization.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum GlobalRole {
    PlatformAdmin,
}

/// Authenticated identity returned by the session provider.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub struct SessionUser {
    pub id: UserId,
    pub email: String,
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub global_role: Option<GlobalRole>,
}
