use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::{MembershipId, OrganizationId, Role, UserId};

/// Membership of one user in one organization.
/// At most one row exists per (organization_id, user_id).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Membership {
    pub id: MembershipId,
    pub organization_id: OrganizationId,
    pub user_id: UserId,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

impl Membership {
    pub fn new(
        organization_id: OrganizationId,
        user_id: UserId,
        role: Role,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: MembershipId::generate(),
            organization_id,
            user_id,
            role,
            created_at: now,
        }
    }
}
