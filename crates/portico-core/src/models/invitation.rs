use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::{InvitationId, OrganizationId, Role, UserId};

/// Single-use, time-bounded offer to join an organization with a given role.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Invitation {
    pub id: InvitationId,
    pub organization_id: OrganizationId,
    pub email: String,
    pub role: Role,
    /// Redemption secret. Unique across all invitations.
    pub token: String,
    pub invited_by: UserId,
    pub expires_at: DateTime<Utc>,
    pub accepted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Lifecycle state of an invitation at a given instant.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum InvitationStatus {
    Pending,
    Accepted,
    Expired,
}

impl Invitation {
    /// An invitation is expired once `now` reaches `expires_at` (inclusive).
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    pub fn status_at(&self, now: DateTime<Utc>) -> InvitationStatus {
        if self.accepted_at.is_some() {
            InvitationStatus::Accepted
        } else if self.is_expired_at(now) {
            InvitationStatus::Expired
        } else {
            InvitationStatus::Pending
        }
    }
}

/// Invitation as shown to organization admins (no token).
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct InvitationResponse {
    pub id: InvitationId,
    pub organization_id: OrganizationId,
    pub email: String,
    pub role: Role,
    pub status: InvitationStatus,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl InvitationResponse {
    pub fn from_invitation(invitation: Invitation, now: DateTime<Utc>) -> Self {
        let status = invitation.status_at(now);
        Self {
            id: invitation.id,
            organization_id: invitation.organization_id,
            email: invitation.email,
            role: invitation.role,
            status,
            expires_at: invitation.expires_at,
            created_at: invitation.created_at,
        }
    }
}
