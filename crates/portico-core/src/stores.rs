//! Persistence and delivery interfaces consumed by the access layer
//!
//! The access services only talk to these traits. `portico-db` implements them on
//! Postgres; `test_helpers` implements them in memory.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::AppError;
use crate::models::{
    ApiKey, ApiKeyId, Invitation, Membership, NewOrganization, Organization, OrganizationId,
    OrganizationSummary, UserId,
};

/// Read access to organization memberships.
#[async_trait]
pub trait MembershipStore: Send + Sync {
    /// Organizations the user belongs to, with the user's role in each.
    async fn list_organizations_for_user(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<OrganizationSummary>, AppError>;

    async fn get_membership(
        &self,
        user_id: &UserId,
        organization_id: &OrganizationId,
    ) -> Result<Option<Membership>, AppError>;

    async fn list_members(
        &self,
        organization_id: &OrganizationId,
    ) -> Result<Vec<Membership>, AppError>;
}

#[derive(Debug)]
pub enum CreateOrganizationOutcome {
    Created {
        organization: Organization,
        owner: Membership,
    },
    SlugTaken,
}

#[async_trait]
pub trait OrganizationStore: Send + Sync {
    /// Insert the organization and the owner membership atomically.
    async fn create_with_owner(
        &self,
        new: &NewOrganization,
        owner: &UserId,
        now: DateTime<Utc>,
    ) -> Result<CreateOrganizationOutcome, AppError>;

    async fn get_organization(
        &self,
        organization_id: &OrganizationId,
    ) -> Result<Option<Organization>, AppError>;
}

/// Result of the atomic redemption step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RedeemOutcome {
    /// acceptedAt was set and the membership inserted.
    Redeemed(Membership),
    /// Another redemption set acceptedAt first. Nothing was written.
    AlreadyAccepted,
    /// The user already belongs to the organization. Nothing was written.
    AlreadyMember,
}

#[async_trait]
pub trait InvitationStore: Send + Sync {
    async fn insert_invitation(&self, invitation: &Invitation) -> Result<(), AppError>;

    async fn find_by_token(&self, token: &str) -> Result<Option<Invitation>, AppError>;

    /// Invitations not yet accepted and not expired at `now`.
    async fn list_pending(
        &self,
        organization_id: &OrganizationId,
        now: DateTime<Utc>,
    ) -> Result<Vec<Invitation>, AppError>;

    /// Set acceptedAt (only if still null) and insert the membership, all or nothing.
    async fn redeem(
        &self,
        invitation: &Invitation,
        user_id: &UserId,
        now: DateTime<Utc>,
    ) -> Result<RedeemOutcome, AppError>;
}

#[async_trait]
pub trait ApiKeyStore: Send + Sync {
    async fn insert_api_key(&self, api_key: &ApiKey) -> Result<(), AppError>;

    async fn find_by_hash(&self, key_hash: &str) -> Result<Option<ApiKey>, AppError>;

    async fn list_by_organization(
        &self,
        organization_id: &OrganizationId,
    ) -> Result<Vec<ApiKey>, AppError>;

    async fn set_disabled(
        &self,
        organization_id: &OrganizationId,
        id: &ApiKeyId,
        disabled: bool,
    ) -> Result<Option<ApiKey>, AppError>;

    /// Returns false when no key with this id exists in the organization.
    async fn delete(&self, organization_id: &OrganizationId, id: &ApiKeyId)
        -> Result<bool, AppError>;

    async fn touch_last_used(&self, id: &ApiKeyId, now: DateTime<Utc>) -> Result<(), AppError>;
}

/// Message handed to an [`EmailSender`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingEmail {
    pub to: String,
    pub subject: String,
    pub html: String,
}

#[async_trait]
pub trait EmailSender: Send + Sync {
    async fn send(&self, email: OutgoingEmail) -> Result<(), String>;
}

/// Sender used when email delivery is disabled.
pub struct NoOpEmailSender;

#[async_trait]
impl EmailSender for NoOpEmailSender {
    async fn send(&self, email: OutgoingEmail) -> Result<(), String> {
        tracing::debug!(to = %email.to, subject = %email.subject, "Email delivery disabled, dropping message");
        Ok(())
    }
}
