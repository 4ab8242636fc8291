//! Organization creation, listing and selection.

use chrono::Utc;
use std::sync::Arc;

use crate::access::context::{ContextError, ResolvedContext};
use crate::access::gate::require_permission;
use crate::access::permissions::Permission;
use crate::error::AppError;
use crate::models::{
    validate_slug, Membership, NewOrganization, Organization, OrganizationId,
    OrganizationSummary, SessionUser, MAX_ORGANIZATION_NAME_LENGTH,
};
use crate::stores::{CreateOrganizationOutcome, MembershipStore, OrganizationStore};

#[derive(Clone)]
pub struct OrganizationService {
    organizations: Arc<dyn OrganizationStore>,
    memberships: Arc<dyn MembershipStore>,
}

impl OrganizationService {
    pub fn new(
        organizations: Arc<dyn OrganizationStore>,
        memberships: Arc<dyn MembershipStore>,
    ) -> Self {
        Self {
            organizations,
            memberships,
        }
    }

    /// Create an organization with `user` as its owner.
    #[tracing::instrument(skip(self, user, new), fields(user_id = %user.id, slug = %new.slug))]
    pub async fn create(
        &self,
        user: &SessionUser,
        new: NewOrganization,
    ) -> Result<(Organization, Membership), AppError> {
        let name = new.name.trim().to_string();
        if name.is_empty() || name.chars().count() > MAX_ORGANIZATION_NAME_LENGTH {
            return Err(AppError::InvalidInput(format!(
                "name must be between 1 and {} characters",
                MAX_ORGANIZATION_NAME_LENGTH
            )));
        }
        let slug = new.slug.trim().to_string();
        validate_slug(&slug).map_err(AppError::InvalidInput)?;

        let new = NewOrganization {
            name,
            slug,
            description: new
                .description
                .map(|d| d.trim().to_string())
                .filter(|d| !d.is_empty()),
        };

        match self
            .organizations
            .create_with_owner(&new, &user.id, Utc::now())
            .await?
        {
            CreateOrganizationOutcome::Created {
                organization,
                owner,
            } => {
                tracing::info!(organization_id = %organization.id, "Organization created");
                Ok((organization, owner))
            }
            CreateOrganizationOutcome::SlugTaken => Err(AppError::conflict(
                "SLUG_TAKEN",
                format!("Slug '{}' is already taken", new.slug),
            )),
        }
    }

    pub async fn list_for_user(
        &self,
        user: &SessionUser,
    ) -> Result<Vec<OrganizationSummary>, AppError> {
        self.memberships.list_organizations_for_user(&user.id).await
    }

    /// Check that `user` may switch to `organization_id`. Denial looks the same whether or
    /// not the organization exists.
    pub async fn select(
        &self,
        user: &SessionUser,
        organization_id: &OrganizationId,
    ) -> Result<Membership, AppError> {
        self.memberships
            .get_membership(&user.id, organization_id)
            .await?
            .ok_or_else(|| ContextError::AccessDenied.into())
    }

    pub async fn list_members(&self, ctx: &ResolvedContext) -> Result<Vec<Membership>, AppError> {
        require_permission(Permission::ViewMembers, ctx.role)?;
        self.memberships.list_members(&ctx.organization_id).await
    }

    pub async fn get(
        &self,
        organization_id: &OrganizationId,
    ) -> Result<Option<Organization>, AppError> {
        self.organizations.get_organization(organization_id).await
    }
}
