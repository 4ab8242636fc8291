use async_trait::async_trait;
use portico_core::models::{Membership, OrganizationId, OrganizationSummary, UserId};
use portico_core::{AppError, MembershipStore};
use sqlx::{PgPool, Postgres};

#[derive(Clone)]
pub struct MembershipRepository {
    pool: PgPool,
}

impl MembershipRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MembershipStore for MembershipRepository {
    #[tracing::instrument(skip(self), fields(db.table = "memberships", db.operation = "select"))]
    async fn list_organizations_for_user(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<OrganizationSummary>, AppError> {
        let organizations = sqlx::query_as::<Postgres, OrganizationSummary>(
            r#"
            SELECT o.id, o.name, o.slug, m.role
            FROM memberships m
            JOIN organizations o ON o.id = m.organization_id
            WHERE m.user_id = $1
            ORDER BY o.name ASC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to list organizations for user");
            AppError::Database(e)
        })?;

        Ok(organizations)
    }

    #[tracing::instrument(skip(self), fields(db.table = "memberships", db.operation = "select"))]
    async fn get_membership(
        &self,
        user_id: &UserId,
        organization_id: &OrganizationId,
    ) -> Result<Option<Membership>, AppError> {
        let membership = sqlx::query_as::<Postgres, Membership>(
            r#"
            SELECT id, organization_id, user_id, role, created_at
            FROM memberships
            WHERE user_id = $1 AND organization_id = $2
            "#,
        )
        .bind(user_id)
        .bind(organization_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to get membership");
            AppError::Database(e)
        })?;

        Ok(membership)
    }

    #[tracing::instrument(skip(self), fields(db.table = "memberships", db.operation = "select"))]
    async fn list_members(
        &self,
        organization_id: &OrganizationId,
    ) -> Result<Vec<Membership>, AppError> {
        let members = sqlx::query_as::<Postgres, Membership>(
            r#"
            SELECT id, organization_id, user_id, role, created_at
            FROM memberships
            WHERE organization_id = $1
            ORDER BY created_at ASC
            "#,
        )
        .bind(organization_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(members)
    }
}
