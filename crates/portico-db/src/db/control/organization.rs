use async_trait::async_trait;
use chrono::{DateTime, Utc};
use portico_core::models::{Membership, NewOrganization, Organization, OrganizationId, Role, UserId};
use portico_core::{AppError, CreateOrganizationOutcome, OrganizationStore};
use sqlx::{PgPool, Postgres};

use crate::db::transaction::TransactionGuard;

#[derive(Clone)]
pub struct OrganizationRepository {
    pool: PgPool,
}

impl OrganizationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OrganizationStore for OrganizationRepository {
    #[tracing::instrument(skip(self, new), fields(db.table = "organizations", db.operation = "insert", slug = %new.slug))]
    async fn create_with_owner(
        &self,
        new: &NewOrganization,
        owner: &UserId,
        now: DateTime<Utc>,
    ) -> Result<CreateOrganizationOutcome, AppError> {
        let mut tx = TransactionGuard::begin(&self.pool).await?;

        let organization = sqlx::query_as::<Postgres, Organization>(
            r#"
            INSERT INTO organizations (id, name, slug, description, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $5)
            ON CONFLICT (slug) DO NOTHING
            RETURNING id, name, slug, description, custom_domain, created_at, updated_at
            "#,
        )
        .bind(OrganizationId::generate())
        .bind(&new.name)
        .bind(&new.slug)
        .bind(&new.description)
        .bind(now)
        .fetch_optional(&mut **tx)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to insert organization");
            AppError::Database(e)
        })?;

        let Some(organization) = organization else {
            tx.rollback().await?;
            return Ok(CreateOrganizationOutcome::SlugTaken);
        };

        let owner = Membership::new(organization.id.clone(), owner.clone(), Role::Owner, now);
        sqlx::query(
            r#"
            INSERT INTO memberships (id, organization_id, user_id, role, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(&owner.id)
        .bind(&owner.organization_id)
        .bind(&owner.user_id)
        .bind(owner.role)
        .bind(owner.created_at)
        .execute(&mut **tx)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to insert owner membership");
            AppError::Database(e)
        })?;

        tx.commit().await?;

        tracing::info!(
            organization_id = %organization.id,
            owner_id = %owner.user_id,
            "Organization created"
        );

        Ok(CreateOrganizationOutcome::Created {
            organization,
            owner,
        })
    }

    #[tracing::instrument(skip(self), fields(db.table = "organizations", db.operation = "select"))]
    async fn get_organization(
        &self,
        organization_id: &OrganizationId,
    ) -> Result<Option<Organization>, AppError> {
        let organization = sqlx::query_as::<Postgres, Organization>(
            r#"
            SELECT id, name, slug, description, custom_domain, created_at, updated_at
            FROM organizations
            WHERE id = $1
            "#,
        )
        .bind(organization_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(organization)
    }
}
