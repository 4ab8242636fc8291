use async_trait::async_trait;
use chrono::{DateTime, Utc};
use portico_core::models::{Invitation, Membership, OrganizationId, UserId};
use portico_core::{AppError, InvitationStore, RedeemOutcome};
use sqlx::{PgPool, Postgres};
use std::time::Duration;

use crate::db::transaction::TransactionGuard;

const INVITATION_COLUMNS: &str =
    "id, organization_id, email, role, token, invited_by, expires_at, accepted_at, created_at";

#[derive(Clone)]
pub struct InvitationRepository {
    pool: PgPool,
    redeem_timeout: Duration,
}

impl InvitationRepository {
    /// `redeem_timeout` bounds every statement of the redemption transaction.
    pub fn new(pool: PgPool, redeem_timeout: Duration) -> Self {
        Self {
            pool,
            redeem_timeout,
        }
    }
}

#[async_trait]
impl InvitationStore for InvitationRepository {
    #[tracing::instrument(skip(self, invitation), fields(db.table = "invitations", db.operation = "insert", db.record_id = %invitation.id))]
    async fn insert_invitation(&self, invitation: &Invitation) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO invitations (
                id, organization_id, email, role, token, invited_by, expires_at, accepted_at, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(&invitation.id)
        .bind(&invitation.organization_id)
        .bind(&invitation.email)
        .bind(invitation.role)
        .bind(&invitation.token)
        .bind(&invitation.invited_by)
        .bind(invitation.expires_at)
        .bind(invitation.accepted_at)
        .bind(invitation.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to insert invitation");
            AppError::Database(e)
        })?;

        Ok(())
    }

    #[tracing::instrument(skip(self, token), fields(db.table = "invitations", db.operation = "select"))]
    async fn find_by_token(&self, token: &str) -> Result<Option<Invitation>, AppError> {
        let invitation = sqlx::query_as::<Postgres, Invitation>(&format!(
            "SELECT {} FROM invitations WHERE token = $1",
            INVITATION_COLUMNS
        ))
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;

        Ok(invitation)
    }

    #[tracing::instrument(skip(self), fields(db.table = "invitations", db.operation = "select"))]
    async fn list_pending(
        &self,
        organization_id: &OrganizationId,
        now: DateTime<Utc>,
    ) -> Result<Vec<Invitation>, AppError> {
        let invitations = sqlx::query_as::<Postgres, Invitation>(&format!(
            r#"
            SELECT {} FROM invitations
            WHERE organization_id = $1 AND accepted_at IS NULL AND expires_at > $2
            ORDER BY created_at DESC
            "#,
            INVITATION_COLUMNS
        ))
        .bind(organization_id)
        .bind(now)
        .fetch_all(&self.pool)
        .await?;

        Ok(invitations)
    }

    /// The conditional update on `accepted_at IS NULL` decides the winner when two
    /// redemptions race; the loser updates zero rows and writes nothing.
    #[tracing::instrument(skip(self, invitation), fields(db.table = "invitations", db.operation = "update", db.record_id = %invitation.id))]
    async fn redeem(
        &self,
        invitation: &Invitation,
        user_id: &UserId,
        now: DateTime<Utc>,
    ) -> Result<RedeemOutcome, AppError> {
        let mut tx = TransactionGuard::begin_with_timeout(&self.pool, self.redeem_timeout).await?;

        let claimed = sqlx::query(
            r#"
            UPDATE invitations
            SET accepted_at = $2
            WHERE id = $1 AND accepted_at IS NULL
            "#,
        )
        .bind(&invitation.id)
        .bind(now)
        .execute(&mut **tx)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to claim invitation");
            AppError::Database(e)
        })?;

        if claimed.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(RedeemOutcome::AlreadyAccepted);
        }

        let membership = Membership::new(
            invitation.organization_id.clone(),
            user_id.clone(),
            invitation.role,
            now,
        );
        let inserted = sqlx::query(
            r#"
            INSERT INTO memberships (id, organization_id, user_id, role, created_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (organization_id, user_id) DO NOTHING
            "#,
        )
        .bind(&membership.id)
        .bind(&membership.organization_id)
        .bind(&membership.user_id)
        .bind(membership.role)
        .bind(membership.created_at)
        .execute(&mut **tx)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to insert membership");
            AppError::Database(e)
        })?;

        if inserted.rows_affected() == 0 {
            // Leaves the invitation pending.
            tx.rollback().await?;
            return Ok(RedeemOutcome::AlreadyMember);
        }

        tx.commit().await?;
        Ok(RedeemOutcome::Redeemed(membership))
    }
}
