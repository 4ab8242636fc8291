use async_trait::async_trait;
use chrono::{DateTime, Utc};
use portico_core::models::{ApiKey, ApiKeyId, OrganizationId};
use portico_core::{ApiKeyStore, AppError};
use sqlx::{PgPool, Postgres};

const API_KEY_COLUMNS: &str =
    "id, organization_id, name, key_hash, key_prefix, disabled, last_used_at, expires_at, created_at";

#[derive(Clone)]
pub struct ApiKeyRepository {
    pool: PgPool,
}

impl ApiKeyRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ApiKeyStore for ApiKeyRepository {
    /// Create a new API key
    #[tracing::instrument(skip(self, api_key), fields(db.table = "api_keys", db.operation = "insert", db.record_id = %api_key.id))]
    async fn insert_api_key(&self, api_key: &ApiKey) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO api_keys (
                id, organization_id, name, key_hash, key_prefix, disabled, expires_at, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(&api_key.id)
        .bind(&api_key.organization_id)
        .bind(&api_key.name)
        .bind(&api_key.key_hash)
        .bind(&api_key.key_prefix)
        .bind(api_key.disabled)
        .bind(api_key.expires_at)
        .bind(api_key.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to create API key");
            AppError::Database(e)
        })?;

        tracing::info!(
            api_key_id = %api_key.id,
            organization_id = %api_key.organization_id,
            name = %api_key.name,
            "API key created"
        );

        Ok(())
    }

    /// Get API key by hash
    #[tracing::instrument(skip(self, key_hash), fields(db.table = "api_keys", db.operation = "select"))]
    async fn find_by_hash(&self, key_hash: &str) -> Result<Option<ApiKey>, AppError> {
        let api_key = sqlx::query_as::<Postgres, ApiKey>(&format!(
            "SELECT {} FROM api_keys WHERE key_hash = $1",
            API_KEY_COLUMNS
        ))
        .bind(key_hash)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to get API key by hash");
            AppError::Database(e)
        })?;

        Ok(api_key)
    }

    /// List API keys for an organization
    #[tracing::instrument(skip(self), fields(db.table = "api_keys", db.operation = "select"))]
    async fn list_by_organization(
        &self,
        organization_id: &OrganizationId,
    ) -> Result<Vec<ApiKey>, AppError> {
        let api_keys = sqlx::query_as::<Postgres, ApiKey>(&format!(
            "SELECT {} FROM api_keys WHERE organization_id = $1 ORDER BY created_at DESC",
            API_KEY_COLUMNS
        ))
        .bind(organization_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, organization_id = %organization_id, "Failed to list API keys");
            AppError::Database(e)
        })?;

        Ok(api_keys)
    }

    #[tracing::instrument(skip(self), fields(db.table = "api_keys", db.operation = "update"))]
    async fn set_disabled(
        &self,
        organization_id: &OrganizationId,
        id: &ApiKeyId,
        disabled: bool,
    ) -> Result<Option<ApiKey>, AppError> {
        let api_key = sqlx::query_as::<Postgres, ApiKey>(&format!(
            r#"
            UPDATE api_keys
            SET disabled = $3
            WHERE id = $1 AND organization_id = $2
            RETURNING {}
            "#,
            API_KEY_COLUMNS
        ))
        .bind(id)
        .bind(organization_id)
        .bind(disabled)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, id = %id, "Failed to update API key");
            AppError::Database(e)
        })?;

        if api_key.is_some() {
            tracing::info!(api_key_id = %id, organization_id = %organization_id, disabled, "API key updated");
        }

        Ok(api_key)
    }

    #[tracing::instrument(skip(self), fields(db.table = "api_keys", db.operation = "delete"))]
    async fn delete(
        &self,
        organization_id: &OrganizationId,
        id: &ApiKeyId,
    ) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM api_keys WHERE id = $1 AND organization_id = $2")
            .bind(id)
            .bind(organization_id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, id = %id, "Failed to delete API key");
                AppError::Database(e)
            })?;

        Ok(result.rows_affected() > 0)
    }

    /// Update last used timestamp
    #[tracing::instrument(skip(self), fields(db.table = "api_keys", db.operation = "update"))]
    async fn touch_last_used(&self, id: &ApiKeyId, now: DateTime<Utc>) -> Result<(), AppError> {
        sqlx::query("UPDATE api_keys SET last_used_at = $2 WHERE id = $1")
            .bind(id)
            .bind(now)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}
