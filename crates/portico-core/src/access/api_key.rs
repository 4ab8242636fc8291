//! API-key issuing and authentication.
//!
//! Secrets look like `pt_live_<64 hex chars>`. Only the SHA-256 hex digest and the
//! 16-character display prefix are stored; the raw secret is returned once at creation.

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use subtle::ConstantTimeEq;

use crate::access::context::ResolvedContext;
use crate::access::gate::require_permission;
use crate::access::permissions::Permission;
use crate::error::AppError;
use crate::models::{ApiKey, ApiKeyId, OrganizationId};
use crate::stores::ApiKeyStore;

pub const API_KEY_PREFIX: &str = "pt_live_";
pub const KEY_PREFIX_LENGTH: usize = 16;
pub const MAX_API_KEY_NAME_LENGTH: usize = 100;
pub const MAX_EXPIRES_IN_DAYS: i64 = 3650;

const SECRET_BYTES: usize = 32;

/// Generate a fresh secret: `pt_live_` followed by 32 random bytes in hex.
pub fn generate_api_key() -> String {
    let mut rng = rand::rng();
    let random_bytes: [u8; SECRET_BYTES] = rng.random();
    format!("{}{}", API_KEY_PREFIX, hex::encode(random_bytes))
}

/// Deterministic one-way digest used for lookup.
pub fn hash_api_key(key: &str) -> String {
    hex::encode(Sha256::digest(key.as_bytes()))
}

/// Extract the key prefix (first 16 chars) for identification.
pub fn extract_key_prefix(key: &str) -> String {
    key.chars().take(KEY_PREFIX_LENGTH).collect()
}

pub fn looks_like_api_key(value: &str) -> bool {
    value.starts_with(API_KEY_PREFIX)
}

/// Pick the presented secret. `X-API-Key` wins over `Authorization: Bearer`.
pub fn credential_from_headers(
    x_api_key: Option<&str>,
    authorization: Option<&str>,
) -> Option<String> {
    let from_header = x_api_key.map(str::trim).filter(|v| !v.is_empty());
    let from_bearer = authorization
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|v| !v.is_empty());
    from_header.or(from_bearer).map(String::from)
}

fn hashes_match(a: &str, b: &str) -> bool {
    a.len() == b.len() && bool::from(a.as_bytes().ct_eq(b.as_bytes()))
}

#[derive(Debug, thiserror::Error)]
pub enum ApiKeyAuthError {
    #[error("API key is required")]
    MissingApiKey,
    #[error("Invalid API key")]
    InvalidApiKey,
    #[error("API key is disabled")]
    ApiKeyDisabled,
    #[error("API key has expired")]
    ApiKeyExpired,
    #[error(transparent)]
    Store(#[from] AppError),
}

impl ApiKeyAuthError {
    pub fn code(&self) -> &'static str {
        match self {
            ApiKeyAuthError::MissingApiKey => "MISSING_API_KEY",
            ApiKeyAuthError::InvalidApiKey => "INVALID_API_KEY",
            ApiKeyAuthError::ApiKeyDisabled => "API_KEY_DISABLED",
            ApiKeyAuthError::ApiKeyExpired => "API_KEY_EXPIRED",
            ApiKeyAuthError::Store(_) => "INTERNAL_ERROR",
        }
    }
}

impl From<ApiKeyAuthError> for AppError {
    fn from(err: ApiKeyAuthError) -> Self {
        match err {
            ApiKeyAuthError::Store(err) => err,
            other => AppError::InvalidCredentials {
                code: other.code(),
                message: other.to_string(),
            },
        }
    }
}

/// Organization binding established by a valid API key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiKeyPrincipal {
    pub organization_id: OrganizationId,
    pub api_key_id: ApiKeyId,
}

/// Newly issued key. `raw_secret` is not retrievable afterwards.
#[derive(Debug, Clone)]
pub struct CreatedApiKey {
    pub record: ApiKey,
    pub raw_secret: String,
}

#[derive(Clone)]
pub struct ApiKeyService {
    store: Arc<dyn ApiKeyStore>,
}

impl ApiKeyService {
    pub fn new(store: Arc<dyn ApiKeyStore>) -> Self {
        Self { store }
    }

    pub async fn authenticate(
        &self,
        credential: Option<&str>,
    ) -> Result<ApiKeyPrincipal, ApiKeyAuthError> {
        self.authenticate_at(credential, Utc::now()).await
    }

    pub async fn authenticate_at(
        &self,
        credential: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<ApiKeyPrincipal, ApiKeyAuthError> {
        let secret = credential
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or(ApiKeyAuthError::MissingApiKey)?;

        let key_hash = hash_api_key(secret);
        let api_key = self
            .store
            .find_by_hash(&key_hash)
            .await?
            .filter(|key| hashes_match(&key.key_hash, &key_hash))
            .ok_or(ApiKeyAuthError::InvalidApiKey)?;

        if api_key.disabled {
            return Err(ApiKeyAuthError::ApiKeyDisabled);
        }
        if api_key.is_expired_at(now) {
            return Err(ApiKeyAuthError::ApiKeyExpired);
        }

        // Usage recording must never delay or fail authentication.
        let store = self.store.clone();
        let api_key_id = api_key.id.clone();
        tokio::spawn(async move {
            if let Err(e) = store.touch_last_used(&api_key_id, now).await {
                tracing::warn!(error = %e, api_key_id = %api_key_id, "Failed to record API key usage");
            }
        });

        Ok(ApiKeyPrincipal {
            organization_id: api_key.organization_id,
            api_key_id: api_key.id,
        })
    }

    #[tracing::instrument(skip(self, ctx, name), fields(organization_id = %ctx.organization_id))]
    pub async fn create(
        &self,
        ctx: &ResolvedContext,
        name: &str,
        expires_in_days: Option<i64>,
    ) -> Result<CreatedApiKey, AppError> {
        require_permission(Permission::ManageApiKeys, ctx.role)?;

        let name = name.trim();
        if name.is_empty() || name.chars().count() > MAX_API_KEY_NAME_LENGTH {
            return Err(AppError::InvalidInput(format!(
                "name must be between 1 and {} characters",
                MAX_API_KEY_NAME_LENGTH
            )));
        }
        if let Some(days) = expires_in_days {
            if !(1..=MAX_EXPIRES_IN_DAYS).contains(&days) {
                return Err(AppError::InvalidInput(format!(
                    "expires_in_days must be between 1 and {}",
                    MAX_EXPIRES_IN_DAYS
                )));
            }
        }

        let raw_secret = generate_api_key();
        let now = Utc::now();
        let record = ApiKey {
            id: ApiKeyId::generate(),
            organization_id: ctx.organization_id.clone(),
            name: name.to_string(),
            key_hash: hash_api_key(&raw_secret),
            key_prefix: extract_key_prefix(&raw_secret),
            disabled: false,
            last_used_at: None,
            expires_at: expires_in_days.map(|days| now + Duration::days(days)),
            created_at: now,
        };
        self.store.insert_api_key(&record).await?;

        Ok(CreatedApiKey { record, raw_secret })
    }

    pub async fn list(&self, ctx: &ResolvedContext) -> Result<Vec<ApiKey>, AppError> {
        require_permission(Permission::ManageApiKeys, ctx.role)?;
        self.store.list_by_organization(&ctx.organization_id).await
    }

    pub async fn set_disabled(
        &self,
        ctx: &ResolvedContext,
        id: &ApiKeyId,
        disabled: bool,
    ) -> Result<ApiKey, AppError> {
        require_permission(Permission::ManageApiKeys, ctx.role)?;
        self.store
            .set_disabled(&ctx.organization_id, id, disabled)
            .await?
            .ok_or_else(|| AppError::NotFound("API key not found".to_string()))
    }

    pub async fn delete(&self, ctx: &ResolvedContext, id: &ApiKeyId) -> Result<(), AppError> {
        require_permission(Permission::ManageApiKeys, ctx.role)?;
        if self.store.delete(&ctx.organization_id, id).await? {
            Ok(())
        } else {
            Err(AppError::NotFound("API key not found".to_string()))
        }
    }
}
