use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::{OrganizationId, Role};

/// Organization (tenant) entity.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Organization {
    pub id: OrganizationId,
    pub name: String,
    /// Unique URL slug of the public portal.
    pub slug: String,
    pub description: Option<String>,
    /// Unique custom domain, when the portal is served from one.
    pub custom_domain: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// An organization together with the caller's role in it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct OrganizationSummary {
    pub id: OrganizationId,
    pub name: String,
    pub slug: String,
    pub role: Role,
}

/// Input for creating an organization.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct NewOrganization {
    #[schema(example = "Acme")]
    pub name: String,
    #[schema(example = "acme")]
    pub slug: String,
    pub description: Option<String>,
}

pub const MIN_SLUG_LENGTH: usize = 3;
pub const MAX_SLUG_LENGTH: usize = 48;
pub const MAX_ORGANIZATION_NAME_LENGTH: usize = 100;

/// Validate a portal slug: lowercase ascii alphanumerics separated by single hyphens.
pub fn validate_slug(slug: &str) -> Result<(), String> {
    if slug.len() < MIN_SLUG_LENGTH || slug.len() > MAX_SLUG_LENGTH {
        return Err(format!(
            "slug must be between {} and {} characters",
            MIN_SLUG_LENGTH, MAX_SLUG_LENGTH
        ));
    }
    if slug.starts_with('-') || slug.ends_with('-') || slug.contains("--") {
        return Err("slug cannot start or end with a hyphen or contain consecutive hyphens".into());
    }
    if !slug
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
    {
        return Err("slug may only contain lowercase letters, digits and hyphens".into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_slug_accepts_simple_slugs() {
        assert!(validate_slug("acme").is_ok());
        assert!(validate_slug("acme-feedback-2").is_ok());
    }

    #[test]
    fn test_validate_slug_rejects_bad_shapes() {
        assert!(validate_slug("ab").is_err());
        assert!(validate_slug(&"a".repeat(49)).is_err());
        assert!(validate_slug("-acme").is_err());
        assert!(validate_slug("acme-").is_err());
        assert!(validate_slug("ac--me").is_err());
        assert!(validate_slug("Acme").is_err());
        assert!(validate_slug("acme_co").is_err());
    }
}
