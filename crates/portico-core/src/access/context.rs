//! Organization context resolution.
//!
//! Decides which organization a request acts on and which role the caller holds there.
//! Candidate ids come from four places; the first non-empty one wins:
//! explicit override, `organizationId` query parameter, `x-organization-id` header,
//! `orgId` cookie. Membership is re-read from the store on every call.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;

use crate::error::AppError;
use crate::models::{OrganizationId, Role, SessionUser};
use crate::stores::MembershipStore;

pub const ORGANIZATION_QUERY_PARAM: &str = "organizationId";
pub const ORGANIZATION_HEADER: &str = "x-organization-id";
pub const ORGANIZATION_COOKIE: &str = "orgId";

/// Where the organization id of a resolved context came from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ContextSource {
    Explicit,
    Query,
    Header,
    Cookie,
}

/// Raw organization id candidates pulled from a request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrganizationHints {
    pub explicit: Option<String>,
    pub query: Option<String>,
    pub header: Option<String>,
    pub cookie: Option<String>,
}

impl OrganizationHints {
    pub fn with_explicit(mut self, organization_id: impl Into<String>) -> Self {
        self.explicit = Some(organization_id.into());
        self
    }

    /// First non-blank candidate in precedence order.
    pub fn pick(&self) -> Option<(OrganizationId, ContextSource)> {
        [
            (&self.explicit, ContextSource::Explicit),
            (&self.query, ContextSource::Query),
            (&self.header, ContextSource::Header),
            (&self.cookie, ContextSource::Cookie),
        ]
        .into_iter()
        .find_map(|(value, source)| {
            value
                .as_deref()
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(|v| (OrganizationId::from(v), source))
        })
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq, ToSchema)]
pub struct ResolvedContext {
    pub organization_id: OrganizationId,
    /// None only for anonymous access to an org-scoped public surface.
    pub role: Option<Role>,
    pub source: ContextSource,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ResolveOptions {
    pub require_membership: bool,
}

impl ResolveOptions {
    pub fn members_only() -> Self {
        Self {
            require_membership: true,
        }
    }

    pub fn allow_anonymous() -> Self {
        Self {
            require_membership: false,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ContextError {
    #[error("Organization id is required")]
    MissingOrganization,
    #[error("Access to organization denied")]
    AccessDenied,
    #[error(transparent)]
    Store(#[from] AppError),
}

impl From<ContextError> for AppError {
    fn from(err: ContextError) -> Self {
        match err {
            ContextError::MissingOrganization => AppError::MissingOrganization,
            // Same message whether or not the organization exists.
            ContextError::AccessDenied => {
                AppError::Forbidden("You do not have access to this organization".to_string())
            }
            ContextError::Store(err) => err,
        }
    }
}

#[derive(Clone)]
pub struct ContextResolver {
    memberships: Arc<dyn MembershipStore>,
}

impl ContextResolver {
    pub fn new(memberships: Arc<dyn MembershipStore>) -> Self {
        Self { memberships }
    }

    #[tracing::instrument(skip(self, hints, identity), fields(user_id = identity.map(|u| u.id.as_str())))]
    pub async fn resolve(
        &self,
        hints: &OrganizationHints,
        identity: Option<&SessionUser>,
        options: ResolveOptions,
    ) -> Result<ResolvedContext, ContextError> {
        let (organization_id, source) = hints.pick().ok_or(ContextError::MissingOrganization)?;

        let role = match identity {
            Some(user) => {
                let membership = self
                    .memberships
                    .get_membership(&user.id, &organization_id)
                    .await?;
                match membership {
                    Some(membership) => Some(membership.role),
                    None => {
                        tracing::debug!(
                            organization_id = %organization_id,
                            "No membership for authenticated user"
                        );
                        return Err(ContextError::AccessDenied);
                    }
                }
            }
            None if options.require_membership => return Err(ContextError::AccessDenied),
            None => None,
        };

        Ok(ResolvedContext {
            organization_id,
            role,
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorMetadata;
    use crate::test_helpers::{session_user, InMemoryStore};

    fn hints(
        explicit: Option<&str>,
        query: Option<&str>,
        header: Option<&str>,
        cookie: Option<&str>,
    ) -> OrganizationHints {
        OrganizationHints {
            explicit: explicit.map(String::from),
            query: query.map(String::from),
            header: header.map(String::from),
            cookie: cookie.map(String::from),
        }
    }

    fn resolver_with_members(members: &[(&str, &str, Role)]) -> ContextResolver {
        let store = Arc::new(InMemoryStore::new());
        for (org, user, role) in members {
            store.add_member(org, user, *role);
        }
        ContextResolver::new(store)
    }

    #[test]
    fn test_pick_precedence() {
        let all = hints(
            Some("org_explicit"),
            Some("org_query"),
            Some("org_header"),
            Some("org_cookie"),
        );
        assert_eq!(
            all.pick(),
            Some((OrganizationId::from("org_explicit"), ContextSource::Explicit))
        );

        let no_explicit = hints(None, Some("org_query"), Some("org_header"), Some("org_cookie"));
        assert_eq!(
            no_explicit.pick(),
            Some((OrganizationId::from("org_query"), ContextSource::Query))
        );

        let header_cookie = hints(None, None, Some("org_header"), Some("org_cookie"));
        assert_eq!(header_cookie.pick().map(|(_, s)| s), Some(ContextSource::Header));

        let cookie_only = hints(None, None, None, Some("org_cookie"));
        assert_eq!(cookie_only.pick().map(|(_, s)| s), Some(ContextSource::Cookie));
    }

    #[test]
    fn test_pick_skips_blank_values() {
        let blanks = hints(Some(""), Some("   "), None, Some("org_cookie"));
        assert_eq!(
            blanks.pick(),
            Some((OrganizationId::from("org_cookie"), ContextSource::Cookie))
        );
        assert_eq!(hints(None, Some(""), None, None).pick(), None);
    }

    #[tokio::test]
    async fn test_query_wins_for_member() {
        let resolver = resolver_with_members(&[("org_query", "user_1", Role::Admin)]);
        let user = session_user("user_1", "a@example.com");
        let ctx = resolver
            .resolve(
                &hints(None, Some("org_query"), Some("org_header"), Some("org_cookie")),
                Some(&user),
                ResolveOptions::members_only(),
            )
            .await
            .unwrap();
        assert_eq!(ctx.organization_id, OrganizationId::from("org_query"));
        assert_eq!(ctx.role, Some(Role::Admin));
        assert_eq!(ctx.source, ContextSource::Query);
    }

    #[tokio::test]
    async fn test_developer_via_cookie() {
        let resolver = resolver_with_members(&[("org_1", "user_dev", Role::Developer)]);
        let user = session_user("user_dev", "dev@example.com");
        let ctx = resolver
            .resolve(
                &hints(None, None, None, Some("org_1")),
                Some(&user),
                ResolveOptions::members_only(),
            )
            .await
            .unwrap();
        assert_eq!(
            ctx,
            ResolvedContext {
                organization_id: OrganizationId::from("org_1"),
                role: Some(Role::Developer),
                source: ContextSource::Cookie,
            }
        );
    }

    #[tokio::test]
    async fn test_missing_organization() {
        let resolver = resolver_with_members(&[]);
        let user = session_user("user_1", "a@example.com");
        let err = resolver
            .resolve(&OrganizationHints::default(), Some(&user), ResolveOptions::members_only())
            .await
            .unwrap_err();
        assert!(matches!(err, ContextError::MissingOrganization));
        assert_eq!(AppError::from(err).error_code(), "MISSING_ORG_ID");
    }

    #[tokio::test]
    async fn test_identity_without_membership_is_denied_even_when_anonymous_allowed() {
        let resolver = resolver_with_members(&[("org_1", "someone_else", Role::Owner)]);
        let user = session_user("user_1", "a@example.com");
        for options in [ResolveOptions::members_only(), ResolveOptions::allow_anonymous()] {
            let err = resolver
                .resolve(&hints(None, None, Some("org_1"), None), Some(&user), options)
                .await
                .unwrap_err();
            assert!(matches!(err, ContextError::AccessDenied));
        }
    }

    #[tokio::test]
    async fn test_denial_does_not_reveal_existence() {
        let resolver = resolver_with_members(&[("org_real", "someone_else", Role::Owner)]);
        let user = session_user("user_1", "a@example.com");
        let existing: AppError = resolver
            .resolve(
                &hints(Some("org_real"), None, None, None),
                Some(&user),
                ResolveOptions::members_only(),
            )
            .await
            .unwrap_err()
            .into();
        let missing: AppError = resolver
            .resolve(
                &hints(Some("org_ghost"), None, None, None),
                Some(&user),
                ResolveOptions::members_only(),
            )
            .await
            .unwrap_err()
            .into();
        assert_eq!(existing.http_status_code(), 403);
        assert_eq!(existing.client_message(), missing.client_message());
        assert_eq!(existing.error_code(), missing.error_code());
    }

    #[tokio::test]
    async fn test_anonymous_access() {
        let resolver = resolver_with_members(&[]);
        let org = hints(None, Some("org_1"), None, None);

        let err = resolver
            .resolve(&org, None, ResolveOptions::members_only())
            .await
            .unwrap_err();
        assert!(matches!(err, ContextError::AccessDenied));

        let ctx = resolver
            .resolve(&org, None, ResolveOptions::allow_anonymous())
            .await
            .unwrap();
        assert_eq!(ctx.role, None);
        assert_eq!(ctx.source, ContextSource::Query);
    }
}
