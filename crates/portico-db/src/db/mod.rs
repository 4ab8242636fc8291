//! Database repositories for data access layer
//!
//! Repositories live under control/ (organizations, memberships, invitations, API keys).
//! Each one wraps a `PgPool` and implements the matching store trait.
//
// Tenancy and credential repositories
pub mod control;
//
// Transaction utilities
pub mod transaction;

pub use control::{
    ApiKeyRepository, InvitationRepository, MembershipRepository, OrganizationRepository,
};
