//! Portico Database Layer
//!
//! Postgres repositories implementing the store traits from `portico-core`.
//
// Module declarations
pub mod db;

// Re-exports: repositories
pub use db::{
    ApiKeyRepository, InvitationRepository, MembershipRepository, OrganizationRepository,
};

// Re-exports: Transaction utilities
pub use db::transaction::TransactionGuard;

/// Migrations shipped with the workspace, applied at startup.
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("../../migrations");
