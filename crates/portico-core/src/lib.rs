//! Portico Core Library
//!
//! Domain models, the role/permission table, organization context resolution,
//! API-key and invitation services, store interfaces, configuration and error types
//! shared by every Portico component.

pub mod access;
pub mod config;
pub mod error;
pub mod models;
pub mod stores;

#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers;

// Re-export commonly used types
pub use config::{BaseConfig, Config, PorticoConfig};
pub use error::{AppError, ErrorMetadata, LogLevel};
pub use stores::{
    ApiKeyStore, CreateOrganizationOutcome, EmailSender, InvitationStore, MembershipStore,
    NoOpEmailSender, OrganizationStore, OutgoingEmail, RedeemOutcome,
};
