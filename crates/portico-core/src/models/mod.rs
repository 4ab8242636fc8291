//! Data models for the application
//!
//! Tenancy, membership, invitation and credential records. Each sub-module represents
//! one entity; identifiers live in `ids`.

mod api_key;
mod ids;
mod invitation;
mod membership;
mod organization;
mod role;
mod user;

// Re-export all models for convenient imports
pub use api_key::*;
pub use ids::*;
pub use invitation::*;
pub use membership::*;
pub use organization::*;
pub use role::*;
pub use user::*;
