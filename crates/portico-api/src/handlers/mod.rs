pub mod api_keys;
pub mod context;
pub mod health;
pub mod invitations;
pub mod organizations;
pub mod public;
