//! Portico API Library
//!
//! HTTP handlers, extractors, middleware and application setup for the Portico
//! organization-access service.

mod api_doc;
pub mod constants;
mod handlers;
pub mod middleware;
pub mod services;
pub mod setup;
mod utils;

pub mod auth;
pub mod error;
pub mod state;

pub use api_doc::ApiDoc;
pub use error::{ErrorResponse, HttpAppError};
pub use state::{AppState, RateLimitState, Stores};
