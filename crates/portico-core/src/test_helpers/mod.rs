//! Test helpers
//!
//! In-memory stores and fixtures for unit tests and HTTP tests. No database needed.

mod in_memory;

pub use in_memory::{InMemoryStore, RecordingEmailSender};

use crate::models::{SessionUser, UserId};

/// Session identity with the given id and email.
pub fn session_user(id: &str, email: &str) -> SessionUser {
    SessionUser {
        id: UserId::from(id),
        email: email.to_string(),
        name: None,
        global_role: None,
    }
}
