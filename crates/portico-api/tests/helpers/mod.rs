//! Test helpers: build AppState and router backed by in-memory stores.
//!
//! Run from workspace root: `cargo test -p portico-api`. No database needed.

#![allow(dead_code)]

use axum_test::TestServer;
use chrono::Duration;
use portico_api::auth::JwtSessionProvider;
use portico_api::constants;
use portico_api::setup::routes;
use portico_api::state::{AppState, Stores};
use portico_core::models::SessionUser;
use portico_core::test_helpers::{session_user, InMemoryStore, RecordingEmailSender};
use portico_core::Config;
use portico_infra::InMemoryRateLimitStore;
use std::collections::HashMap;
use std::sync::Arc;

pub const TEST_JWT_SECRET: &str = "test-jwt-secret-at-least-32-characters-long";

/// API path prefix for tests (e.g. `/api/v1`).
pub fn api_path(path: &str) -> String {
    format!("{}{}", constants::API_PREFIX, path)
}

pub fn public_api_path(path: &str) -> String {
    format!("{}{}", constants::PUBLIC_API_PREFIX, path)
}

pub fn test_config(overrides: &[(&str, &str)]) -> Config {
    let mut vars: HashMap<String, String> = HashMap::from([
        ("DATABASE_URL".to_string(), "postgres://unused".to_string()),
        ("JWT_SECRET".to_string(), TEST_JWT_SECRET.to_string()),
        ("APP_BASE_URL".to_string(), "https://app.example.com".to_string()),
    ]);
    for (key, value) in overrides {
        vars.insert(key.to_string(), value.to_string());
    }
    Config::from_lookup(|key| vars.get(key).cloned()).expect("valid test config")
}

/// Test application: server plus handles on the in-memory backends.
pub struct TestApp {
    pub server: TestServer,
    pub store: Arc<InMemoryStore>,
    pub mailer: Arc<RecordingEmailSender>,
    pub sessions: Arc<JwtSessionProvider>,
}

impl TestApp {
    pub fn client(&self) -> &TestServer {
        &self.server
    }

    /// Signed session token for `user`, valid for an hour.
    pub fn token_for(&self, user: &SessionUser) -> String {
        self.sessions
            .issue_token(user, Duration::hours(1))
            .expect("Failed to issue session token")
    }

    pub fn bearer(&self, user: &SessionUser) -> String {
        format!("Bearer {}", self.token_for(user))
    }
}

pub fn setup_test_app() -> TestApp {
    setup_test_app_with(&[])
}

pub fn setup_test_app_with(overrides: &[(&str, &str)]) -> TestApp {
    let config = test_config(overrides);
    let store = Arc::new(InMemoryStore::new());
    let mailer = Arc::new(RecordingEmailSender::new());
    let sessions = Arc::new(JwtSessionProvider::new(
        config.jwt_secret(),
        config.session_cookie_name(),
    ));

    let state = Arc::new(AppState::new(
        config.clone(),
        Stores::shared(store.clone()),
        sessions.clone(),
        mailer.clone(),
        Arc::new(InMemoryRateLimitStore::default()),
        None,
    ));

    let app = routes::setup_routes(&config, state).expect("Failed to build router");
    let server = TestServer::new(app.into_make_service()).expect("Failed to create test server");

    TestApp {
        server,
        store,
        mailer,
        sessions,
    }
}

pub fn alice() -> SessionUser {
    session_user("user_alice", "alice@example.com")
}

pub fn bob() -> SessionUser {
    session_user("user_bob", "bob@example.com")
}

pub fn carol() -> SessionUser {
    session_user("user_carol", "carol@example.com")
}
