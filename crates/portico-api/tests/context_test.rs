//! Organization context resolution over HTTP.
//!
//! Run with: `cargo test -p portico-api --test context_test`

mod helpers;

use helpers::{alice, api_path, bob, setup_test_app};
use portico_core::models::Role;
use serde_json::Value;

#[tokio::test]
async fn test_context_sources_in_precedence_order() {
    let app = setup_test_app();
    app.store.add_member("org_query", "user_alice", Role::Admin);
    app.store.add_member("org_header", "user_alice", Role::Developer);
    app.store.add_member("org_cookie", "user_alice", Role::Customer);

    let response = app
        .client()
        .get(&api_path("/context"))
        .add_query_param("organizationId", "org_query")
        .add_header("x-organization-id", "org_header")
        .add_header("Cookie", "orgId=org_cookie")
        .add_header("Authorization", app.bearer(&alice()))
        .await;
    assert_eq!(response.status_code(), 200);
    let body: Value = response.json();
    assert_eq!(body["organization_id"], "org_query");
    assert_eq!(body["source"], "query");
    assert_eq!(body["role"], "admin");

    let response = app
        .client()
        .get(&api_path("/context"))
        .add_header("x-organization-id", "org_header")
        .add_header("Cookie", "orgId=org_cookie")
        .add_header("Authorization", app.bearer(&alice()))
        .await;
    let body: Value = response.json();
    assert_eq!(body["source"], "header");
    assert_eq!(body["role"], "developer");

    let response = app
        .client()
        .get(&api_path("/context"))
        .add_header("Cookie", "orgId=org_cookie")
        .add_header("Authorization", app.bearer(&alice()))
        .await;
    let body: Value = response.json();
    assert_eq!(body["source"], "cookie");
    assert_eq!(body["role"], "customer");
}

#[tokio::test]
async fn test_missing_organization_is_bad_request() {
    let app = setup_test_app();

    let response = app
        .client()
        .get(&api_path("/context"))
        .add_header("Authorization", app.bearer(&alice()))
        .await;

    assert_eq!(response.status_code(), 400);
    assert_eq!(response.json::<Value>()["code"], "MISSING_ORG_ID");
}

#[tokio::test]
async fn test_non_member_is_denied() {
    let app = setup_test_app();
    app.store.add_member("org_1", "user_bob", Role::Owner);

    let response = app
        .client()
        .get(&api_path("/context"))
        .add_header("x-organization-id", "org_1")
        .add_header("Authorization", app.bearer(&alice()))
        .await;

    assert_eq!(response.status_code(), 403);
}

#[tokio::test]
async fn test_portal_context_allows_anonymous_visitors() {
    let app = setup_test_app();
    app.store.add_member("org_1", "user_bob", Role::Owner);

    let anonymous = app
        .client()
        .get(&api_path("/portal/context"))
        .add_query_param("organizationId", "org_1")
        .await;
    assert_eq!(anonymous.status_code(), 200);
    let body: Value = anonymous.json();
    assert_eq!(body["organization"]["id"], "org_1");
    assert!(body["context"]["role"].is_null());

    let member = app
        .client()
        .get(&api_path("/portal/context"))
        .add_query_param("organizationId", "org_1")
        .add_header("Authorization", app.bearer(&bob()))
        .await;
    assert_eq!(member.json::<Value>()["context"]["role"], "owner");
}

#[tokio::test]
async fn test_portal_context_unknown_organization() {
    let app = setup_test_app();

    let response = app
        .client()
        .get(&api_path("/portal/context"))
        .add_query_param("organizationId", "org_missing")
        .await;

    assert_eq!(response.status_code(), 404);
}

#[tokio::test]
async fn test_portal_context_for_signed_in_outsider() {
    let app = setup_test_app();
    app.store.add_member("org_1", "user_bob", Role::Owner);

    let response = app
        .client()
        .get(&api_path("/portal/context"))
        .add_query_param("organizationId", "org_1")
        .add_header("Authorization", app.bearer(&alice()))
        .await;

    assert_eq!(response.status_code(), 200);
    assert!(response.json::<Value>()["context"]["role"].is_null());
}
