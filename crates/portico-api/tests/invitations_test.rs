//! Invitation API tests.
//!
//! Run with: `cargo test -p portico-api --test invitations_test`

mod helpers;

use chrono::{Duration, Utc};
use helpers::{alice, api_path, bob, carol, setup_test_app, TestApp};
use portico_core::models::{Invitation, InvitationId, OrganizationId, Role, UserId};
use serde_json::{json, Value};
use std::time::Duration as StdDuration;

fn pending_invitation(token: &str, role: Role, expires_in: Duration) -> Invitation {
    let now = Utc::now();
    Invitation {
        id: InvitationId::generate(),
        organization_id: OrganizationId::from("org_1"),
        email: "bob@example.com".to_string(),
        role,
        token: token.to_string(),
        invited_by: UserId::from("user_alice"),
        expires_at: now + expires_in,
        accepted_at: None,
        created_at: now,
    }
}

/// Invitation emails are sent in the background.
async fn wait_for_emails(app: &TestApp, count: usize) {
    for _ in 0..100 {
        if app.mailer.sent().len() >= count {
            return;
        }
        tokio::time::sleep(StdDuration::from_millis(10)).await;
    }
    panic!("expected {} invitation email(s)", count);
}

#[tokio::test]
async fn test_invite_then_accept() {
    let app = setup_test_app();
    app.store.add_member("org_1", "user_alice", Role::Admin);

    let response = app
        .client()
        .post(&api_path("/organizations/org_1/invitations"))
        .add_header("Authorization", app.bearer(&alice()))
        .json(&json!({ "email": "Bob@Example.com", "role": "developer" }))
        .await;

    assert_eq!(response.status_code(), 201);
    let body: Value = response.json();
    assert_eq!(body["status"], "pending");
    assert_eq!(body["email"], "bob@example.com");
    assert!(body.get("token").is_none());

    let invitation_id = InvitationId::from(body["id"].as_str().unwrap());
    let token = app.store.invitation(&invitation_id).unwrap().token;

    wait_for_emails(&app, 1).await;
    let email = &app.mailer.sent()[0];
    assert_eq!(email.to, "bob@example.com");
    assert!(email
        .html
        .contains(&format!("https://app.example.com/invitations/{}", token)));

    let accepted = app
        .client()
        .post(&api_path(&format!("/invitations/{}/accept", token)))
        .add_header("Authorization", app.bearer(&bob()))
        .await;

    assert_eq!(accepted.status_code(), 200);
    let cookie = accepted.header("set-cookie");
    assert!(cookie.to_str().unwrap().starts_with("orgId=org_1"));
    let membership: Value = accepted.json();
    assert_eq!(membership["organization_id"], "org_1");
    assert_eq!(membership["user_id"], "user_bob");
    assert_eq!(membership["role"], "developer");

    let again = app
        .client()
        .post(&api_path(&format!("/invitations/{}/accept", token)))
        .add_header("Authorization", app.bearer(&carol()))
        .await;
    assert_eq!(again.status_code(), 409);
    assert_eq!(again.json::<Value>()["code"], "ALREADY_ACCEPTED");
    assert_eq!(app.store.members_of("org_1").len(), 2);
}

#[tokio::test]
async fn test_accept_requires_session() {
    let app = setup_test_app();
    app.store.add_member("org_1", "user_alice", Role::Owner);
    app.store
        .put_invitation(pending_invitation("tok_anon", Role::Customer, Duration::days(1)));

    let response = app
        .client()
        .post(&api_path("/invitations/tok_anon/accept"))
        .await;

    assert_eq!(response.status_code(), 401);
    assert_eq!(app.store.members_of("org_1").len(), 1);
}

#[tokio::test]
async fn test_accept_unknown_and_expired_tokens() {
    let app = setup_test_app();
    app.store.add_member("org_1", "user_alice", Role::Owner);
    let expired = pending_invitation("tok_old", Role::Customer, Duration::seconds(-1));
    let expired_id = expired.id.clone();
    app.store.put_invitation(expired);

    let unknown = app
        .client()
        .post(&api_path("/invitations/tok_nope/accept"))
        .add_header("Authorization", app.bearer(&bob()))
        .await;
    assert_eq!(unknown.status_code(), 404);

    let response = app
        .client()
        .post(&api_path("/invitations/tok_old/accept"))
        .add_header("Authorization", app.bearer(&bob()))
        .await;
    assert_eq!(response.status_code(), 410);
    assert!(app.store.invitation(&expired_id).unwrap().accepted_at.is_none());
}

#[tokio::test]
async fn test_existing_member_leaves_invitation_pending() {
    let app = setup_test_app();
    app.store.add_member("org_1", "user_alice", Role::Owner);
    app.store.add_member("org_1", "user_bob", Role::Customer);
    let invitation = pending_invitation("tok_dup", Role::Admin, Duration::days(1));
    let invitation_id = invitation.id.clone();
    app.store.put_invitation(invitation);

    let response = app
        .client()
        .post(&api_path("/invitations/tok_dup/accept"))
        .add_header("Authorization", app.bearer(&bob()))
        .await;

    assert_eq!(response.status_code(), 409);
    assert_eq!(response.json::<Value>()["code"], "ALREADY_MEMBER");
    assert!(app.store.invitation(&invitation_id).unwrap().accepted_at.is_none());

    let bob_membership = app
        .store
        .members_of("org_1")
        .into_iter()
        .find(|m| m.user_id.as_str() == "user_bob")
        .unwrap();
    assert_eq!(bob_membership.role, Role::Customer);
}

#[tokio::test]
async fn test_invite_requires_manage_members() {
    let app = setup_test_app();
    app.store.add_member("org_1", "user_alice", Role::ProductManager);

    let response = app
        .client()
        .post(&api_path("/organizations/org_1/invitations"))
        .add_header("Authorization", app.bearer(&alice()))
        .json(&json!({ "email": "bob@example.com", "role": "customer" }))
        .await;

    assert_eq!(response.status_code(), 403);
    assert!(app.mailer.sent().is_empty());
}

#[tokio::test]
async fn test_invite_cannot_exceed_own_role() {
    let app = setup_test_app();
    app.store.add_member("org_1", "user_alice", Role::Admin);

    let response = app
        .client()
        .post(&api_path("/organizations/org_1/invitations"))
        .add_header("Authorization", app.bearer(&alice()))
        .json(&json!({ "email": "bob@example.com", "role": "owner" }))
        .await;

    assert_eq!(response.status_code(), 403);
}

#[tokio::test]
async fn test_invite_rejects_bad_input() {
    let app = setup_test_app();
    app.store.add_member("org_1", "user_alice", Role::Owner);

    let bad_email = app
        .client()
        .post(&api_path("/organizations/org_1/invitations"))
        .add_header("Authorization", app.bearer(&alice()))
        .json(&json!({ "email": "not-an-email", "role": "customer" }))
        .await;
    assert_eq!(bad_email.status_code(), 400);

    let bad_role = app
        .client()
        .post(&api_path("/organizations/org_1/invitations"))
        .add_header("Authorization", app.bearer(&alice()))
        .json(&json!({ "email": "bob@example.com", "role": "superuser" }))
        .await;
    assert_eq!(bad_role.status_code(), 400);
    assert_eq!(bad_role.json::<Value>()["code"], "INVALID_INPUT");
}

#[tokio::test]
async fn test_list_pending_invitations() {
    let app = setup_test_app();
    app.store.add_member("org_1", "user_alice", Role::Owner);
    app.store
        .put_invitation(pending_invitation("tok_live", Role::Customer, Duration::days(1)));
    app.store
        .put_invitation(pending_invitation("tok_dead", Role::Customer, Duration::seconds(-1)));

    let response = app
        .client()
        .get(&api_path("/organizations/org_1/invitations"))
        .add_header("Authorization", app.bearer(&alice()))
        .await;

    assert_eq!(response.status_code(), 200);
    let invitations: Vec<Value> = response.json();
    assert_eq!(invitations.len(), 1);
    assert_eq!(invitations[0]["status"], "pending");
}
