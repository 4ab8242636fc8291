//! Invitation repository tests against Postgres.
//!
//! Requires Docker for testcontainers (Postgres).
//! Run with: `cargo test -p portico-db --test invitation_repository_test`

mod helpers;

use chrono::Utc;
use helpers::{count_members, invitation, seed_organization, setup_test_db};
use portico_core::models::{Role, UserId};
use portico_core::{InvitationStore, RedeemOutcome};
use portico_db::InvitationRepository;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Barrier;

const REDEEM_TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_concurrent_redeem_writes_one_membership() {
    let db = setup_test_db().await;
    let organization = seed_organization(&db.pool, "acme", "user_owner").await;
    let repo = InvitationRepository::new(db.pool.clone(), REDEEM_TIMEOUT);

    let now = Utc::now();
    let invitation = invitation(&organization, Role::Developer, now);
    repo.insert_invitation(&invitation).await.unwrap();

    // Each racer holds a pending snapshot and runs on its own pool connection.
    let start = Arc::new(Barrier::new(2));
    let racers = ["user_a", "user_b"].map(|user| {
        let repo = repo.clone();
        let invitation = invitation.clone();
        let start = start.clone();
        tokio::spawn(async move {
            start.wait().await;
            repo.redeem(&invitation, &UserId::from(user), now).await
        })
    });

    let mut outcomes = Vec::new();
    for racer in racers {
        outcomes.push(racer.await.unwrap().unwrap());
    }

    let redeemed = outcomes
        .iter()
        .filter(|o| matches!(o, RedeemOutcome::Redeemed(_)))
        .count();
    let already_accepted = outcomes
        .iter()
        .filter(|o| **o == RedeemOutcome::AlreadyAccepted)
        .count();
    assert_eq!(redeemed, 1);
    assert_eq!(already_accepted, 1);

    // Owner plus exactly one invitee.
    assert_eq!(count_members(&db.pool, &organization).await, 2);
    let invitee_rows: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM memberships WHERE organization_id = $1 AND role = 'developer'",
    )
    .bind(&organization.id)
    .fetch_one(&db.pool)
    .await
    .unwrap();
    assert_eq!(invitee_rows, 1);

    let stored = repo.find_by_token(&invitation.token).await.unwrap().unwrap();
    assert!(stored.accepted_at.is_some());
}

#[tokio::test]
async fn test_redeem_by_existing_member_rolls_back() {
    let db = setup_test_db().await;
    let organization = seed_organization(&db.pool, "acme", "user_owner").await;
    let repo = InvitationRepository::new(db.pool.clone(), REDEEM_TIMEOUT);

    let now = Utc::now();
    let invitation = invitation(&organization, Role::Admin, now);
    repo.insert_invitation(&invitation).await.unwrap();

    let outcome = repo
        .redeem(&invitation, &UserId::from("user_owner"), now)
        .await
        .unwrap();
    assert_eq!(outcome, RedeemOutcome::AlreadyMember);

    let stored = repo.find_by_token(&invitation.token).await.unwrap().unwrap();
    assert!(stored.accepted_at.is_none());
    assert_eq!(count_members(&db.pool, &organization).await, 1);

    // Still redeemable by someone else.
    let outcome = repo
        .redeem(&invitation, &UserId::from("user_new"), now)
        .await
        .unwrap();
    match outcome {
        RedeemOutcome::Redeemed(membership) => {
            assert_eq!(membership.role, Role::Admin);
            assert_eq!(membership.organization_id, organization.id);
        }
        other => panic!("expected a redemption, got {other:?}"),
    }
    assert_eq!(count_members(&db.pool, &organization).await, 2);
}

#[tokio::test]
async fn test_list_pending_skips_accepted_and_expired() {
    let db = setup_test_db().await;
    let organization = seed_organization(&db.pool, "acme", "user_owner").await;
    let repo = InvitationRepository::new(db.pool.clone(), REDEEM_TIMEOUT);
    let now = Utc::now();

    let live = invitation(&organization, Role::Customer, now);
    let mut expired = invitation(&organization, Role::Customer, now);
    expired.expires_at = now;
    let accepted = invitation(&organization, Role::Customer, now);
    for inv in [&live, &expired, &accepted] {
        repo.insert_invitation(inv).await.unwrap();
    }
    repo.redeem(&accepted, &UserId::from("user_new"), now)
        .await
        .unwrap();

    let pending = repo.list_pending(&organization.id, now).await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].id, live.id);
}
