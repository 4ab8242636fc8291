//! Invitation creation and redemption.

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use std::sync::Arc;
use validator::ValidateEmail;

use crate::access::context::ResolvedContext;
use crate::access::gate::require_permission;
use crate::access::permissions::{can_grant_role, Permission};
use crate::error::AppError;
use crate::models::{Invitation, InvitationId, Membership, Role, SessionUser};
use crate::stores::{EmailSender, InvitationStore, OutgoingEmail, RedeemOutcome};

const TOKEN_BYTES: usize = 32;

/// Fresh redemption token: 32 random bytes, hex encoded.
pub fn generate_invitation_token() -> String {
    let bytes: [u8; TOKEN_BYTES] = rand::rng().random();
    hex::encode(bytes)
}

#[derive(Debug, Clone)]
pub struct InvitationPolicy {
    pub ttl: Duration,
    /// Base URL of the dashboard; the redemption link is `<base>/invitations/<token>`.
    pub accept_url_base: String,
}

impl Default for InvitationPolicy {
    fn default() -> Self {
        Self {
            ttl: Duration::days(7),
            accept_url_base: "http://localhost:3000".to_string(),
        }
    }
}

impl InvitationPolicy {
    pub fn accept_url(&self, token: &str) -> String {
        format!(
            "{}/invitations/{}",
            self.accept_url_base.trim_end_matches('/'),
            token
        )
    }
}

#[derive(Debug, thiserror::Error)]
pub enum InvitationError {
    #[error("Authentication required")]
    Unauthenticated,
    #[error("Invitation not found")]
    NotFound,
    #[error("Invitation has already been accepted")]
    AlreadyAccepted,
    #[error("Invitation has expired")]
    Expired,
    #[error("You are already a member of this organization")]
    AlreadyMember,
    #[error(transparent)]
    Store(#[from] AppError),
}

impl From<InvitationError> for AppError {
    fn from(err: InvitationError) -> Self {
        let message = err.to_string();
        match err {
            InvitationError::Unauthenticated => AppError::Unauthorized(message),
            InvitationError::NotFound => AppError::NotFound(message),
            InvitationError::AlreadyAccepted => AppError::conflict("ALREADY_ACCEPTED", message),
            InvitationError::AlreadyMember => AppError::conflict("ALREADY_MEMBER", message),
            InvitationError::Expired => AppError::Gone(message),
            InvitationError::Store(err) => err,
        }
    }
}

#[derive(Clone)]
pub struct InvitationService {
    store: Arc<dyn InvitationStore>,
    mailer: Arc<dyn EmailSender>,
    policy: InvitationPolicy,
}

impl InvitationService {
    pub fn new(
        store: Arc<dyn InvitationStore>,
        mailer: Arc<dyn EmailSender>,
        policy: InvitationPolicy,
    ) -> Self {
        Self {
            store,
            mailer,
            policy,
        }
    }

    pub fn policy(&self) -> &InvitationPolicy {
        &self.policy
    }

    /// Persist a new invitation and send the invite email in the background.
    ///
    /// Delivery failures are logged; the invitation stays valid.
    #[tracing::instrument(skip(self, ctx, inviter, email), fields(organization_id = %ctx.organization_id))]
    pub async fn create(
        &self,
        ctx: &ResolvedContext,
        inviter: &SessionUser,
        email: &str,
        role: Role,
    ) -> Result<Invitation, AppError> {
        require_permission(Permission::ManageMembers, ctx.role)?;
        if !can_grant_role(ctx.role, role) {
            return Err(AppError::Forbidden(format!(
                "Cannot invite with role {} above your own",
                role
            )));
        }

        let email = email.trim().to_lowercase();
        if !email.validate_email() {
            return Err(AppError::InvalidInput("email must be a valid address".to_string()));
        }

        let now = Utc::now();
        let invitation = Invitation {
            id: InvitationId::generate(),
            organization_id: ctx.organization_id.clone(),
            email,
            role,
            token: generate_invitation_token(),
            invited_by: inviter.id.clone(),
            expires_at: now + self.policy.ttl,
            accepted_at: None,
            created_at: now,
        };
        self.store.insert_invitation(&invitation).await?;

        let message = OutgoingEmail {
            to: invitation.email.clone(),
            subject: "You have been invited to join an organization".to_string(),
            html: invitation_email_html(
                inviter.name.as_deref().unwrap_or(&inviter.email),
                role,
                &self.policy.accept_url(&invitation.token),
            ),
        };
        let mailer = self.mailer.clone();
        let invitation_id = invitation.id.clone();
        tokio::spawn(async move {
            if let Err(e) = mailer.send(message).await {
                tracing::error!(error = %e, invitation_id = %invitation_id, "Failed to send invitation email");
            }
        });

        Ok(invitation)
    }

    pub async fn list_pending(&self, ctx: &ResolvedContext) -> Result<Vec<Invitation>, AppError> {
        require_permission(Permission::ManageMembers, ctx.role)?;
        self.store
            .list_pending(&ctx.organization_id, Utc::now())
            .await
    }

    pub async fn redeem(
        &self,
        user: Option<&SessionUser>,
        token: &str,
    ) -> Result<Membership, InvitationError> {
        self.redeem_at(user, token, Utc::now()).await
    }

    /// Redeem `token` for `user`. `now` is read once by the caller and used for every check.
    #[tracing::instrument(skip(self, user, token))]
    pub async fn redeem_at(
        &self,
        user: Option<&SessionUser>,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<Membership, InvitationError> {
        let user = user.ok_or(InvitationError::Unauthenticated)?;
        let invitation = self
            .store
            .find_by_token(token)
            .await?
            .ok_or(InvitationError::NotFound)?;

        if invitation.accepted_at.is_some() {
            return Err(InvitationError::AlreadyAccepted);
        }
        if invitation.is_expired_at(now) {
            return Err(InvitationError::Expired);
        }

        match self.store.redeem(&invitation, &user.id, now).await? {
            RedeemOutcome::Redeemed(membership) => {
                tracing::info!(
                    invitation_id = %invitation.id,
                    organization_id = %membership.organization_id,
                    "Invitation redeemed"
                );
                Ok(membership)
            }
            RedeemOutcome::AlreadyAccepted => Err(InvitationError::AlreadyAccepted),
            RedeemOutcome::AlreadyMember => Err(InvitationError::AlreadyMember),
        }
    }
}

fn invitation_email_html(inviter: &str, role: Role, accept_url: &str) -> String {
    format!(
        "<p>{} invited you to join their organization as <strong>{}</strong>.</p>\
         <p><a href=\"{}\">Accept the invitation</a></p>\
         <p>If you did not expect this email you can ignore it.</p>",
        escape_html(inviter),
        role,
        accept_url
    )
}

fn escape_html(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::context::ContextSource;
    use crate::error::ErrorMetadata;
    use crate::models::{OrganizationId, UserId};
    use crate::test_helpers::{session_user, InMemoryStore, RecordingEmailSender};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Fixture {
        store: Arc<InMemoryStore>,
        mailer: Arc<RecordingEmailSender>,
        service: InvitationService,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(InMemoryStore::new());
        let mailer = Arc::new(RecordingEmailSender::new());
        let service = InvitationService::new(
            store.clone(),
            mailer.clone(),
            InvitationPolicy {
                ttl: Duration::days(7),
                accept_url_base: "https://app.example.com/".to_string(),
            },
        );
        Fixture {
            store,
            mailer,
            service,
        }
    }

    fn ctx(role: Role) -> ResolvedContext {
        ResolvedContext {
            organization_id: OrganizationId::from("org_1"),
            role: Some(role),
            source: ContextSource::Cookie,
        }
    }

    fn pending(store: &InMemoryStore, expires_at: DateTime<Utc>) -> Invitation {
        let invitation = Invitation {
            id: InvitationId::generate(),
            organization_id: OrganizationId::from("org_1"),
            email: "new@example.com".to_string(),
            role: Role::Developer,
            token: generate_invitation_token(),
            invited_by: "user_admin".into(),
            expires_at,
            accepted_at: None,
            created_at: expires_at - Duration::days(7),
        };
        store.put_invitation(invitation.clone());
        invitation
    }

    #[test]
    fn test_token_shape() {
        let token = generate_invitation_token();
        assert_eq!(token.len(), 64);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(token, generate_invitation_token());
    }

    #[tokio::test]
    async fn test_create_persists_and_emails() {
        let f = fixture();
        let inviter = session_user("user_admin", "admin@example.com");
        let invitation = f
            .service
            .create(&ctx(Role::Admin), &inviter, " New@Example.com ", Role::Developer)
            .await
            .unwrap();

        assert_eq!(invitation.email, "new@example.com");
        assert_eq!(invitation.token.len(), 64);
        assert!(invitation.accepted_at.is_none());
        assert_eq!(invitation.expires_at - invitation.created_at, Duration::days(7));
        assert!(f.store.invitation(&invitation.id).is_some());

        let mut sent = Vec::new();
        for _ in 0..100 {
            sent = f.mailer.sent();
            if !sent.is_empty() {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "new@example.com");
        assert!(sent[0]
            .html
            .contains(&format!("https://app.example.com/invitations/{}", invitation.token)));
    }

    #[tokio::test]
    async fn test_create_survives_email_failure() {
        let f = fixture();
        f.mailer.fail(true);
        let inviter = session_user("user_admin", "admin@example.com");
        let invitation = f
            .service
            .create(&ctx(Role::Owner), &inviter, "new@example.com", Role::Admin)
            .await
            .unwrap();
        assert!(f.store.invitation(&invitation.id).is_some());
    }

    #[tokio::test]
    async fn test_create_requires_manage_members_and_ceiling() {
        let f = fixture();
        let inviter = session_user("user_1", "u@example.com");

        let err = f
            .service
            .create(&ctx(Role::Developer), &inviter, "a@example.com", Role::Customer)
            .await
            .unwrap_err();
        assert_eq!(err.http_status_code(), 403);

        let err = f
            .service
            .create(&ctx(Role::Admin), &inviter, "a@example.com", Role::Owner)
            .await
            .unwrap_err();
        assert_eq!(err.http_status_code(), 403);

        let err = f
            .service
            .create(&ctx(Role::Admin), &inviter, "not-an-email", Role::Customer)
            .await
            .unwrap_err();
        assert_eq!(err.http_status_code(), 400);
    }

    #[tokio::test]
    async fn test_redeem_requires_identity() {
        let f = fixture();
        let invitation = pending(&f.store, Utc::now() + Duration::days(1));
        let err = f.service.redeem(None, &invitation.token).await.unwrap_err();
        assert!(matches!(err, InvitationError::Unauthenticated));
        assert_eq!(AppError::from(err).http_status_code(), 401);
    }

    #[tokio::test]
    async fn test_redeem_unknown_token() {
        let f = fixture();
        let user = session_user("user_new", "new@example.com");
        let err = f.service.redeem(Some(&user), "nope").await.unwrap_err();
        assert_eq!(AppError::from(err).http_status_code(), 404);
    }

    #[tokio::test]
    async fn test_redeem_creates_membership_once() {
        let f = fixture();
        let invitation = pending(&f.store, Utc::now() + Duration::days(1));
        let user = session_user("user_new", "new@example.com");

        let membership = f
            .service
            .redeem(Some(&user), &invitation.token)
            .await
            .unwrap();
        assert_eq!(membership.role, Role::Developer);
        assert_eq!(membership.organization_id, OrganizationId::from("org_1"));
        assert!(f.store.invitation(&invitation.id).unwrap().accepted_at.is_some());

        let err = f
            .service
            .redeem(Some(&user), &invitation.token)
            .await
            .unwrap_err();
        let err = AppError::from(err);
        assert_eq!(err.http_status_code(), 409);
        assert_eq!(err.error_code(), "ALREADY_ACCEPTED");
        assert_eq!(f.store.members_of("org_1").len(), 1);
    }

    #[tokio::test]
    async fn test_expiry_boundary() {
        let f = fixture();
        let now = Utc::now();
        let user = session_user("user_new", "new@example.com");

        let at_boundary = pending(&f.store, now);
        let err = f
            .service
            .redeem_at(Some(&user), &at_boundary.token, now)
            .await
            .unwrap_err();
        assert!(matches!(err, InvitationError::Expired));
        assert_eq!(AppError::from(err).http_status_code(), 410);

        let just_inside = pending(&f.store, now + Duration::milliseconds(1));
        assert!(f
            .service
            .redeem_at(Some(&user), &just_inside.token, now)
            .await
            .is_ok());
    }

    /// Holds every `find_by_token` caller until both racers have read the invitation,
    /// so each one reaches `redeem` with a pending snapshot.
    struct LockstepStore {
        inner: Arc<InMemoryStore>,
        readers: tokio::sync::Barrier,
        redeem_calls: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl InvitationStore for LockstepStore {
        async fn insert_invitation(&self, invitation: &Invitation) -> Result<(), AppError> {
            self.inner.insert_invitation(invitation).await
        }

        async fn find_by_token(&self, token: &str) -> Result<Option<Invitation>, AppError> {
            let found = self.inner.find_by_token(token).await;
            self.readers.wait().await;
            found
        }

        async fn list_pending(
            &self,
            organization_id: &OrganizationId,
            now: DateTime<Utc>,
        ) -> Result<Vec<Invitation>, AppError> {
            self.inner.list_pending(organization_id, now).await
        }

        async fn redeem(
            &self,
            invitation: &Invitation,
            user_id: &UserId,
            now: DateTime<Utc>,
        ) -> Result<RedeemOutcome, AppError> {
            self.redeem_calls.fetch_add(1, Ordering::SeqCst);
            self.inner.redeem(invitation, user_id, now).await
        }
    }

    #[tokio::test]
    async fn test_concurrent_redemption_has_one_winner() {
        let inner = Arc::new(InMemoryStore::new());
        let invitation = pending(&inner, Utc::now() + Duration::days(1));
        let store = Arc::new(LockstepStore {
            inner: inner.clone(),
            readers: tokio::sync::Barrier::new(2),
            redeem_calls: AtomicUsize::new(0),
        });
        let service = InvitationService::new(
            store.clone(),
            Arc::new(RecordingEmailSender::new()),
            InvitationPolicy::default(),
        );
        let alice = session_user("user_a", "a@example.com");
        let bob = session_user("user_b", "b@example.com");

        let (a, b) = tokio::join!(
            service.redeem(Some(&alice), &invitation.token),
            service.redeem(Some(&bob), &invitation.token)
        );

        // Both passed the pending check; the store decided the winner.
        assert_eq!(store.redeem_calls.load(Ordering::SeqCst), 2);
        let results = [a, b];
        let winners = results.iter().filter(|r| r.is_ok()).count();
        let losers = results
            .iter()
            .filter(|r| matches!(r, Err(InvitationError::AlreadyAccepted)))
            .count();
        assert_eq!(winners, 1);
        assert_eq!(losers, 1);
        assert_eq!(inner.members_of("org_1").len(), 1);
        assert_eq!(inner.accepted_writes(&invitation.id), 1);
    }

    #[tokio::test]
    async fn test_store_redeem_rejects_stale_snapshot() {
        let f = fixture();
        let invitation = pending(&f.store, Utc::now() + Duration::days(1));
        let now = Utc::now();

        // Both callers read the invitation before either wrote.
        let first = f.store.redeem(&invitation, &"user_a".into(), now).await.unwrap();
        let second = f.store.redeem(&invitation, &"user_b".into(), now).await.unwrap();
        assert!(matches!(first, RedeemOutcome::Redeemed(_)));
        assert_eq!(second, RedeemOutcome::AlreadyAccepted);
        assert_eq!(f.store.members_of("org_1").len(), 1);
    }

    #[tokio::test]
    async fn test_existing_member_keeps_invitation_pending() {
        let f = fixture();
        f.store.add_member("org_1", "user_existing", Role::Customer);
        let invitation = pending(&f.store, Utc::now() + Duration::days(1));
        let user = session_user("user_existing", "e@example.com");

        let err = f
            .service
            .redeem(Some(&user), &invitation.token)
            .await
            .unwrap_err();
        assert_eq!(AppError::from(err).error_code(), "ALREADY_MEMBER");
        assert!(f.store.invitation(&invitation.id).unwrap().accepted_at.is_none());
        assert_eq!(f.store.members_of("org_1").len(), 1);
    }

    #[tokio::test]
    async fn test_list_pending_excludes_accepted_and_expired() {
        let f = fixture();
        let now = Utc::now();
        let live = pending(&f.store, now + Duration::days(1));
        pending(&f.store, now - Duration::seconds(1));
        let accepted = pending(&f.store, now + Duration::days(1));
        f.service
            .redeem(Some(&session_user("user_x", "x@example.com")), &accepted.token)
            .await
            .unwrap();

        let listed = f.service.list_pending(&ctx(Role::Admin)).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, live.id);

        assert!(f.service.list_pending(&ctx(Role::Customer)).await.is_err());
    }
}
