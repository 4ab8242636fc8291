//! In-memory store implementations
//!
//! One `InMemoryStore` backs every store trait so that a membership created by an
//! invitation is visible to the context resolver. All state sits behind a single
//! mutex; redemption checks and writes under one lock, which gives the same
//! at-most-once guarantee as the conditional update in Postgres.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::error::AppError;
use crate::models::{
    ApiKey, ApiKeyId, Invitation, InvitationId, Membership, NewOrganization, Organization,
    OrganizationId, OrganizationSummary, Role, UserId,
};
use crate::stores::{
    ApiKeyStore, CreateOrganizationOutcome, EmailSender, InvitationStore, MembershipStore,
    OrganizationStore, OutgoingEmail, RedeemOutcome,
};

#[derive(Default)]
struct State {
    organizations: HashMap<OrganizationId, Organization>,
    memberships: Vec<Membership>,
    invitations: HashMap<InvitationId, Invitation>,
    accepted_writes: HashMap<InvitationId, usize>,
    api_keys: HashMap<ApiKeyId, ApiKey>,
    fail_usage_recording: bool,
}

impl State {
    fn membership(
        &self,
        user_id: &UserId,
        organization_id: &OrganizationId,
    ) -> Option<&Membership> {
        self.memberships
            .iter()
            .find(|m| &m.user_id == user_id && &m.organization_id == organization_id)
    }
}

#[derive(Clone, Default)]
pub struct InMemoryStore {
    state: Arc<Mutex<State>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an organization with the given id and slug.
    pub fn add_organization(&self, id: &str, slug: &str) -> Organization {
        let now = Utc::now();
        let organization = Organization {
            id: OrganizationId::from(id),
            name: slug.to_string(),
            slug: slug.to_string(),
            description: None,
            custom_domain: None,
            created_at: now,
            updated_at: now,
        };
        self.state
            .lock()
            .unwrap()
            .organizations
            .insert(organization.id.clone(), organization.clone());
        organization
    }

    /// Add a membership, creating the organization when it does not exist yet.
    pub fn add_member(&self, organization_id: &str, user_id: &str, role: Role) -> Membership {
        let exists = self
            .state
            .lock()
            .unwrap()
            .organizations
            .contains_key(&OrganizationId::from(organization_id));
        if !exists {
            self.add_organization(organization_id, organization_id);
        }
        let membership = Membership::new(
            OrganizationId::from(organization_id),
            UserId::from(user_id),
            role,
            Utc::now(),
        );
        self.state.lock().unwrap().memberships.push(membership.clone());
        membership
    }

    pub fn put_invitation(&self, invitation: Invitation) {
        self.state
            .lock()
            .unwrap()
            .invitations
            .insert(invitation.id.clone(), invitation);
    }

    pub fn invitation(&self, id: &InvitationId) -> Option<Invitation> {
        self.state.lock().unwrap().invitations.get(id).cloned()
    }

    /// Number of times acceptedAt was written for this invitation.
    pub fn accepted_writes(&self, id: &InvitationId) -> usize {
        self.state
            .lock()
            .unwrap()
            .accepted_writes
            .get(id)
            .copied()
            .unwrap_or(0)
    }

    pub fn members_of(&self, organization_id: &str) -> Vec<Membership> {
        let organization_id = OrganizationId::from(organization_id);
        self.state
            .lock()
            .unwrap()
            .memberships
            .iter()
            .filter(|m| m.organization_id == organization_id)
            .cloned()
            .collect()
    }

    pub fn organization_count(&self) -> usize {
        self.state.lock().unwrap().organizations.len()
    }

    pub fn api_key(&self, id: &ApiKeyId) -> Option<ApiKey> {
        self.state.lock().unwrap().api_keys.get(id).cloned()
    }

    pub fn put_api_key(&self, api_key: ApiKey) {
        self.state
            .lock()
            .unwrap()
            .api_keys
            .insert(api_key.id.clone(), api_key);
    }

    /// Make `touch_last_used` fail, to check that usage recording is best-effort.
    pub fn fail_usage_recording(&self, fail: bool) {
        self.state.lock().unwrap().fail_usage_recording = fail;
    }
}

#[async_trait]
impl MembershipStore for InMemoryStore {
    async fn list_organizations_for_user(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<OrganizationSummary>, AppError> {
        let state = self.state.lock().unwrap();
        let mut summaries: Vec<OrganizationSummary> = state
            .memberships
            .iter()
            .filter(|m| &m.user_id == user_id)
            .filter_map(|m| {
                state
                    .organizations
                    .get(&m.organization_id)
                    .map(|org| OrganizationSummary {
                        id: org.id.clone(),
                        name: org.name.clone(),
                        slug: org.slug.clone(),
                        role: m.role,
                    })
            })
            .collect();
        summaries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(summaries)
    }

    async fn get_membership(
        &self,
        user_id: &UserId,
        organization_id: &OrganizationId,
    ) -> Result<Option<Membership>, AppError> {
        let state = self.state.lock().unwrap();
        Ok(state.membership(user_id, organization_id).cloned())
    }

    async fn list_members(
        &self,
        organization_id: &OrganizationId,
    ) -> Result<Vec<Membership>, AppError> {
        Ok(self.members_of(organization_id.as_str()))
    }
}

#[async_trait]
impl OrganizationStore for InMemoryStore {
    async fn create_with_owner(
        &self,
        new: &NewOrganization,
        owner: &UserId,
        now: DateTime<Utc>,
    ) -> Result<CreateOrganizationOutcome, AppError> {
        let mut state = self.state.lock().unwrap();
        if state.organizations.values().any(|o| o.slug == new.slug) {
            return Ok(CreateOrganizationOutcome::SlugTaken);
        }
        let organization = Organization {
            id: OrganizationId::generate(),
            name: new.name.clone(),
            slug: new.slug.clone(),
            description: new.description.clone(),
            custom_domain: None,
            created_at: now,
            updated_at: now,
        };
        let owner = Membership::new(organization.id.clone(), owner.clone(), Role::Owner, now);
        state
            .organizations
            .insert(organization.id.clone(), organization.clone());
        state.memberships.push(owner.clone());
        Ok(CreateOrganizationOutcome::Created {
            organization,
            owner,
        })
    }

    async fn get_organization(
        &self,
        organization_id: &OrganizationId,
    ) -> Result<Option<Organization>, AppError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .organizations
            .get(organization_id)
            .cloned())
    }
}

#[async_trait]
impl InvitationStore for InMemoryStore {
    async fn insert_invitation(&self, invitation: &Invitation) -> Result<(), AppError> {
        let mut state = self.state.lock().unwrap();
        if state.invitations.values().any(|i| i.token == invitation.token) {
            return Err(AppError::Internal("duplicate invitation token".to_string()));
        }
        state
            .invitations
            .insert(invitation.id.clone(), invitation.clone());
        Ok(())
    }

    async fn find_by_token(&self, token: &str) -> Result<Option<Invitation>, AppError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .invitations
            .values()
            .find(|i| i.token == token)
            .cloned())
    }

    async fn list_pending(
        &self,
        organization_id: &OrganizationId,
        now: DateTime<Utc>,
    ) -> Result<Vec<Invitation>, AppError> {
        let state = self.state.lock().unwrap();
        let mut pending: Vec<Invitation> = state
            .invitations
            .values()
            .filter(|i| &i.organization_id == organization_id)
            .filter(|i| i.accepted_at.is_none() && !i.is_expired_at(now))
            .cloned()
            .collect();
        pending.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(pending)
    }

    async fn redeem(
        &self,
        invitation: &Invitation,
        user_id: &UserId,
        now: DateTime<Utc>,
    ) -> Result<RedeemOutcome, AppError> {
        let mut state = self.state.lock().unwrap();

        let still_pending = state
            .invitations
            .get(&invitation.id)
            .is_some_and(|stored| stored.accepted_at.is_none());
        if !still_pending {
            return Ok(RedeemOutcome::AlreadyAccepted);
        }
        if state.membership(user_id, &invitation.organization_id).is_some() {
            return Ok(RedeemOutcome::AlreadyMember);
        }

        if let Some(stored) = state.invitations.get_mut(&invitation.id) {
            stored.accepted_at = Some(now);
        }
        *state
            .accepted_writes
            .entry(invitation.id.clone())
            .or_insert(0) += 1;
        let membership = Membership::new(
            invitation.organization_id.clone(),
            user_id.clone(),
            invitation.role,
            now,
        );
        state.memberships.push(membership.clone());
        Ok(RedeemOutcome::Redeemed(membership))
    }
}

#[async_trait]
impl ApiKeyStore for InMemoryStore {
    async fn insert_api_key(&self, api_key: &ApiKey) -> Result<(), AppError> {
        self.put_api_key(api_key.clone());
        Ok(())
    }

    async fn find_by_hash(&self, key_hash: &str) -> Result<Option<ApiKey>, AppError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .api_keys
            .values()
            .find(|k| k.key_hash == key_hash)
            .cloned())
    }

    async fn list_by_organization(
        &self,
        organization_id: &OrganizationId,
    ) -> Result<Vec<ApiKey>, AppError> {
        let state = self.state.lock().unwrap();
        let mut keys: Vec<ApiKey> = state
            .api_keys
            .values()
            .filter(|k| &k.organization_id == organization_id)
            .cloned()
            .collect();
        keys.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(keys)
    }

    async fn set_disabled(
        &self,
        organization_id: &OrganizationId,
        id: &ApiKeyId,
        disabled: bool,
    ) -> Result<Option<ApiKey>, AppError> {
        let mut state = self.state.lock().unwrap();
        Ok(state
            .api_keys
            .get_mut(id)
            .filter(|k| &k.organization_id == organization_id)
            .map(|k| {
                k.disabled = disabled;
                k.clone()
            }))
    }

    async fn delete(
        &self,
        organization_id: &OrganizationId,
        id: &ApiKeyId,
    ) -> Result<bool, AppError> {
        let mut state = self.state.lock().unwrap();
        let owned = state
            .api_keys
            .get(id)
            .is_some_and(|k| &k.organization_id == organization_id);
        if owned {
            state.api_keys.remove(id);
        }
        Ok(owned)
    }

    async fn touch_last_used(&self, id: &ApiKeyId, now: DateTime<Utc>) -> Result<(), AppError> {
        let mut state = self.state.lock().unwrap();
        if state.fail_usage_recording {
            return Err(AppError::Internal("usage recording unavailable".to_string()));
        }
        if let Some(key) = state.api_keys.get_mut(id) {
            key.last_used_at = Some(now);
        }
        Ok(())
    }
}

/// Email sender that keeps every message in memory.
#[derive(Clone, Default)]
pub struct RecordingEmailSender {
    sent: Arc<Mutex<Vec<OutgoingEmail>>>,
    fail: Arc<Mutex<bool>>,
}

impl RecordingEmailSender {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<OutgoingEmail> {
        self.sent.lock().unwrap().clone()
    }

    pub fn fail(&self, fail: bool) {
        *self.fail.lock().unwrap() = fail;
    }
}

#[async_trait]
impl EmailSender for RecordingEmailSender {
    async fn send(&self, email: OutgoingEmail) -> Result<(), String> {
        if *self.fail.lock().unwrap() {
            return Err("SMTP connection refused".to_string());
        }
        self.sent.lock().unwrap().push(email);
        Ok(())
    }
}
