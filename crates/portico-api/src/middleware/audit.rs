//! Security audit logging
//!
//! Structured events on the `audit` target for authentication outcomes, permission
//! denials and changes to credentials and memberships. Filter with `RUST_LOG=audit=info`.

use portico_core::models::{ApiKeyId, InvitationId, OrganizationId, Role, UserId};
use serde::Serialize;

/// Audit event types for categorization
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventType {
    AuthenticationSuccess,
    AuthenticationFailure,
    PermissionDenied,
    OrganizationCreated,
    ApiKeyCreated,
    ApiKeyDisabled,
    ApiKeyEnabled,
    ApiKeyDeleted,
    InvitationCreated,
    InvitationRedeemed,
    RateLimitExceeded,
}

/// Which credential an authentication event concerns.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AuthMethod {
    Session,
    ApiKey,
}

/// Structured audit log entry
#[derive(Debug, Serialize)]
pub struct AuditLogEntry {
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub event_type: AuditEventType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub organization_id: Option<OrganizationId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<UserId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key_id: Option<ApiKeyId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_ip: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl AuditLogEntry {
    pub fn new(event_type: AuditEventType) -> Self {
        Self {
            timestamp: chrono::Utc::now(),
            event_type,
            organization_id: None,
            user_id: None,
            api_key_id: None,
            client_ip: None,
            request_path: None,
            details: None,
            success: true,
            error_message: None,
        }
    }

    pub fn with_organization_id(mut self, organization_id: Option<&OrganizationId>) -> Self {
        self.organization_id = organization_id.cloned();
        self
    }

    pub fn with_user_id(mut self, user_id: Option<&UserId>) -> Self {
        self.user_id = user_id.cloned();
        self
    }

    pub fn with_api_key_id(mut self, api_key_id: Option<&ApiKeyId>) -> Self {
        self.api_key_id = api_key_id.cloned();
        self
    }

    pub fn with_client_ip(mut self, client_ip: Option<String>) -> Self {
        self.client_ip = client_ip;
        self
    }

    pub fn with_request_path(mut self, path: Option<String>) -> Self {
        self.request_path = path;
        self
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Mark as failure
    pub fn with_failure(mut self, error_message: impl Into<String>) -> Self {
        self.success = false;
        self.error_message = Some(error_message.into());
        self
    }

    pub fn log(&self) {
        let json = serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string());

        if self.success {
            tracing::event!(
                target: "audit",
                tracing::Level::INFO,
                audit_entry = %json,
                event_type = ?self.event_type,
                organization_id = ?self.organization_id,
                user_id = ?self.user_id,
                success = self.success,
                "Security audit log"
            );
        } else {
            tracing::event!(
                target: "audit",
                tracing::Level::WARN,
                audit_entry = %json,
                event_type = ?self.event_type,
                organization_id = ?self.organization_id,
                user_id = ?self.user_id,
                success = self.success,
                error = ?self.error_message,
                "Security audit log - failure"
            );
        }
    }
}

pub fn log_authentication_attempt(
    method: AuthMethod,
    organization_id: Option<&OrganizationId>,
    user_id: Option<&UserId>,
    api_key_id: Option<&ApiKeyId>,
    client_ip: Option<String>,
    error_code: Option<&str>,
) {
    let event_type = if error_code.is_none() {
        AuditEventType::AuthenticationSuccess
    } else {
        AuditEventType::AuthenticationFailure
    };

    let mut entry = AuditLogEntry::new(event_type)
        .with_organization_id(organization_id)
        .with_user_id(user_id)
        .with_api_key_id(api_key_id)
        .with_client_ip(client_ip)
        .with_details(serde_json::json!({ "method": method }));

    if let Some(code) = error_code {
        entry = entry.with_failure(code);
    }

    entry.log();
}

pub fn log_permission_denied(
    organization_id: Option<&OrganizationId>,
    user_id: Option<&UserId>,
    request_path: Option<String>,
    error_code: &str,
) {
    AuditLogEntry::new(AuditEventType::PermissionDenied)
        .with_organization_id(organization_id)
        .with_user_id(user_id)
        .with_request_path(request_path)
        .with_failure(error_code)
        .log();
}

pub fn log_organization_created(organization_id: &OrganizationId, owner_id: &UserId) {
    AuditLogEntry::new(AuditEventType::OrganizationCreated)
        .with_organization_id(Some(organization_id))
        .with_user_id(Some(owner_id))
        .log();
}

pub fn log_api_key_created(
    organization_id: &OrganizationId,
    api_key_id: &ApiKeyId,
    user_id: &UserId,
) {
    AuditLogEntry::new(AuditEventType::ApiKeyCreated)
        .with_organization_id(Some(organization_id))
        .with_api_key_id(Some(api_key_id))
        .with_user_id(Some(user_id))
        .log();
}

pub fn log_api_key_toggled(
    organization_id: &OrganizationId,
    api_key_id: &ApiKeyId,
    user_id: &UserId,
    disabled: bool,
) {
    let event_type = if disabled {
        AuditEventType::ApiKeyDisabled
    } else {
        AuditEventType::ApiKeyEnabled
    };
    AuditLogEntry::new(event_type)
        .with_organization_id(Some(organization_id))
        .with_api_key_id(Some(api_key_id))
        .with_user_id(Some(user_id))
        .log();
}

pub fn log_api_key_deleted(
    organization_id: &OrganizationId,
    api_key_id: &ApiKeyId,
    user_id: &UserId,
) {
    AuditLogEntry::new(AuditEventType::ApiKeyDeleted)
        .with_organization_id(Some(organization_id))
        .with_api_key_id(Some(api_key_id))
        .with_user_id(Some(user_id))
        .log();
}

pub fn log_invitation_created(
    organization_id: &OrganizationId,
    invitation_id: &InvitationId,
    inviter_id: &UserId,
    role: Role,
) {
    AuditLogEntry::new(AuditEventType::InvitationCreated)
        .with_organization_id(Some(organization_id))
        .with_user_id(Some(inviter_id))
        .with_details(serde_json::json!({ "invitation_id": invitation_id, "role": role }))
        .log();
}

pub fn log_invitation_redeemed(organization_id: &OrganizationId, user_id: &UserId, role: Role) {
    AuditLogEntry::new(AuditEventType::InvitationRedeemed)
        .with_organization_id(Some(organization_id))
        .with_user_id(Some(user_id))
        .with_details(serde_json::json!({ "role": role }))
        .log();
}

pub fn log_rate_limit_exceeded(
    key: &str,
    client_ip: Option<String>,
    request_path: String,
    limit: u32,
) {
    AuditLogEntry::new(AuditEventType::RateLimitExceeded)
        .with_client_ip(client_ip)
        .with_request_path(Some(request_path))
        .with_details(serde_json::json!({ "key": key, "rate_limit": limit }))
        .with_failure("Rate limit exceeded")
        .log();
}
