//! Role to permission table.
//!
//! Every role is listed explicitly. Nothing else in the codebase compares role names;
//! callers ask for a permission. The roles a member may hand out to others are a
//! second table kept beside the permission sets.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use utoipa::ToSchema;

use crate::models::Role;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Permission {
    ViewFeedback,
    CreateFeedback,
    EditFeedback,
    DeleteFeedback,
    UpdateFeedbackStatus,
    SubmitOnBehalf,
    Comment,
    ModerateComments,
    Vote,
    ViewAnalytics,
    ViewMembers,
    ManageMembers,
    ManageApiKeys,
    ManageWebhooks,
    ManageSettings,
    DeleteOrganization,
}

use Permission::*;

const OWNER: &[Permission] = &[
    ViewFeedback,
    CreateFeedback,
    EditFeedback,
    DeleteFeedback,
    UpdateFeedbackStatus,
    SubmitOnBehalf,
    Comment,
    ModerateComments,
    Vote,
    ViewAnalytics,
    ViewMembers,
    ManageMembers,
    ManageApiKeys,
    ManageWebhooks,
    ManageSettings,
    DeleteOrganization,
];

const ADMIN: &[Permission] = &[
    ViewFeedback,
    CreateFeedback,
    EditFeedback,
    DeleteFeedback,
    UpdateFeedbackStatus,
    SubmitOnBehalf,
    Comment,
    ModerateComments,
    Vote,
    ViewAnalytics,
    ViewMembers,
    ManageMembers,
    ManageApiKeys,
    ManageWebhooks,
    ManageSettings,
];

const PRODUCT_MANAGER: &[Permission] = &[
    ViewFeedback,
    CreateFeedback,
    EditFeedback,
    DeleteFeedback,
    UpdateFeedbackStatus,
    SubmitOnBehalf,
    Comment,
    ModerateComments,
    Vote,
    ViewAnalytics,
    ViewMembers,
    ManageApiKeys,
];

const DEVELOPER: &[Permission] = &[
    ViewFeedback,
    CreateFeedback,
    UpdateFeedbackStatus,
    Comment,
    Vote,
    ViewAnalytics,
    ViewMembers,
];

const CUSTOMER_SUPPORT: &[Permission] = &[
    ViewFeedback,
    CreateFeedback,
    SubmitOnBehalf,
    Comment,
    ModerateComments,
    Vote,
    ViewMembers,
];

const CUSTOMER: &[Permission] = &[ViewFeedback, CreateFeedback, Comment, Vote];

impl Permission {
    pub fn as_str(&self) -> &'static str {
        match self {
            ViewFeedback => "VIEW_FEEDBACK",
            CreateFeedback => "CREATE_FEEDBACK",
            EditFeedback => "EDIT_FEEDBACK",
            DeleteFeedback => "DELETE_FEEDBACK",
            UpdateFeedbackStatus => "UPDATE_FEEDBACK_STATUS",
            SubmitOnBehalf => "SUBMIT_ON_BEHALF",
            Comment => "COMMENT",
            ModerateComments => "MODERATE_COMMENTS",
            Vote => "VOTE",
            ViewAnalytics => "VIEW_ANALYTICS",
            ViewMembers => "VIEW_MEMBERS",
            ManageMembers => "MANAGE_MEMBERS",
            ManageApiKeys => "MANAGE_API_KEYS",
            ManageWebhooks => "MANAGE_WEBHOOKS",
            ManageSettings => "MANAGE_SETTINGS",
            DeleteOrganization => "DELETE_ORGANIZATION",
        }
    }
}

impl Display for Permission {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

/// Permission set granted to a role.
pub fn permissions_for(role: Role) -> &'static [Permission] {
    match role {
        Role::Owner => OWNER,
        Role::Admin => ADMIN,
        Role::ProductManager => PRODUCT_MANAGER,
        Role::Developer => DEVELOPER,
        Role::CustomerSupport => CUSTOMER_SUPPORT,
        Role::Customer => CUSTOMER,
    }
}

/// Roles a holder of `role` may hand out, e.g. through an invitation.
pub fn grantable_roles(role: Role) -> &'static [Role] {
    match role {
        Role::Owner => &Role::ALL,
        Role::Admin => &[
            Role::Admin,
            Role::ProductManager,
            Role::Developer,
            Role::CustomerSupport,
            Role::Customer,
        ],
        Role::ProductManager => &[
            Role::ProductManager,
            Role::Developer,
            Role::CustomerSupport,
            Role::Customer,
        ],
        Role::Developer => &[Role::Developer, Role::CustomerSupport, Role::Customer],
        Role::CustomerSupport => &[Role::CustomerSupport, Role::Customer],
        Role::Customer => &[Role::Customer],
    }
}

/// A missing role grants nothing.
pub fn can_grant_role(granter: Option<Role>, role: Role) -> bool {
    granter.is_some_and(|granter| grantable_roles(granter).contains(&role))
}

/// A missing role denies everything.
pub fn has_permission(role: Option<Role>, permission: Permission) -> bool {
    role.is_some_and(|role| permissions_for(role).contains(&permission))
}

/// True only if the role holds every listed permission.
pub fn has_all_permissions(role: Option<Role>, permissions: &[Permission]) -> bool {
    role.is_some() && permissions.iter().all(|p| has_permission(role, *p))
}

pub fn can_submit_on_behalf(role: Option<Role>) -> bool {
    has_permission(role, SubmitOnBehalf)
}

pub fn can_update_feedback_status(role: Option<Role>) -> bool {
    has_permission(role, UpdateFeedbackStatus)
}

pub fn can_delete_feedback(role: Option<Role>) -> bool {
    has_permission(role, DeleteFeedback)
}

pub fn can_edit_feedback(role: Option<Role>) -> bool {
    has_permission(role, EditFeedback)
}
