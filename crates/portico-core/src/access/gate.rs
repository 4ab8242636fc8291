use crate::access::permissions::{has_permission, Permission};
use crate::error::AppError;
use crate::models::Role;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AccessDenial {
    #[error("Authentication required")]
    Unauthenticated,
    #[error("Missing permission {0}")]
    Forbidden(Permission),
}

impl From<AccessDenial> for AppError {
    fn from(denial: AccessDenial) -> Self {
        match denial {
            AccessDenial::Unauthenticated => {
                AppError::Unauthorized("Authentication required".to_string())
            }
            AccessDenial::Forbidden(permission) => {
                AppError::Forbidden(format!("Missing permission: {}", permission))
            }
        }
    }
}

/// Allow when `role` holds `permission`. No role at all is an authentication failure (401);
/// a role lacking the permission is a 403.
pub fn require_permission(permission: Permission, role: Option<Role>) -> Result<(), AccessDenial> {
    match role {
        None => Err(AccessDenial::Unauthenticated),
        Some(_) if has_permission(role, permission) => Ok(()),
        Some(_) => Err(AccessDenial::Forbidden(permission)),
    }
}
