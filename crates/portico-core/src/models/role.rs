use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;
use utoipa::ToSchema;

/// Role a user holds inside one organization.
///
/// This is a closed set: there is no implicit default. Code that has no membership to
/// read a role from must decide explicitly what that means (usually: deny).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, ToSchema)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(
    feature = "sqlx",
    sqlx(type_name = "member_role", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Owner,
    Admin,
    ProductManager,
    Developer,
    CustomerSupport,
    Customer,
}

impl Role {
    pub const ALL: [Role; 6] = [
        Role::Owner,
        Role::Admin,
        Role::ProductManager,
        Role::Developer,
        Role::CustomerSupport,
        Role::Customer,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Owner => "owner",
            Role::Admin => "admin",
            Role::ProductManager => "product_manager",
            Role::Developer => "developer",
            Role::CustomerSupport => "customer_support",
            Role::Customer => "customer",
        }
    }
}

impl Display for Role {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "owner" => Ok(Role::Owner),
            "admin" => Ok(Role::Admin),
            "product_manager" => Ok(Role::ProductManager),
            "developer" => Ok(Role::Developer),
            "customer_support" => Ok(Role::CustomerSupport),
            "customer" => Ok(Role::Customer),
            _ => Err(anyhow::anyhow!("Invalid role: {}", s)),
        }
    }
}
