//! Opaque identifier newtypes.
//!
//! Identifiers are issued by the auth provider (users) or generated here (everything else)
//! and are treated as opaque strings. Wrapping them keeps an organization id from being
//! passed where a user id is expected.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use utoipa::ToSchema;
use uuid::Uuid;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema,
        )]
        #[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
        #[cfg_attr(feature = "sqlx", sqlx(transparent))]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            /// Fresh random identifier.
            pub fn generate() -> Self {
                Self(Uuid::new_v4().to_string())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

string_id!(
    /// Tenant identifier.
    OrganizationId
);
string_id!(
    /// Identity issued by the session provider.
    UserId
);
string_id!(MembershipId);
string_id!(InvitationId);
string_id!(ApiKeyId);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_ids_are_distinct() {
        assert_ne!(OrganizationId::generate(), OrganizationId::generate());
    }

    #[test]
    fn ids_serialize_as_plain_strings() {
        let id = OrganizationId::from("org_1");
        assert_eq!(serde_json::to_value(&id).unwrap(), serde_json::json!("org_1"));
        assert_eq!(id.to_string(), "org_1");
    }
}
