//! Authentication: browser sessions, API keys and the request extractors built on them.

pub mod api_key;
pub mod extractors;
pub mod session;

pub use api_key::{api_key_auth_middleware, ApiKeyAuth};
pub use extractors::{CurrentUser, MaybeUser, OrganizationContext, RequestHints};
pub use session::{JwtClaims, JwtSessionProvider, SessionProvider};
