//! API path prefixes and wire names.

/// Dashboard API (session cookie or session bearer token)
pub const API_PREFIX: &str = "/api/v1";

/// Public API (API key)
pub const PUBLIC_API_PREFIX: &str = "/api/public/v1";

pub const X_API_KEY_HEADER: &str = "x-api-key";

pub const X_RATELIMIT_LIMIT: &str = "x-ratelimit-limit";
pub const X_RATELIMIT_REMAINING: &str = "x-ratelimit-remaining";
