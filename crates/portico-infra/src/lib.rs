//! Portico Infrastructure Library
//!
//! Shared infrastructure components:
//! - Middleware (request ID)
//! - Tracing initialization
//! - Rate-limit stores

#[cfg(feature = "middleware")]
pub mod middleware;

#[cfg(feature = "observability-basic")]
pub mod telemetry;

#[cfg(feature = "rate-limit")]
pub mod rate_limit;

// Re-export commonly used types
#[cfg(feature = "middleware")]
pub use middleware::{get_request_id, request_id_middleware, RequestId};

#[cfg(feature = "observability-basic")]
pub use telemetry::{init_telemetry, shutdown_telemetry};

#[cfg(feature = "rate-limit")]
pub use rate_limit::{InMemoryRateLimitStore, RateLimitStore};
