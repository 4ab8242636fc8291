pub mod audit;
pub mod rate_limit;

pub use portico_infra::{get_request_id, request_id_middleware};
pub use rate_limit::rate_limit_middleware;
