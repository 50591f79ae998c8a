pub mod rate_limit;
pub mod request_id;

pub use rate_limit::{per_ip_rate_limit, PerIpRateLimiter, RateLimitPresets};
pub use request_id::{request_id_middleware, RequestId};
