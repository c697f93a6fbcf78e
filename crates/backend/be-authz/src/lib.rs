//! Request guards shared by every service router: bearer authentication,
//! role checks, per-IP rate limiting and the JSON error envelope.

mod axum_layer;
mod body;
mod claims;
mod error;
pub mod rate_limit;

pub use axum_layer::{authenticate, require_roles};
pub use be_auth_core::*;
pub use body::JsonBody;
pub use claims::{AuthUser, parse_user_id};
pub use error::{AuthzError, ErrorBody};
pub use rate_limit::{ClientIp, RateLimit, RateLimitPolicy, client_ip, rate_limit};
