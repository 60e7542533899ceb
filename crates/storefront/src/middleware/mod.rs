//! Middleware for the storefront.

pub mod csp;
pub mod customer;
pub mod rate_limit;
pub mod request_id;
pub mod security_headers;
pub mod session;

pub use csp::{CspNonce, csp_nonce_middleware};
pub use customer::{OptionalCustomer, RequireCustomer};
pub use rate_limit::{api_rate_limiter, auth_rate_limiter};
pub use request_id::{REQUEST_ID_HEADER, request_id_middleware};
pub use security_headers::{ImageHosts, security_headers_middleware};
pub use session::{SESSION_COOKIE_NAME, create_session_layer};
