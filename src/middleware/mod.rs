//! HTTP middleware for the two admission planes.
//!
//! - **Service plane**: `X-Service-Name` + `X-API-Key` checked against the key
//!   registry, with the bootstrap exception ([`ServiceAuthLayer`])
//! - **User plane**: HMAC-signed bearer tokens ([`UserAuthLayer`])
//! - **Request Timeout**: client deadline propagated to key store calls
//!
//! # Architecture
//!
//! ```text
//! Request → Timeout → Service gate ─┬─► Handler (Caller in extensions)
//!                                   └─► 401 API-Key
//! Request → Timeout → User gate ────┬─► Handler (UserClaims in extensions)
//!                                   └─► 401 Bearer
//! ```
//!
//! Both gates compare secrets in constant time and never echo a presented
//! credential into logs or responses.

pub mod service_auth;
pub mod timeout;
pub mod user_auth;

pub use service_auth::ServiceAuthLayer;
pub use timeout::{
    MAX_REQUEST_TIMEOUT_MS, MIN_REQUEST_TIMEOUT_MS, REQUEST_TIMEOUT_HEADER, RequestTimeout,
    RequestTimeoutExt, extract_request_timeout,
};
pub use user_auth::{UserAuthLayer, extract_bearer_token};
