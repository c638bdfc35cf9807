mod health;
mod identity;
mod status;
mod sync;

pub use health::{health_check, readiness_check};
pub use identity::{me, not_found, whoami};
pub use status::bootstrap_status;
pub use sync::sync_key;
