//! Per-request caller identities inserted into request extensions by the gates.

/// How a service-plane caller got in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdmissionPath {
    /// Presented the key registered for its name.
    RegisteredKey,
    /// Presented the bootstrap token before any key existed for its name.
    Bootstrap,
}

impl AdmissionPath {
    pub fn as_str(self) -> &'static str {
        match self {
            AdmissionPath::RegisteredKey => "key",
            AdmissionPath::Bootstrap => "bootstrap",
        }
    }
}

/// Admitted service-plane caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub service: String,
    pub path: AdmissionPath,
}

/// Claims of an admitted user-plane caller.
///
/// `roles` is whatever the token carried under `roles`; its shape is left to
/// downstream authorization.
#[derive(Debug, Clone, PartialEq)]
pub struct UserClaims {
    pub account_id: String,
    pub roles: Option<serde_json::Value>,
}
