use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Key sync payload.
///
/// `service` and `key` default to empty so that a missing field surfaces as a
/// validation error rather than a parse error.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SyncKeyRequest {
    #[serde(default)]
    pub service: String,
    #[serde(default)]
    pub key: String,
    /// Optional expiry; lookups after this instant never admit
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

/// Response after a successful key sync.
#[derive(Debug, Serialize)]
pub struct SyncKeyResponse {
    pub service: String,
    pub synced: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

/// Bootstrap completion probe.
///
/// `auth_key` reports the primary bootstrap identity in the form operators
/// already check for; `services` lists every bootstrap-eligible identity.
#[derive(Debug, Serialize)]
pub struct BootstrapStatusResponse {
    pub auth_key: &'static str,
    pub services: BTreeMap<String, bool>,
}

impl BootstrapStatusResponse {
    pub const RECEIVED: &'static str = "received";
    pub const NOT_RECEIVED: &'static str = "not received";
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// "healthy" or "degraded"
    pub status: String,
    pub service: String,
    pub store_reachable: bool,
    pub uptime_seconds: u64,
    pub version: String,
    pub timestamp: DateTime<Utc>,
}

/// Admitted service-plane caller, as seen by a handler.
#[derive(Debug, Serialize)]
pub struct WhoAmIResponse {
    pub service: String,
    pub via: &'static str,
}

/// Admitted user-plane caller, as seen by a handler.
#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub account_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub roles: Option<serde_json::Value>,
}
