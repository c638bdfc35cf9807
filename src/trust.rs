//! Service-plane admission decision.
//!
//! # Decision Procedure
//!
//! ```text
//! X-Service-Name + X-API-Key present? ── no ──► reject "missing service name or key"
//!            │ yes
//!            ▼
//! registry.get(service)  (one bounded round trip)
//!            │
//!   stored key live and equal? ── yes ──► admit (RegisteredKey)
//!            │ no
//!            ▼
//!   bootstrap-eligible name, token configured,
//!   lookup proved no key exists, X-Bootstrap-Token equal? ── yes ──► admit (Bootstrap)
//!            │ no
//!            ▼
//!   reject "invalid API key"
//! ```
//!
//! A failed lookup (unreachable, timeout, cancelled) proves nothing about the
//! key, so it can neither admit via key nor open the bootstrap path.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use axum::http::HeaderMap;
use chrono::Utc;
use subtle::ConstantTimeEq;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::AppError;
use crate::models::{AdmissionPath, Caller};
use crate::store::{KeyRegistry, StoreResult};

/// Header carrying the caller's declared service name.
pub const SERVICE_NAME_HEADER: &str = "x-service-name";

/// Header carrying the caller's API key.
pub const SERVICE_KEY_HEADER: &str = "x-api-key";

/// Header carrying the bootstrap token.
pub const BOOTSTRAP_TOKEN_HEADER: &str = "x-bootstrap-token";

/// Process-wide bootstrap secret.
#[derive(Clone)]
pub struct BootstrapToken(String);

impl BootstrapToken {
    /// `None` for an empty token, which leaves the bootstrap exception inert.
    pub fn new(token: impl Into<String>) -> Option<Self> {
        let token = token.into();
        (!token.is_empty()).then_some(Self(token))
    }

    /// Byte-exact, constant-time comparison.
    pub fn matches(&self, presented: &str) -> bool {
        self.0.as_bytes().ct_eq(presented.as_bytes()).into()
    }
}

impl fmt::Debug for BootstrapToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("BootstrapToken(<redacted>)")
    }
}

/// Why a service-plane request was turned away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    MissingCredentials,
    InvalidKey,
}

impl Rejection {
    pub fn message(self) -> &'static str {
        match self {
            Rejection::MissingCredentials => "missing service name or key",
            Rejection::InvalidKey => "invalid API key",
        }
    }
}

impl From<Rejection> for AppError {
    fn from(rejection: Rejection) -> Self {
        AppError::unauthorized_service(rejection.message())
    }
}

/// Credentials presented on one request, borrowed from its headers.
#[derive(Debug, Clone, Copy)]
pub struct ServiceCredentials<'a> {
    pub service: &'a str,
    pub key: &'a str,
    pub bootstrap_token: Option<&'a str>,
}

impl<'a> ServiceCredentials<'a> {
    /// Read the service-plane headers. Absent, empty, or non-UTF-8 name or
    /// key values count as missing.
    pub fn from_headers(headers: &'a HeaderMap) -> Result<Self, Rejection> {
        let service = header_str(headers, SERVICE_NAME_HEADER);
        let key = header_str(headers, SERVICE_KEY_HEADER);

        match (service, key) {
            (Some(service), Some(key)) => Ok(Self {
                service,
                key,
                bootstrap_token: header_str(headers, BOOTSTRAP_TOKEN_HEADER),
            }),
            _ => Err(Rejection::MissingCredentials),
        }
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
}

/// What the single lookup established about the declared service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum KeyPresence {
    Present,
    Absent,
    Unknown,
}

/// Service-plane admission logic, including the bootstrap exception.
#[derive(Clone)]
pub struct TrustBootstrap {
    registry: KeyRegistry,
    bootstrap_token: Option<Arc<BootstrapToken>>,
    bootstrap_services: Arc<[String]>,
}

impl TrustBootstrap {
    pub fn new(
        registry: KeyRegistry,
        bootstrap_token: Option<String>,
        bootstrap_services: Vec<String>,
    ) -> Self {
        Self {
            registry,
            bootstrap_token: bootstrap_token
                .and_then(BootstrapToken::new)
                .map(Arc::new),
            bootstrap_services: bootstrap_services.into(),
        }
    }

    pub fn from_config(registry: KeyRegistry, config: &Config) -> Self {
        Self::new(
            registry,
            config.bootstrap_token.clone(),
            config.bootstrap_services.clone(),
        )
    }

    pub fn registry(&self) -> &KeyRegistry {
        &self.registry
    }

    pub fn bootstrap_services(&self) -> &[String] {
        &self.bootstrap_services
    }

    pub fn is_bootstrap_eligible(&self, service: &str) -> bool {
        self.bootstrap_services.iter().any(|s| s == service)
    }

    /// Decide one request. Exactly one registry round trip.
    pub async fn decide(
        &self,
        credentials: &ServiceCredentials<'_>,
        deadline: Option<Duration>,
    ) -> Result<Caller, Rejection> {
        let service = credentials.service;

        let presence = match self.registry.get(service, deadline).await {
            Ok(Some(identity)) => {
                if identity.is_expired_at(Utc::now()) {
                    debug!(service, "Stored key has expired");
                } else if identity.api_key.matches(credentials.key) {
                    debug!(service, "Service key accepted");
                    return Ok(Caller {
                        service: service.to_string(),
                        path: AdmissionPath::RegisteredKey,
                    });
                }
                KeyPresence::Present
            }
            Ok(None) => KeyPresence::Absent,
            Err(e) => {
                warn!(service, error = %e, "Key lookup failed, treating as failed lookup");
                KeyPresence::Unknown
            }
        };

        if let Some(expected) = &self.bootstrap_token
            && self.is_bootstrap_eligible(service)
            && let Some(presented) = credentials.bootstrap_token
        {
            let token_ok = expected.matches(presented);
            match presence {
                KeyPresence::Absent if token_ok => {
                    info!(service, "Bootstrap token accepted for first-time sync");
                    return Ok(Caller {
                        service: service.to_string(),
                        path: AdmissionPath::Bootstrap,
                    });
                }
                KeyPresence::Present if token_ok => {
                    warn!(
                        service,
                        "Bootstrap token presented after key registration; bootstrap is closed"
                    );
                }
                _ => {}
            }
        }

        Err(Rejection::InvalidKey)
    }

    /// Whether each bootstrap-eligible service has registered a key.
    pub async fn bootstrap_status(
        &self,
        deadline: Option<Duration>,
    ) -> StoreResult<BTreeMap<String, bool>> {
        let mut status = BTreeMap::new();
        for service in self.bootstrap_services.iter() {
            let registered = self.registry.exists(service, deadline).await?;
            status.insert(service.clone(), registered);
        }
        Ok(status)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    use async_trait::async_trait;
    use axum::http::HeaderValue;

    use crate::store::{KeyStore, MemoryKeyStore, ServiceIdentity, StoreError};

    const TOKEN: &str = "boot-secret";

    struct UnreachableStore;

    #[async_trait]
    impl KeyStore for UnreachableStore {
        async fn get(&self, _service: &str) -> StoreResult<Option<ServiceIdentity>> {
            Err(StoreError::Unavailable("connection refused".into()))
        }
        async fn set(&self, _identity: ServiceIdentity) -> StoreResult<()> {
            Err(StoreError::Unavailable("connection refused".into()))
        }
        async fn exists(&self, _service: &str) -> StoreResult<bool> {
            Err(StoreError::Unavailable("connection refused".into()))
        }
        async fn ping(&self) -> StoreResult<()> {
            Err(StoreError::Unavailable("connection refused".into()))
        }
    }

    async fn trust_with(keys: &[(&str, &str)], token: Option<&str>) -> TrustBootstrap {
        let store = Arc::new(MemoryKeyStore::new());
        for (service, key) in keys {
            store.set(ServiceIdentity::new(*service, *key)).await.unwrap();
        }
        let registry = KeyRegistry::new(store, Duration::from_secs(1));
        TrustBootstrap::new(registry, token.map(String::from), vec!["auth".to_string()])
    }

    fn creds<'a>(service: &'a str, key: &'a str, boot: Option<&'a str>) -> ServiceCredentials<'a> {
        ServiceCredentials {
            service,
            key,
            bootstrap_token: boot,
        }
    }

    #[test]
    fn test_credentials_from_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(SERVICE_NAME_HEADER, HeaderValue::from_static("billing"));
        headers.insert(SERVICE_KEY_HEADER, HeaderValue::from_static("abc"));

        let c = ServiceCredentials::from_headers(&headers).unwrap();
        assert_eq!(c.service, "billing");
        assert_eq!(c.key, "abc");
        assert!(c.bootstrap_token.is_none());
    }

    #[test]
    fn test_credentials_missing_or_empty() {
        let cases: [&[(&str, &str)]; 4] = [
            &[],
            &[(SERVICE_NAME_HEADER, "billing")],
            &[(SERVICE_KEY_HEADER, "abc"), (BOOTSTRAP_TOKEN_HEADER, TOKEN)],
            &[(SERVICE_NAME_HEADER, ""), (SERVICE_KEY_HEADER, "abc")],
        ];

        for pairs in cases {
            let mut headers = HeaderMap::new();
            for (name, value) in pairs {
                headers.insert(*name, HeaderValue::from_str(value).unwrap());
            }
            assert_eq!(
                ServiceCredentials::from_headers(&headers).unwrap_err(),
                Rejection::MissingCredentials,
                "{pairs:?}"
            );
        }
    }

    #[test]
    fn test_empty_bootstrap_token_is_inert() {
        assert!(BootstrapToken::new("").is_none());
        assert!(BootstrapToken::new("x").unwrap().matches("x"));
        assert!(!BootstrapToken::new("x").unwrap().matches("X"));
    }

    #[tokio::test]
    async fn test_registered_key_admits() {
        let trust = trust_with(&[("billing", "abc")], None).await;

        let caller = trust.decide(&creds("billing", "abc", None), None).await.unwrap();
        assert_eq!(caller.service, "billing");
        assert_eq!(caller.path, AdmissionPath::RegisteredKey);
    }

    #[tokio::test]
    async fn test_wrong_or_unknown_key_rejects() {
        let trust = trust_with(&[("billing", "abc")], Some(TOKEN)).await;

        for c in [
            creds("billing", "abd", None),
            creds("billing", "ABC", None),
            creds("orders", "abc", None),
            // bootstrap token is irrelevant for non-eligible names
            creds("orders", "abc", Some(TOKEN)),
        ] {
            assert_eq!(
                trust.decide(&c, None).await.unwrap_err(),
                Rejection::InvalidKey,
                "{c:?}"
            );
        }
    }

    #[tokio::test]
    async fn test_bootstrap_table() {
        // (registered keys, configured token, presented token, admitted)
        let cases: [(&[(&str, &str)], Option<&str>, Option<&str>, bool); 6] = [
            (&[], Some(TOKEN), Some(TOKEN), true),
            (&[], Some(TOKEN), Some("wrong"), false),
            (&[], Some(TOKEN), None, false),
            (&[], None, Some(TOKEN), false),
            (&[], Some(""), Some(""), false),
            (&[("auth", "real-key")], Some(TOKEN), Some(TOKEN), false),
        ];

        for (keys, configured, presented, admitted) in cases {
            let trust = trust_with(keys, configured).await;
            let result = trust.decide(&creds("auth", "anything", presented), None).await;

            assert_eq!(result.is_ok(), admitted, "{keys:?} {configured:?} {presented:?}");
            if let Ok(caller) = result {
                assert_eq!(caller.path, AdmissionPath::Bootstrap);
                assert_eq!(caller.service, "auth");
            }
        }
    }

    #[tokio::test]
    async fn test_bootstrap_does_not_create_key() {
        let trust = trust_with(&[], Some(TOKEN)).await;

        trust.decide(&creds("auth", "k", Some(TOKEN)), None).await.unwrap();
        assert!(!trust.registry().exists("auth", None).await.unwrap());
    }

    #[tokio::test]
    async fn test_registered_auth_key_still_admits() {
        let trust = trust_with(&[("auth", "real-key")], Some(TOKEN)).await;

        let caller = trust
            .decide(&creds("auth", "real-key", Some("ignored")), None)
            .await
            .unwrap();
        assert_eq!(caller.path, AdmissionPath::RegisteredKey);
    }

    #[tokio::test]
    async fn test_expired_key_rejects_and_keeps_bootstrap_closed() {
        let store = Arc::new(MemoryKeyStore::new());
        let expired = ServiceIdentity::new("auth", "old")
            .with_expiry(Some(Utc::now() - chrono::Duration::seconds(5)));
        store.set(expired).await.unwrap();
        let trust = TrustBootstrap::new(
            KeyRegistry::new(store, Duration::from_secs(1)),
            Some(TOKEN.to_string()),
            vec!["auth".to_string()],
        );

        assert!(trust.decide(&creds("auth", "old", None), None).await.is_err());
        assert!(
            trust
                .decide(&creds("auth", "x", Some(TOKEN)), None)
                .await
                .is_err()
        );
    }

    #[tokio::test]
    async fn test_store_failure_fails_closed() {
        let trust = TrustBootstrap::new(
            KeyRegistry::new(Arc::new(UnreachableStore), Duration::from_secs(1)),
            Some(TOKEN.to_string()),
            vec!["auth".to_string()],
        );

        assert_eq!(
            trust.decide(&creds("billing", "abc", None), None).await,
            Err(Rejection::InvalidKey)
        );
        assert_eq!(
            trust.decide(&creds("auth", "abc", Some(TOKEN)), None).await,
            Err(Rejection::InvalidKey)
        );
    }

    #[tokio::test]
    async fn test_configurable_bootstrap_set() {
        let registry = KeyRegistry::new(Arc::new(MemoryKeyStore::new()), Duration::from_secs(1));
        let trust = TrustBootstrap::new(
            registry,
            Some(TOKEN.to_string()),
            vec!["identity".to_string()],
        );

        assert!(trust.is_bootstrap_eligible("identity"));
        assert!(!trust.is_bootstrap_eligible("auth"));
        assert!(
            trust
                .decide(&creds("auth", "k", Some(TOKEN)), None)
                .await
                .is_err()
        );
        assert!(
            trust
                .decide(&creds("identity", "k", Some(TOKEN)), None)
                .await
                .is_ok()
        );
    }

    #[tokio::test]
    async fn test_bootstrap_status() {
        let trust = trust_with(&[], Some(TOKEN)).await;
        let status = trust.bootstrap_status(None).await.unwrap();
        assert_eq!(status.get("auth"), Some(&false));

        trust
            .registry()
            .set(ServiceIdentity::new("auth", "k"), None)
            .await
            .unwrap();
        let status = trust.bootstrap_status(None).await.unwrap();
        assert_eq!(status.get("auth"), Some(&true));
    }
}
