//! Shared service key registry.
//!
//! The registry maps a service name to its single active API key. It is the
//! only shared mutable state on the admission path: every service-plane
//! request reads it, and key sync writes it.
//!
//! # Layers
//!
//! ```text
//! ┌────────────────────────────────────────────────────┐
//! │ KeyRegistry   timeout + cancellation + metrics     │
//! ├────────────────────────────────────────────────────┤
//! │ dyn KeyStore  get / set / exists / ping            │
//! ├───────────────────────────┬────────────────────────┤
//! │ MongoKeyStore             │ MemoryKeyStore         │
//! └───────────────────────────┴────────────────────────┘
//! ```
//!
//! Store implementations never translate a failure into "key absent"; that
//! decision belongs to the caller.

mod memory;
mod mongo;

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use subtle::ConstantTimeEq;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::Config;
use crate::metrics;

pub use memory::MemoryKeyStore;
pub use mongo::MongoKeyStore;

/// URI scheme selecting the in-process store.
pub const MEMORY_STORE_URI: &str = "memory://";

/// Errors raised by a key store.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("key store unreachable: {0}")]
    Unavailable(String),

    #[error("key store operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("key store operation cancelled")]
    Cancelled,

    #[error("corrupt key store record for '{service}': {reason}")]
    Corrupt { service: String, reason: String },
}

impl StoreError {
    /// Short label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            StoreError::Unavailable(_) => "unavailable",
            StoreError::Timeout(_) => "timeout",
            StoreError::Cancelled => "cancelled",
            StoreError::Corrupt { .. } => "corrupt",
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// An API key. Never printed, compared in constant time.
#[derive(Clone)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Raw secret, for persisting.
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Constant-time comparison against a presented key.
    pub fn matches(&self, presented: &str) -> bool {
        self.0.as_bytes().ct_eq(presented.as_bytes()).into()
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(<redacted>)")
    }
}

/// A registered service and its current key.
#[derive(Debug, Clone)]
pub struct ServiceIdentity {
    pub name: String,
    pub api_key: ApiKey,
    /// Keys past this instant never admit, but still count as existing.
    pub expires_at: Option<DateTime<Utc>>,
}

impl ServiceIdentity {
    pub fn new(name: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            api_key: ApiKey::new(api_key),
            expires_at: None,
        }
    }

    pub fn with_expiry(mut self, expires_at: Option<DateTime<Utc>>) -> Self {
        self.expires_at = expires_at;
        self
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// Storage contract for the service key registry.
///
/// `set` is an unconditional overwrite; implementations must make it atomic
/// per service name so readers observe either the old or the new key.
#[async_trait]
pub trait KeyStore: Send + Sync {
    /// Current identity for `service`, or `None` if never registered.
    async fn get(&self, service: &str) -> StoreResult<Option<ServiceIdentity>>;

    /// Insert or replace the identity keyed by `identity.name`.
    async fn set(&self, identity: ServiceIdentity) -> StoreResult<()>;

    /// Whether any key (expired or not) is registered for `service`.
    async fn exists(&self, service: &str) -> StoreResult<bool>;

    /// Round trip to the backend.
    async fn ping(&self) -> StoreResult<()>;
}

/// Open the store selected by `config.store_uri`.
pub async fn connect(config: &Config) -> StoreResult<Arc<dyn KeyStore>> {
    if config.store_uri.starts_with(MEMORY_STORE_URI) {
        warn!("Using in-memory key store; keys are lost on restart and not shared");
        return Ok(Arc::new(MemoryKeyStore::new()));
    }

    let store = MongoKeyStore::connect(config).await?;
    Ok(Arc::new(store))
}

/// Deadline-bounded front for a [`KeyStore`].
///
/// Every call is raced against the configured operation timeout (shortened
/// by a per-request deadline when given) and the shutdown token.
#[derive(Clone)]
pub struct KeyRegistry {
    store: Arc<dyn KeyStore>,
    timeout: Duration,
    cancel: CancellationToken,
}

impl KeyRegistry {
    pub fn new(store: Arc<dyn KeyStore>, timeout: Duration) -> Self {
        Self {
            store,
            timeout,
            cancel: CancellationToken::new(),
        }
    }

    /// Abort in-flight and future calls once `cancel` fires.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn operation_timeout(&self) -> Duration {
        self.timeout
    }

    pub async fn get(
        &self,
        service: &str,
        deadline: Option<Duration>,
    ) -> StoreResult<Option<ServiceIdentity>> {
        self.bounded("get", deadline, self.store.get(service)).await
    }

    pub async fn set(
        &self,
        identity: ServiceIdentity,
        deadline: Option<Duration>,
    ) -> StoreResult<()> {
        self.bounded("set", deadline, self.store.set(identity)).await
    }

    pub async fn exists(&self, service: &str, deadline: Option<Duration>) -> StoreResult<bool> {
        self.bounded("exists", deadline, self.store.exists(service))
            .await
    }

    /// Startup connectivity probe with its own timeout.
    pub async fn health_check(&self, timeout: Duration) -> StoreResult<()> {
        self.bounded("ping", Some(timeout), self.store.ping()).await?;
        debug!(?timeout, "Key store health check passed");
        Ok(())
    }

    async fn bounded<T, F>(
        &self,
        op: &'static str,
        deadline: Option<Duration>,
        fut: F,
    ) -> StoreResult<T>
    where
        F: Future<Output = StoreResult<T>>,
    {
        let limit = deadline.map_or(self.timeout, |d| d.min(self.timeout));
        let started = Instant::now();

        let result = tokio::select! {
            biased;

            _ = self.cancel.cancelled() => Err(StoreError::Cancelled),
            outcome = tokio::time::timeout(limit, fut) => {
                outcome.unwrap_or(Err(StoreError::Timeout(limit)))
            }
        };

        metrics::record_store_duration(op, started.elapsed().as_secs_f64());
        match &result {
            Ok(_) => debug!(op, elapsed_ms = started.elapsed().as_millis() as u64, "Key store call"),
            Err(e) => metrics::record_store_error(op, e.kind()),
        }

        result
    }
}
