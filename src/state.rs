//! Shared application state for Axum handlers.
//!
//! Holds the trust decision logic (and through it the key registry), the
//! configuration, and the structured-concurrency handles used for background
//! work.
//!
//! # Structured Concurrency
//!
//! Background tasks are spawned on a `TaskTracker` and observe a
//! `CancellationToken`. The same token bounds every in-flight key store call,
//! so `shutdown()` also aborts lookups that are still waiting on the store.

use std::sync::Arc;
use std::time::Instant;

use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::info;

use crate::announce;
use crate::config::Config;
use crate::store::{KeyRegistry, KeyStore};
use crate::trust::TrustBootstrap;

/// Shared application state for Axum handlers.
///
/// Cloned per request; everything inside is reference counted.
#[derive(Clone)]
pub struct AppState {
    /// Service-plane decision logic and the registry it reads
    pub trust: TrustBootstrap,
    /// Application configuration
    pub config: Arc<Config>,
    /// Timestamp when the application started
    pub started_at: Instant,
    /// Tracks spawned background tasks for graceful shutdown
    task_tracker: TaskTracker,
    /// Cancels background tasks and pending store calls
    cancellation_token: CancellationToken,
}

impl AppState {
    /// Wire state around an opened key store.
    pub fn new(store: Arc<dyn KeyStore>, config: Config) -> Self {
        let cancellation_token = CancellationToken::new();
        let registry = KeyRegistry::new(store, config.store_timeout)
            .with_cancellation(cancellation_token.clone());
        let trust = TrustBootstrap::from_config(registry, &config);

        Self {
            trust,
            config: Arc::new(config),
            started_at: Instant::now(),
            task_tracker: TaskTracker::new(),
            cancellation_token,
        }
    }

    pub fn registry(&self) -> &KeyRegistry {
        self.trust.registry()
    }

    /// Whether `service` may write keys through the sync endpoint.
    ///
    /// An empty writer list admits every authenticated service.
    pub fn may_sync(&self, service: &str) -> bool {
        let writers = &self.config.sync_writers;
        writers.is_empty() || writers.iter().any(|w| w == service)
    }

    /// Whether `service` must hold a non-expiring key.
    ///
    /// Sync writers and bootstrap-eligible services rotate their own keys; an
    /// expired key would lock them out of both the key path and bootstrap.
    pub fn requires_permanent_key(&self, service: &str) -> bool {
        self.config.sync_writers.iter().any(|w| w == service)
            || self.trust.is_bootstrap_eligible(service)
    }

    /// Spawn self-registration and the route catalog push.
    pub fn start_announcements(&self) {
        announce::spawn(
            &self.task_tracker,
            self.cancellation_token.clone(),
            self.config.clone(),
        );
    }

    /// Gracefully shutdown all background tasks.
    ///
    /// 1. Signals all tasks (and pending store calls) to stop
    /// 2. Closes the task tracker
    /// 3. Waits for all tasks to complete
    pub async fn shutdown(&self) {
        info!("Initiating graceful shutdown of background tasks");

        self.cancellation_token.cancel();
        self.task_tracker.close();
        self.task_tracker.wait().await;

        info!("All background tasks have completed");
    }

    /// Get the application uptime in seconds.
    pub fn uptime_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}
