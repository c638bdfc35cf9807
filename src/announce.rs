//! Best-effort startup announcements.
//!
//! Two outbound calls, both fire-and-forget:
//!
//! 1. **Self-registration**: `POST {AUTH_SERVICE_URL}/internal/register` with
//!    `X-Service-Name`, so the identity-issuing service knows to sync a key
//!    to this instance.
//! 2. **Route catalog**: after a short delay, `POST` every served route to
//!    the catalog endpoint as a JSON array.
//!
//! Failures are logged and never retried; neither call affects admission.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, bail};
use reqwest::Client;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::routes::ROUTES;
use crate::trust::SERVICE_NAME_HEADER;

/// Per-request bound for announcement calls.
const ANNOUNCE_TIMEOUT: Duration = Duration::from_secs(10);

/// Route catalog entry.
#[derive(Debug, Clone, Serialize)]
pub struct RouteRecord {
    pub id: Uuid,
    pub method: &'static str,
    pub path: &'static str,
    pub service: String,
    pub active: bool,
}

/// Catalog entries for every served route, each with a fresh id.
pub fn route_records(service: &str) -> Vec<RouteRecord> {
    ROUTES
        .iter()
        .map(|route| RouteRecord {
            id: Uuid::new_v4(),
            method: route.method,
            path: route.path,
            service: service.to_string(),
            active: true,
        })
        .collect()
}

pub fn build_client() -> anyhow::Result<Client> {
    Client::builder()
        .timeout(ANNOUNCE_TIMEOUT)
        .build()
        .context("failed to build announcement HTTP client")
}

/// Tell the identity-issuing service this instance exists.
pub async fn register_at_auth(client: &Client, base_url: &str, service: &str) -> anyhow::Result<()> {
    let url = format!("{}/internal/register", base_url.trim_end_matches('/'));

    let response = client
        .post(&url)
        .header(SERVICE_NAME_HEADER, service)
        .send()
        .await
        .with_context(|| format!("failed to register at {url}"))?;

    let status = response.status();
    if !status.is_success() {
        bail!("registration at {url} returned status {status}");
    }
    Ok(())
}

/// Push the route catalog. Returns the number of routes sent.
pub async fn push_routes(
    client: &Client,
    url: &str,
    records: &[RouteRecord],
) -> anyhow::Result<usize> {
    let response = client
        .post(url)
        .json(records)
        .send()
        .await
        .with_context(|| format!("failed to push routes to {url}"))?;

    let status = response.status();
    if !status.is_success() {
        bail!("route catalog at {url} returned status {status}");
    }
    Ok(records.len())
}

/// Spawn both announcements on `tracker`. Cancelling `cancel` abandons any
/// announcement that has not completed yet.
pub fn spawn(tracker: &TaskTracker, cancel: CancellationToken, config: Arc<Config>) {
    if config.auth_service_url.is_none() && config.route_catalog_url.is_none() {
        debug!("No announcement targets configured");
        return;
    }

    let client = match build_client() {
        Ok(client) => client,
        Err(e) => {
            warn!(error = %e, "Skipping startup announcements");
            return;
        }
    };

    if let Some(base_url) = config.auth_service_url.clone() {
        let client = client.clone();
        let cancel = cancel.clone();
        let service = config.service_name.clone();

        tracker.spawn(async move {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => debug!("Self-registration cancelled"),
                result = register_at_auth(&client, &base_url, &service) => match result {
                    Ok(()) => info!(service = %service, auth = %base_url, "Registered at auth service"),
                    Err(e) => warn!("Self-registration failed: {e:#}"),
                },
            }
        });
    }

    if let Some(url) = config.route_catalog_url.clone() {
        let delay = config.route_catalog_delay;
        let records = route_records(&config.service_name);

        tracker.spawn(async move {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => debug!("Route catalog push cancelled"),
                result = async {
                    tokio::time::sleep(delay).await;
                    push_routes(&client, &url, &records).await
                } => match result {
                    Ok(count) => info!(count, catalog = %url, "Registered routes with catalog"),
                    Err(e) => warn!("Route catalog push failed: {e:#}"),
                },
            }
        });
    }
}
