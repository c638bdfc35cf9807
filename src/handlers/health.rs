//! Health and readiness endpoints.
//!
//! # Endpoints
//!
//! - `GET /health` - Health check with key store reachability
//! - `GET /ready` - Kubernetes-compatible readiness probe
//!
//! # Health vs Readiness
//!
//! - **Health** (`/health`): Returns 200 even if degraded, includes details
//! - **Readiness** (`/ready`): Returns 503 if the key store cannot be reached,
//!   since every service-plane request would then be rejected

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use chrono::Utc;
use tracing::{instrument, warn};

use crate::models::HealthResponse;
use crate::state::AppState;

async fn store_reachable(state: &AppState) -> bool {
    match state
        .registry()
        .health_check(state.registry().operation_timeout())
        .await
    {
        Ok(()) => true,
        Err(e) => {
            warn!(error = %e, "Key store unreachable during health probe");
            false
        }
    }
}

/// Health check endpoint.
///
/// # Response Body
///
/// ```json
/// {
///   "status": "healthy",
///   "service": "billing",
///   "store_reachable": true,
///   "uptime_seconds": 3600,
///   "version": "0.1.0",
///   "timestamp": "2024-01-15T10:30:00Z"
/// }
/// ```
#[instrument(skip(state))]
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let reachable = store_reachable(&state).await;

    Json(HealthResponse {
        status: if reachable { "healthy" } else { "degraded" }.to_string(),
        service: state.config.service_name.clone(),
        store_reachable: reachable,
        uptime_seconds: state.uptime_seconds(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Utc::now(),
    })
}

/// Readiness check endpoint for Kubernetes probes.
#[instrument(skip(state))]
pub async fn readiness_check(State(state): State<AppState>) -> StatusCode {
    if store_reachable(&state).await {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}
