//! Key sync endpoint.
//!
//! `POST /internal/sync-key` upserts one service's key. The route sits behind
//! the service-plane gate; the admitted caller must also be a configured sync
//! writer.
//!
//! ```bash
//! curl -X POST http://localhost:3000/internal/sync-key \
//!      -H "X-Service-Name: auth" -H "X-API-Key: $AUTH_KEY" \
//!      -d '{"service":"billing","key":"abc","expires_at":"2030-01-01T00:00:00Z"}'
//! ```

use axum::Json;
use axum::body::Bytes;
use axum::extract::{Extension, State};
use chrono::Utc;
use tracing::{info, instrument, warn};

use crate::error::{AppError, AppResult};
use crate::metrics;
use crate::middleware::RequestTimeout;
use crate::models::{Caller, SyncKeyRequest, SyncKeyResponse};
use crate::state::AppState;
use crate::validation::validate_sync_request;

/// Persist a key pushed by a sync writer.
///
/// Validation happens before any store call; an invalid payload never
/// mutates the registry. Sync writers and bootstrap-eligible services only
/// accept keys without `expires_at`.
#[instrument(skip_all, fields(caller = %caller.service))]
pub async fn sync_key(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    timeout: Option<Extension<RequestTimeout>>,
    body: Bytes,
) -> AppResult<Json<SyncKeyResponse>> {
    if !state.may_sync(&caller.service) {
        metrics::record_key_sync("forbidden");
        warn!(caller = %caller.service, "Key sync attempted by non-writer");
        return Err(AppError::Forbidden(
            "caller not permitted to sync keys".to_string(),
        ));
    }

    let identity = serde_json::from_slice::<SyncKeyRequest>(&body)
        .map_err(AppError::from)
        .and_then(|request| validate_sync_request(request, Utc::now()))
        .and_then(|identity| {
            if identity.expires_at.is_some() && state.requires_permanent_key(&identity.name) {
                return Err(AppError::Validation(format!(
                    "expires_at is not allowed for '{}': it must keep a permanent key",
                    identity.name
                )));
            }
            Ok(identity)
        })
        .inspect_err(|_| metrics::record_key_sync("invalid"))?;

    let service = identity.name.clone();
    let expires_at = identity.expires_at;
    let deadline = timeout.map(|Extension(t)| t.duration);

    state
        .registry()
        .set(identity, deadline)
        .await
        .inspect_err(|_| metrics::record_key_sync("store_error"))?;

    metrics::record_key_sync("ok");
    info!(
        service = %service,
        by = %caller.service,
        via = caller.path.as_str(),
        expires_at = ?expires_at,
        "Service key synced"
    );

    Ok(Json(SyncKeyResponse {
        service,
        synced: true,
        expires_at,
    }))
}
