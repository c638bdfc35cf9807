use axum::Json;
use axum::extract::{Extension, State};
use tracing::instrument;

use crate::error::AppResult;
use crate::middleware::RequestTimeout;
use crate::models::BootstrapStatusResponse;
use crate::state::AppState;

/// Report whether each bootstrap-eligible service has registered a key.
///
/// `auth_key` mirrors the first eligible service (by default `auth`). A store
/// failure is reported as 503 rather than guessed.
#[instrument(skip(state, timeout))]
pub async fn bootstrap_status(
    State(state): State<AppState>,
    timeout: Option<Extension<RequestTimeout>>,
) -> AppResult<Json<BootstrapStatusResponse>> {
    let deadline = timeout.map(|Extension(t)| t.duration);
    let services = state.trust.bootstrap_status(deadline).await?;

    let primary_received = state
        .trust
        .bootstrap_services()
        .first()
        .and_then(|name| services.get(name))
        .copied()
        .unwrap_or(false);

    Ok(Json(BootstrapStatusResponse {
        auth_key: if primary_received {
            BootstrapStatusResponse::RECEIVED
        } else {
            BootstrapStatusResponse::NOT_RECEIVED
        },
        services,
    }))
}
