use axum::Json;
use axum::extract::Extension;
use axum::http::Uri;

use crate::error::AppError;
use crate::models::{Caller, MeResponse, UserClaims, WhoAmIResponse};

/// Echo the admitted service-plane caller.
pub async fn whoami(Extension(caller): Extension<Caller>) -> Json<WhoAmIResponse> {
    Json(WhoAmIResponse {
        service: caller.service,
        via: caller.path.as_str(),
    })
}

/// Echo the verified user-plane claims.
pub async fn me(Extension(claims): Extension<UserClaims>) -> Json<MeResponse> {
    Json(MeResponse {
        account_id: claims.account_id,
        roles: claims.roles,
    })
}

/// Fallback for unrouted paths.
pub async fn not_found(uri: Uri) -> AppError {
    AppError::NotFound(format!("no route for {}", uri.path()))
}
