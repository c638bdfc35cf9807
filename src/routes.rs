//! Application routing configuration with middleware stack.
//!
//! # Middleware Stack
//!
//! ```text
//! Request
//!    │
//!    ▼
//! ┌──────────────────┐
//! │   Request ID     │ ← X-Request-Id generated or propagated
//! └────────┬─────────┘
//!          ▼
//! ┌──────────────────┐
//! │     Tracing      │ ← HTTP request/response logging
//! └────────┬─────────┘
//!          ▼
//! ┌──────────────────┐
//! │ Request Timeout  │ ← X-Request-Timeout → store deadline
//! └────────┬─────────┘
//!          ▼
//! ┌──────────────────┐
//! │   Body Limit     │ ← 413 if exceeded
//! └────────┬─────────┘
//!          ▼
//! ┌──────────────────┐
//! │   Plane Gate     │ ← 401 (service plane or user plane routes only)
//! └────────┬─────────┘
//!          ▼
//!      Handler
//! ```
//!
//! # Route Groups
//!
//! See [`ROUTES`]. The same table is announced to the route catalog.

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::http::HeaderName;
use axum::routing::{get, post};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::handlers;
use crate::middleware::{ServiceAuthLayer, UserAuthLayer, extract_request_timeout};
use crate::state::AppState;

/// Header name for request ID.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Which admission gate guards a route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gate {
    Open,
    Service,
    User,
}

/// One served route.
#[derive(Debug, Clone, Copy)]
pub struct RouteSpec {
    pub method: &'static str,
    pub path: &'static str,
    pub gate: Gate,
}

/// Every route served by [`build_router`].
pub const ROUTES: &[RouteSpec] = &[
    RouteSpec {
        method: "GET",
        path: "/health",
        gate: Gate::Open,
    },
    RouteSpec {
        method: "GET",
        path: "/ready",
        gate: Gate::Open,
    },
    RouteSpec {
        method: "GET",
        path: "/internal/bootstrap-status",
        gate: Gate::Open,
    },
    RouteSpec {
        method: "POST",
        path: "/internal/sync-key",
        gate: Gate::Service,
    },
    RouteSpec {
        method: "GET",
        path: "/internal/whoami",
        gate: Gate::Service,
    },
    RouteSpec {
        method: "GET",
        path: "/api/me",
        gate: Gate::User,
    },
];

/// Build the application router with all routes and middleware configured.
pub fn build_router(state: AppState) -> Router {
    let config = &state.config;

    let open = Router::new()
        .route("/health", get(handlers::health_check))
        .route("/ready", get(handlers::readiness_check))
        .route("/internal/bootstrap-status", get(handlers::bootstrap_status));

    let service_plane = Router::new()
        .route("/internal/sync-key", post(handlers::sync_key))
        .route("/internal/whoami", get(handlers::whoami))
        .route_layer(ServiceAuthLayer::new(state.trust.clone()));

    let user_plane = Router::new()
        .route("/api/me", get(handlers::me))
        .route_layer(UserAuthLayer::new(&config.jwt_secret));

    info!(
        max_size_kb = config.max_request_body_size / 1024,
        bootstrap_enabled = config.bootstrap_enabled(),
        sync_writers = ?config.sync_writers,
        "Router configured"
    );

    let request_id = HeaderName::from_static(REQUEST_ID_HEADER);

    Router::new()
        .merge(open)
        .merge(service_plane)
        .merge(user_plane)
        .fallback(handlers::not_found)
        // Applied bottom to top: the last layer sees the request first
        .layer(DefaultBodyLimit::max(config.max_request_body_size))
        .layer(axum::middleware::from_fn(extract_request_timeout))
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::new(request_id.clone()))
        .layer(SetRequestIdLayer::new(request_id, MakeRequestUuid))
        .with_state(state)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    use super::*;
    use crate::config::Config;
    use crate::store::MemoryKeyStore;

    fn app() -> Router {
        build_router(AppState::new(
            Arc::new(MemoryKeyStore::new()),
            Config::default(),
        ))
    }

    #[tokio::test]
    async fn test_every_listed_route_is_served() {
        for route in ROUTES {
            let response = app()
                .oneshot(
                    Request::builder()
                        .method(route.method)
                        .uri(route.path)
                        .body(Body::empty())
                        .unwrap(),
                )
                .await
                .unwrap();

            let expected_gate = match response.status() {
                StatusCode::UNAUTHORIZED => {
                    let challenge = response.headers()["www-authenticate"].to_str().unwrap();
                    if challenge == "Bearer" {
                        Gate::User
                    } else {
                        Gate::Service
                    }
                }
                StatusCode::NOT_FOUND | StatusCode::METHOD_NOT_ALLOWED => {
                    panic!("{} {} is not routed", route.method, route.path)
                }
                _ => Gate::Open,
            };
            assert_eq!(route.gate, expected_gate, "{}", route.path);
        }
    }

    #[tokio::test]
    async fn test_request_id_generated() {
        let response = app()
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert!(response.headers().contains_key(REQUEST_ID_HEADER));
    }

    #[tokio::test]
    async fn test_request_id_propagated() {
        let response = app()
            .oneshot(
                Request::get("/health")
                    .header(REQUEST_ID_HEADER, "corr-123")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.headers()[REQUEST_ID_HEADER], "corr-123");
    }

    #[tokio::test]
    async fn test_unknown_route_uses_error_envelope() {
        let response = app()
            .oneshot(Request::get("/nope").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["error"], "not_found");
    }
}
