//! Service-plane authentication middleware.
//!
//! Admits a request when its `X-Service-Name` / `X-API-Key` pair matches the
//! registry, or when the bootstrap exception applies. The admitted
//! [`Caller`](crate::models::Caller) is inserted into request extensions.
//!
//! ```bash
//! curl -H "X-Service-Name: billing" -H "X-API-Key: $KEY" \
//!      http://localhost:3000/internal/whoami
//! ```
//!
//! Rejections are always 401 with `WWW-Authenticate: API-Key`. The message
//! distinguishes only "missing service name or key" from "invalid API key";
//! store failures are indistinguishable from a wrong key.

use std::task::{Context, Poll};

use axum::body::Body;
use axum::http::{Request, Response};
use axum::response::IntoResponse;
use tower::{Layer, Service};
use tracing::{debug, warn};

use super::timeout::RequestTimeoutExt;
use crate::error::AppError;
use crate::metrics;
use crate::trust::{Rejection, ServiceCredentials, TrustBootstrap};

/// Service-plane authentication layer.
#[derive(Clone)]
pub struct ServiceAuthLayer {
    trust: TrustBootstrap,
}

impl ServiceAuthLayer {
    pub fn new(trust: TrustBootstrap) -> Self {
        Self { trust }
    }
}

impl<S> Layer<S> for ServiceAuthLayer {
    type Service = ServiceAuthService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        ServiceAuthService {
            inner,
            trust: self.trust.clone(),
        }
    }
}

/// Service-plane authentication service wrapper.
#[derive(Clone)]
pub struct ServiceAuthService<S> {
    inner: S,
    trust: TrustBootstrap,
}

impl<S> Service<Request<Body>> for ServiceAuthService<S>
where
    S: Service<Request<Body>, Response = Response<Body>> + Clone + Send + 'static,
    S::Future: Send,
{
    type Response = Response<Body>;
    type Error = S::Error;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<Body>) -> Self::Future {
        let trust = self.trust.clone();
        let mut inner = self.inner.clone();

        Box::pin(async move {
            let deadline = req.store_deadline();
            let headers = req.headers();

            let decision = match ServiceCredentials::from_headers(headers) {
                Ok(credentials) => trust.decide(&credentials, deadline).await,
                Err(rejection) => Err(rejection),
            };

            match decision {
                Ok(caller) => {
                    metrics::record_service_admission("admitted", caller.path.as_str());
                    debug!(
                        service = %caller.service,
                        via = caller.path.as_str(),
                        "Service authenticated"
                    );
                    req.extensions_mut().insert(caller);
                    inner.call(req).await
                }
                Err(rejection) => {
                    let reason = match rejection {
                        Rejection::MissingCredentials => "missing",
                        Rejection::InvalidKey => "invalid",
                    };
                    metrics::record_service_admission("rejected", reason);
                    warn!(
                        path = %req.uri().path(),
                        reason,
                        "Service authentication failed"
                    );
                    Ok(AppError::from(rejection).into_response())
                }
            }
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use std::convert::Infallible;
    use std::sync::Arc;
    use std::time::Duration;

    use axum::http::StatusCode;
    use axum::http::header::WWW_AUTHENTICATE;
    use tower::{ServiceBuilder, ServiceExt, service_fn};

    use super::*;
    use crate::models::{AdmissionPath, Caller};
    use crate::store::{KeyRegistry, KeyStore, MemoryKeyStore, ServiceIdentity};
    use crate::trust::{BOOTSTRAP_TOKEN_HEADER, SERVICE_KEY_HEADER, SERVICE_NAME_HEADER};

    async fn layer() -> ServiceAuthLayer {
        let store = Arc::new(MemoryKeyStore::new());
        store
            .set(ServiceIdentity::new("billing", "abc"))
            .await
            .unwrap();
        let registry = KeyRegistry::new(store, Duration::from_secs(1));
        ServiceAuthLayer::new(TrustBootstrap::new(
            registry,
            Some("boot".to_string()),
            vec!["auth".to_string()],
        ))
    }

    async fn echo_caller(req: Request<Body>) -> Result<Response<Body>, Infallible> {
        let caller = req.extensions().get::<Caller>().cloned().unwrap();
        Ok(Response::new(Body::from(format!(
            "{}:{}",
            caller.service,
            caller.path.as_str()
        ))))
    }

    async fn send(layer: ServiceAuthLayer, headers: &[(&str, &str)]) -> Response<Body> {
        let svc = ServiceBuilder::new()
            .layer(layer)
            .service(service_fn(echo_caller));

        let mut builder = Request::builder().uri("/internal/whoami");
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        svc.oneshot(builder.body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    async fn body_string(response: Response<Body>) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_valid_key_reaches_inner_service() {
        let response = send(
            layer().await,
            &[(SERVICE_NAME_HEADER, "billing"), (SERVICE_KEY_HEADER, "abc")],
        )
        .await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, "billing:key");
    }

    #[tokio::test]
    async fn test_missing_headers_rejected() {
        let response = send(layer().await, &[(SERVICE_NAME_HEADER, "billing")]).await;

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(response.headers()[WWW_AUTHENTICATE], "API-Key");
        assert!(
            body_string(response)
                .await
                .contains("missing service name or key")
        );
    }

    #[tokio::test]
    async fn test_wrong_key_rejected() {
        let response = send(
            layer().await,
            &[(SERVICE_NAME_HEADER, "billing"), (SERVICE_KEY_HEADER, "nope")],
        )
        .await;

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(body_string(response).await.contains("invalid API key"));
    }

    #[tokio::test]
    async fn test_bootstrap_marks_caller() {
        let response = send(
            layer().await,
            &[
                (SERVICE_NAME_HEADER, "auth"),
                (SERVICE_KEY_HEADER, "whatever"),
                (BOOTSTRAP_TOKEN_HEADER, "boot"),
            ],
        )
        .await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            body_string(response).await,
            format!("auth:{}", AdmissionPath::Bootstrap.as_str())
        );
    }
}
