//! User-plane bearer token middleware.
//!
//! Verifies `Authorization: Bearer <jwt>` against the shared HMAC secret and
//! inserts the caller's [`UserClaims`] into request extensions. The scheme
//! name is matched case-insensitively.
//!
//! # Accepted Tokens
//!
//! - Algorithms HS256, HS384 and HS512; anything else fails verification
//! - `exp` and `nbf` are enforced when present, with no leeway
//! - The account id comes from `id`, falling back to `sub`
//! - `roles` is forwarded untouched

use std::sync::Arc;
use std::task::{Context, Poll};

use axum::body::Body;
use axum::http::header::AUTHORIZATION;
use axum::http::{HeaderMap, Request, Response};
use axum::response::IntoResponse;
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde_json::{Map, Value};
use tower::{Layer, Service};
use tracing::{debug, warn};

use crate::error::AppError;
use crate::metrics;
use crate::models::UserClaims;

const BEARER_PREFIX: &str = "bearer ";

/// Claims map as decoded from the token payload.
pub type RawClaims = Map<String, Value>;

/// Verification settings shared by every request.
struct Verifier {
    key: DecodingKey,
    validation: Validation,
}

impl Verifier {
    fn new(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.algorithms = vec![Algorithm::HS256, Algorithm::HS384, Algorithm::HS512];
        validation.required_spec_claims.clear();
        validation.validate_exp = true;
        validation.validate_nbf = true;
        validation.validate_aud = false;
        validation.leeway = 0;

        Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    fn verify(&self, header: Option<&str>) -> Result<UserClaims, AppError> {
        let header = header.ok_or_else(|| {
            AppError::unauthorized_bearer("authorization header missing", Vec::new())
        })?;

        let token = extract_bearer_token(header).ok_or_else(|| {
            AppError::unauthorized_bearer(
                "authorization header must start with 'Bearer '",
                Vec::new(),
            )
        })?;

        let data = decode::<RawClaims>(token, &self.key, &self.validation).map_err(|e| {
            AppError::unauthorized_bearer("invalid or expired token", vec![e.to_string()])
        })?;

        claims_from_map(data.claims)
    }
}

/// Token part of an `Authorization` value whose scheme is `Bearer`, in any case.
///
/// Returns `None` when the scheme does not match; an empty token is returned
/// as-is and fails verification later.
pub fn extract_bearer_token(header: &str) -> Option<&str> {
    let scheme = header.get(..BEARER_PREFIX.len())?;
    if !scheme.eq_ignore_ascii_case(BEARER_PREFIX) {
        return None;
    }
    header.get(BEARER_PREFIX.len()..).map(str::trim)
}

/// The `Authorization` value, or `None` only when the header is absent.
///
/// Empty or non-UTF-8 values come back as `""` so they fail the scheme check
/// instead of reading as a missing header.
fn authorization_header(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .map(|v| v.to_str().unwrap_or_default())
}

/// Build [`UserClaims`] from a verified payload.
///
/// A present but non-string (or empty) `id` is rejected rather than falling
/// back to `sub`.
pub fn claims_from_map(mut claims: RawClaims) -> Result<UserClaims, AppError> {
    let account_id = match claims.get("id") {
        Some(Value::String(id)) if !id.is_empty() => Some(id.clone()),
        Some(_) => None,
        None => match claims.get("sub") {
            Some(Value::String(sub)) if !sub.is_empty() => Some(sub.clone()),
            _ => None,
        },
    }
    .ok_or_else(|| AppError::unauthorized_bearer("token missing user id", Vec::new()))?;

    Ok(UserClaims {
        account_id,
        roles: claims.remove("roles"),
    })
}

/// User-plane authentication layer.
#[derive(Clone)]
pub struct UserAuthLayer {
    verifier: Arc<Verifier>,
}

impl UserAuthLayer {
    pub fn new(secret: &str) -> Self {
        Self {
            verifier: Arc::new(Verifier::new(secret)),
        }
    }
}

impl<S> Layer<S> for UserAuthLayer {
    type Service = UserAuthService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        UserAuthService {
            inner,
            verifier: self.verifier.clone(),
        }
    }
}

/// User-plane authentication service wrapper.
#[derive(Clone)]
pub struct UserAuthService<S> {
    inner: S,
    verifier: Arc<Verifier>,
}

impl<S> Service<Request<Body>> for UserAuthService<S>
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
        let verifier = self.verifier.clone();
        let mut inner = self.inner.clone();

        Box::pin(async move {
            match verifier.verify(authorization_header(req.headers())) {
                Ok(claims) => {
                    metrics::record_user_admission("admitted");
                    debug!(account_id = %claims.account_id, "User authenticated");
                    req.extensions_mut().insert(claims);
                    inner.call(req).await
                }
                Err(e) => {
                    metrics::record_user_admission("rejected");
                    warn!(path = %req.uri().path(), error = %e, "User authentication failed");
                    Ok(e.into_response())
                }
            }
        })
    }
}
