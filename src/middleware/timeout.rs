//! Client deadline propagation.
//!
//! A caller may bound how long it is willing to wait via
//! `X-Request-Timeout: <milliseconds>`. The value is stored as a
//! [`RequestTimeout`] extension and passed to every key store call made on
//! behalf of the request, where it can only shorten the configured store
//! timeout, never extend it.
//!
//! Out-of-range or unparseable values are ignored.

use std::time::Duration;

use axum::extract::Request;
use axum::middleware::Next;
use axum::response::Response;
use tracing::debug;

/// Minimum accepted client deadline (100ms).
pub const MIN_REQUEST_TIMEOUT_MS: u64 = 100;

/// Maximum accepted client deadline (5 minutes).
pub const MAX_REQUEST_TIMEOUT_MS: u64 = 300_000;

/// Header name for client-specified request timeout.
pub const REQUEST_TIMEOUT_HEADER: &str = "x-request-timeout";

/// Client deadline for the current request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestTimeout {
    pub duration: Duration,
}

impl RequestTimeout {
    /// Returns `None` if `ms` is outside the accepted range.
    pub fn from_millis(ms: u64) -> Option<Self> {
        (MIN_REQUEST_TIMEOUT_MS..=MAX_REQUEST_TIMEOUT_MS)
            .contains(&ms)
            .then(|| Self {
                duration: Duration::from_millis(ms),
            })
    }

    fn from_header(value: &str) -> Option<Self> {
        let ms = value.trim().parse::<u64>().ok()?;
        let timeout = Self::from_millis(ms);
        if timeout.is_none() {
            debug!(
                timeout_ms = ms,
                min = MIN_REQUEST_TIMEOUT_MS,
                max = MAX_REQUEST_TIMEOUT_MS,
                "Client timeout outside allowed range, ignoring"
            );
        }
        timeout
    }
}

/// Middleware recording a valid `X-Request-Timeout` in request extensions.
pub async fn extract_request_timeout(mut request: Request, next: Next) -> Response {
    if let Some(timeout) = request
        .headers()
        .get(REQUEST_TIMEOUT_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(RequestTimeout::from_header)
    {
        debug!(
            timeout_ms = timeout.duration.as_millis() as u64,
            "Client specified request timeout via header"
        );
        request.extensions_mut().insert(timeout);
    }

    next.run(request).await
}

/// Read the client deadline back out of a request.
pub trait RequestTimeoutExt {
    /// Deadline to hand to the key registry, if the client set one.
    fn store_deadline(&self) -> Option<Duration>;
}

impl<B> RequestTimeoutExt for axum::http::Request<B> {
    fn store_deadline(&self) -> Option<Duration> {
        self.extensions()
            .get::<RequestTimeout>()
            .map(|t| t.duration)
    }
}
