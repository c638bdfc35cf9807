use axum::http::header::WWW_AUTHENTICATE;
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;

use crate::store::StoreError;

/// Authentication scheme advertised in the `WWW-Authenticate` header of a 401.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Challenge {
    /// Service plane: `X-Service-Name` + `X-API-Key`.
    ApiKey,
    /// User plane: `Authorization: Bearer <token>`.
    Bearer,
}

impl Challenge {
    fn header_value(self) -> HeaderValue {
        match self {
            Challenge::ApiKey => HeaderValue::from_static("API-Key"),
            Challenge::Bearer => HeaderValue::from_static("Bearer"),
        }
    }
}

/// Application-wide error types with appropriate HTTP status codes.
///
/// # Client vs. Operational Errors
///
/// `Unauthorized`, `Forbidden`, `Validation`, `SerializationError` and
/// `NotFound` are client errors whose message is safe to return verbatim.
/// `Store` and `ConfigError` are operational; their detail is
/// logged and the client only sees a generic message.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Unauthorized: {message}")]
    Unauthorized {
        challenge: Challenge,
        message: String,
        causes: Vec<String>,
    },

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Key store error: {0}")]
    Store(#[from] StoreError),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl AppError {
    /// Service-plane rejection.
    pub fn unauthorized_service(message: impl Into<String>) -> Self {
        AppError::Unauthorized {
            challenge: Challenge::ApiKey,
            message: message.into(),
            causes: Vec::new(),
        }
    }

    /// User-plane rejection with optional diagnostic causes.
    pub fn unauthorized_bearer(message: impl Into<String>, causes: Vec<String>) -> Self {
        AppError::Unauthorized {
            challenge: Challenge::Bearer,
            message: message.into(),
            causes,
        }
    }

    /// HTTP status this error renders as.
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::Validation(_) | AppError::SerializationError(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Store(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::ConfigError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Error envelope returned by every endpoint and gate.
///
/// `causes` carries diagnostics only (e.g. the token verification failure);
/// nothing on the server side branches on it.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    pub status: u16,
    pub causes: Vec<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        let (error_type, message, causes, challenge) = match self {
            AppError::Unauthorized {
                challenge,
                message,
                causes,
            } => ("unauthorized", message, causes, Some(challenge)),
            AppError::Forbidden(msg) => ("forbidden", msg, Vec::new(), None),
            AppError::Validation(msg) => ("validation_error", msg, Vec::new(), None),
            AppError::NotFound(msg) => ("not_found", msg, Vec::new(), None),
            AppError::SerializationError(e) => {
                ("serialization_error", sanitize_serde_error(&e), Vec::new(), None)
            }

            // Operational errors: full detail stays in the logs
            AppError::Store(e) => {
                tracing::error!(error = %e, "Key store unavailable while serving request");
                (
                    "store_unavailable",
                    "Key registry is temporarily unavailable. Please try again later.".to_string(),
                    Vec::new(),
                    None,
                )
            }
            AppError::ConfigError(msg) => {
                tracing::error!(error = %msg, "Configuration error while serving request");
                (
                    "internal_error",
                    "Service configuration error. Please contact support.".to_string(),
                    Vec::new(),
                    None,
                )
            }
        };

        let body = ErrorResponse {
            error: error_type.to_string(),
            message,
            status: status.as_u16(),
            causes,
        };

        let mut response = (status, axum::Json(body)).into_response();
        if let Some(challenge) = challenge {
            response
                .headers_mut()
                .insert(WWW_AUTHENTICATE, challenge.header_value());
        }
        response
    }
}

/// Sanitize serde error messages to avoid leaking internal type information.
fn sanitize_serde_error(e: &serde_json::Error) -> String {
    let msg = e.to_string();

    if msg.contains("unknown field")
        && let Some(start) = msg.find('`')
        && let Some(end) = msg[start + 1..].find('`')
    {
        let field = &msg[start + 1..start + 1 + end];
        return format!("Unknown field: {field}");
    }

    if msg.contains("input contains invalid characters") || msg.contains("premature end of input")
    {
        return "Invalid timestamp in request body".to_string();
    }

    if msg.contains("invalid type") {
        return "Invalid data type in request body".to_string();
    }

    if msg.contains("EOF while parsing") || msg.contains("expected") {
        return "Malformed JSON in request body".to_string();
    }

    "Invalid request format".to_string()
}

/// Convenience type alias for Results with AppError.
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_unauthorized_service_envelope() {
        let response = AppError::unauthorized_service("invalid API key").into_response();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(response.headers()[WWW_AUTHENTICATE], "API-Key");

        let body = body_json(response).await;
        assert_eq!(body["error"], "unauthorized");
        assert_eq!(body["message"], "invalid API key");
        assert_eq!(body["status"], 401);
        assert_eq!(body["causes"], serde_json::json!([]));
    }

    #[tokio::test]
    async fn test_unauthorized_bearer_carries_causes() {
        let response = AppError::unauthorized_bearer(
            "invalid or expired token",
            vec!["ExpiredSignature".to_string()],
        )
        .into_response();

        assert_eq!(response.headers()[WWW_AUTHENTICATE], "Bearer");
        let body = body_json(response).await;
        assert_eq!(body["causes"][0], "ExpiredSignature");
    }

    #[tokio::test]
    async fn test_store_error_hides_detail() {
        let err = AppError::Store(StoreError::Unavailable("10.0.0.7:27017 refused".into()));
        let response = err.into_response();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        let body = body_json(response).await;
        assert_eq!(body["error"], "store_unavailable");
        assert!(!body["message"].as_str().unwrap().contains("10.0.0.7"));
    }

    #[test]
    fn test_sanitize_malformed_json() {
        let err = serde_json::from_str::<serde_json::Value>("{\"service\":").unwrap_err();
        assert_eq!(sanitize_serde_error(&err), "Malformed JSON in request body");
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            AppError::Validation("x".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::Forbidden("x".into()).status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            AppError::ConfigError("x".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
