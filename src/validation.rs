use chrono::{DateTime, Utc};

use crate::error::{AppError, AppResult};
use crate::models::SyncKeyRequest;
use crate::store::ServiceIdentity;

// =============================================================================
// Validation Constants
// =============================================================================

/// Maximum length for a service name.
pub const MAX_SERVICE_NAME_LENGTH: usize = 128;

/// Maximum length for an API key.
pub const MAX_API_KEY_LENGTH: usize = 512;

/// Validate a declared service name.
///
/// Rules:
/// - Must be between 1 and 128 characters
/// - Only ASCII alphanumerics, dots, underscores and hyphens
pub fn validate_service_name(name: &str) -> AppResult<()> {
    if name.is_empty() {
        return Err(AppError::Validation(
            "invalid sync payload: service is required".to_string(),
        ));
    }

    if name.len() > MAX_SERVICE_NAME_LENGTH {
        return Err(AppError::Validation(format!(
            "service name cannot exceed {MAX_SERVICE_NAME_LENGTH} characters"
        )));
    }

    if let Some((i, c)) = name
        .chars()
        .enumerate()
        .find(|(_, c)| !(c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-')))
    {
        return Err(AppError::Validation(format!(
            "service name contains invalid character '{c}' at position {i}. \
             Only alphanumeric characters, dots, underscores, and hyphens are allowed"
        )));
    }

    Ok(())
}

/// Validate an API key.
///
/// Keys are otherwise opaque, but must be presentable as an `X-API-Key`
/// header value: visible ASCII only (`!` through `~`), so no whitespace or
/// non-ASCII text.
pub fn validate_api_key(key: &str) -> AppResult<()> {
    if key.is_empty() {
        return Err(AppError::Validation(
            "invalid sync payload: key is required".to_string(),
        ));
    }

    if key.len() > MAX_API_KEY_LENGTH {
        return Err(AppError::Validation(format!(
            "key cannot exceed {MAX_API_KEY_LENGTH} characters"
        )));
    }

    if let Some(pos) = key.chars().position(|c| !c.is_ascii_graphic()) {
        return Err(AppError::Validation(format!(
            "key contains invalid character at position {pos}. \
             Only visible ASCII characters are allowed"
        )));
    }

    Ok(())
}

/// Validate an optional expiry against `now`.
pub fn validate_expiry(expires_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> AppResult<()> {
    match expires_at {
        Some(at) if at <= now => Err(AppError::Validation(
            "expires_at must be in the future".to_string(),
        )),
        _ => Ok(()),
    }
}

/// Validate a sync payload and turn it into the identity to persist.
pub fn validate_sync_request(
    request: SyncKeyRequest,
    now: DateTime<Utc>,
) -> AppResult<ServiceIdentity> {
    validate_service_name(&request.service)?;
    validate_api_key(&request.key)?;
    validate_expiry(request.expires_at, now)?;

    Ok(ServiceIdentity::new(request.service, request.key).with_expiry(request.expires_at))
}
