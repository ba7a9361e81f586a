//! Shared-secret guard for the training trigger.

use axum::http::HeaderMap;
use tracing::{error, warn};

use crate::error::ApiError;

/// Lowercase, as `http` normalizes header names.
pub const API_KEY_HEADER: &str = "x-api-key";

/// Checks the `X-API-KEY` header against the configured training key.
///
/// Order: missing header (403), unconfigured server key (500), mismatch (403).
pub fn require_training_key(headers: &HeaderMap, expected: Option<&str>) -> Result<(), ApiError> {
    let Some(provided) = headers.get(API_KEY_HEADER) else {
        warn!("trigger called without {API_KEY_HEADER} header");
        return Err(ApiError::Forbidden("Not authenticated".into()));
    };

    let Some(expected) = expected else {
        error!("training key is not configured, rejecting trigger");
        return Err(ApiError::Misconfigured("Server config error".into()));
    };

    if keys_match(provided.as_bytes(), expected.as_bytes()) {
        Ok(())
    } else {
        warn!("invalid API key received for trigger endpoint");
        Err(ApiError::Forbidden("Invalid API Key".into()))
    }
}

/// `blake3::Hash` equality is constant-time, and hashing first hides the
/// length of the configured key.
fn keys_match(provided: &[u8], expected: &[u8]) -> bool {
    blake3::hash(provided) == blake3::hash(expected)
}
