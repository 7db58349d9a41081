//! Error types for YouTube provider

use bridge_traits::error::BridgeError;
use bridge_traits::http::HttpResponse;
use std::time::Duration;
use thiserror::Error;

use crate::types::ApiErrorResponse;

/// Reasons YouTube attaches to 403 responses that mean "slow down".
const THROTTLE_REASONS: &[&str] = &["rateLimitExceeded", "userRateLimitExceeded"];

/// YouTube provider errors
#[derive(Error, Debug)]
pub enum YouTubeError {
    /// Access token missing, expired or lacking scope
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("YouTube API error (status {status_code}): {message}")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limit exceeded")]
    RateLimitExceeded { retry_after: Option<Duration> },

    /// Daily quota spent; retrying today will not help
    #[error("API quota exceeded: {0}")]
    QuotaExceeded(String),

    #[error("YouTube server error (status {status_code})")]
    ServerError { status_code: u16 },

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Failed to parse API response: {0}")]
    ParseError(String),

    #[error(transparent)]
    BridgeError(#[from] BridgeError),
}

/// Result type for YouTube operations
pub type Result<T> = std::result::Result<T, YouTubeError>;

impl YouTubeError {
    /// Classify a non-success response.
    pub fn from_response(response: &HttpResponse, resource: &str) -> Self {
        let body: Option<ApiErrorResponse> = response.json().ok();
        let message = body
            .as_ref()
            .map(|b| b.error.message.clone())
            .unwrap_or_else(|| String::from_utf8_lossy(&response.body).into_owned());
        let reason = body.as_ref().and_then(|b| b.reason()).unwrap_or_default();

        match response.status {
            401 => YouTubeError::AuthenticationFailed(message),
            403 if THROTTLE_REASONS.contains(&reason) => YouTubeError::RateLimitExceeded {
                retry_after: response.retry_after(),
            },
            403 if reason == "quotaExceeded" => YouTubeError::QuotaExceeded(message),
            404 => YouTubeError::NotFound(resource.to_string()),
            429 => YouTubeError::RateLimitExceeded {
                retry_after: response.retry_after(),
            },
            status if response.is_server_error() => YouTubeError::ServerError {
                status_code: status,
            },
            status => YouTubeError::ApiError {
                status_code: status,
                message,
            },
        }
    }
}

impl From<YouTubeError> for BridgeError {
    fn from(error: YouTubeError) -> Self {
        match error {
            YouTubeError::RateLimitExceeded { retry_after } => {
                BridgeError::RateLimited { retry_after }
            }
            YouTubeError::ServerError { .. } => BridgeError::Transient(error.to_string()),
            YouTubeError::NotFound(resource) => BridgeError::NotFound(resource),
            YouTubeError::BridgeError(e) => e,
            other => BridgeError::OperationFailed(other.to_string()),
        }
    }
}
