use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Bridge capability not available: {0}")]
    NotAvailable(String),

    #[error("Bridge operation failed: {0}")]
    OperationFailed(String),

    /// The remote platform throttled the call. `retry_after` carries the
    /// server hint when one was sent.
    #[error("Rate limited by remote platform (retry after {retry_after:?})")]
    RateLimited { retry_after: Option<Duration> },

    /// Network fault or server-side error that may succeed on a later attempt.
    #[error("Transient failure: {0}")]
    Transient(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BridgeError {
    /// Whether repeating the same call later could succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimited { .. } | Self::Transient(_))
    }

    /// Server-provided back-off hint, if any.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(BridgeError::RateLimited { retry_after: None }.is_retryable());
        assert!(BridgeError::Transient("reset by peer".into()).is_retryable());
        assert!(!BridgeError::NotFound("video".into()).is_retryable());
        assert!(!BridgeError::OperationFailed("403".into()).is_retryable());
    }

    #[test]
    fn test_retry_after_hint() {
        let err = BridgeError::RateLimited {
            retry_after: Some(Duration::from_secs(2)),
        };
        assert_eq!(err.retry_after(), Some(Duration::from_secs(2)));
        assert_eq!(BridgeError::Transient("x".into()).retry_after(), None);
    }
}
