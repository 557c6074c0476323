//! Store error types
//!
//! Everything the remote API can report is folded into [`StoreError`] before
//! it leaves this crate. Callers never see `reqwest` or raw JSON:API error
//! bodies.

use thiserror::Error;

/// Normalized remote store errors
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// Credential or signing failure
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// The account holder has not accepted a required legal agreement
    #[error("Required agreement missing or expired: {0}")]
    AgreementMissing(String),

    /// Remote entity does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Remote precondition not met (build not processed, version already open, ...)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Malformed input
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Request deadline exceeded
    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// Rate limited by store
    #[error("Rate limited, retry after {retry_after:?} seconds")]
    RateLimited { retry_after: Option<u64> },

    /// Any other transport or server failure
    #[error("API error: {status} - {message}")]
    RemoteApi { status: u16, message: String },
}

impl StoreError {
    /// Whether an idempotent read may be retried after this error
    pub fn is_transient(&self) -> bool {
        match self {
            StoreError::Timeout(_) | StoreError::RateLimited { .. } => true,
            StoreError::RemoteApi { status, .. } => *status == 0 || *status >= 500,
            _ => false,
        }
    }
}

impl From<reqwest::Error> for StoreError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            StoreError::Timeout(err.to_string())
        } else if err.is_decode() {
            StoreError::RemoteApi {
                status: err.status().map(|s| s.as_u16()).unwrap_or(200),
                message: format!("Failed to parse API response: {}", err),
            }
        } else {
            StoreError::RemoteApi {
                status: err.status().map(|s| s.as_u16()).unwrap_or(0),
                message: err.to_string(),
            }
        }
    }
}

impl From<jsonwebtoken::errors::Error> for StoreError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        StoreError::Auth(format!("Failed to sign token: {}", err))
    }
}

/// Result type for store operations
pub type Result<T> = std::result::Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_errors() {
        assert!(StoreError::Timeout("slow".to_string()).is_transient());
        assert!(StoreError::RateLimited { retry_after: Some(3) }.is_transient());
        assert!(StoreError::RemoteApi {
            status: 503,
            message: "unavailable".to_string()
        }
        .is_transient());

        assert!(!StoreError::RemoteApi {
            status: 400,
            message: "bad".to_string()
        }
        .is_transient());
        assert!(!StoreError::AgreementMissing("accept".to_string()).is_transient());
        assert!(!StoreError::Conflict("busy".to_string()).is_transient());
    }

    #[tokio::test]
    async fn test_transport_failure_classified_as_status_zero() {
        // bind then release a port so the connection is refused
        let addr = std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap();
        let err = reqwest::get(format!("http://{}/apps", addr)).await.unwrap_err();

        let err = StoreError::from(err);
        assert!(matches!(err, StoreError::RemoteApi { status: 0, .. }));
        assert!(err.is_transient());
    }
}
