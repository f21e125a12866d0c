//! Error types for health checking.

use thiserror::Error;

/// Errors that can occur during a `/health` probe.
#[derive(Debug, Clone, Error)]
pub enum HealthCheckError {
    /// Request timeout
    #[error("request timeout after {0}s")]
    Timeout(u64),

    /// Connection failed
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// HTTP error
    #[error("HTTP error: {0}")]
    HttpError(u16),
}

impl HealthCheckError {
    pub fn classify(err: &reqwest::Error, timeout_seconds: u64) -> Self {
        if err.is_timeout() {
            Self::Timeout(timeout_seconds)
        } else {
            Self::ConnectionFailed(err.to_string())
        }
    }
}
