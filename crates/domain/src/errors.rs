//! Error types used throughout the application

use thiserror::Error;

/// Main error type for AuditFlow
#[derive(Error, Debug)]
pub enum AuditFlowError {
    /// Certificate secret missing or empty in the vault
    #[error("Secret unavailable: {0}")]
    SecretUnavailable(String),

    /// Certificate bundle present but not usable
    #[error("Invalid certificate: {0}")]
    InvalidCertificate(String),

    /// Credential exchange rejected by the identity provider
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Connection-level failure (DNS, connect, timeout)
    #[error("Network error: {0}")]
    Network(String),

    /// Upstream API answered with a non-success status
    #[error("Upstream request failed with status {status} for {url}: {body}")]
    UpstreamRequestFailed { status: u16, url: String, body: String },

    /// Upstream body could not be parsed as the expected structure
    #[error("Failed to parse response from {url}: {cause}")]
    ResponseParseFailed { url: String, cause: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Operation cancelled")]
    Cancelled,
}

impl AuditFlowError {
    /// Transport-level failures are candidates for a bounded retry at the
    /// call site; everything else indicates a configuration or trust-chain
    /// problem that retrying cannot fix.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network(_) => true,
            Self::UpstreamRequestFailed { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

/// Result type alias for AuditFlow operations
pub type Result<T> = std::result::Result<T, AuditFlowError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(AuditFlowError::Network("connection refused".into()).is_retryable());
        assert!(AuditFlowError::UpstreamRequestFailed {
            status: 503,
            url: "https://example.com".into(),
            body: String::new(),
        }
        .is_retryable());
        assert!(!AuditFlowError::UpstreamRequestFailed {
            status: 404,
            url: "https://example.com".into(),
            body: String::new(),
        }
        .is_retryable());
        assert!(!AuditFlowError::AuthenticationFailed("bad assertion".into()).is_retryable());
        assert!(!AuditFlowError::Cancelled.is_retryable());
    }

    #[test]
    fn test_error_display_carries_context() {
        let err = AuditFlowError::UpstreamRequestFailed {
            status: 400,
            url: "https://manage.example.com/feed".into(),
            body: "bad request".into(),
        };
        let message = err.to_string();
        assert!(message.contains("400"));
        assert!(message.contains("https://manage.example.com/feed"));
        assert!(message.contains("bad request"));
    }
}
