//! Provider-failure taxonomy shared by all integration clients.

use thiserror::Error;

/// Result type for integration client operations.
pub type ClientResult<T> = std::result::Result<T, ClientError>;

/// Classified failure of an outbound provider call.
///
/// Every terminal failure of an integration client is one of these
/// variants; the classification drives both the retry decision and the
/// error counter label.
#[derive(Debug, Clone, Error)]
pub enum ClientError {
    /// Client-side abort: the call exceeded its configured deadline.
    #[error("request timed out: {0}")]
    Timeout(String),

    /// Provider rejected the credentials (401/403).
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// Provider throttling (429).
    #[error("rate limit exceeded: {0}")]
    RateLimit(String),

    /// Provider rejected the request shape (400/422).
    #[error("invalid request: {0}")]
    Validation(String),

    /// Provider refused the content (400 with a content-filter body).
    #[error("content filtered: {0}")]
    ContentFiltered(String),

    /// Provider-side failure (5xx), including malformed success bodies.
    #[error("provider error: {0}")]
    Server(String),

    /// Transport-level failure before an HTTP status was received.
    #[error("network error: {0}")]
    Network(String),

    /// Anything that does not fit the taxonomy above.
    #[error("unexpected client error: {0}")]
    Unknown(String),
}

impl ClientError {
    /// Stable label used for error counters and log fields.
    pub fn classification(&self) -> &'static str {
        match self {
            ClientError::Timeout(_) => "timeout",
            ClientError::Authentication(_) => "authentication",
            ClientError::RateLimit(_) => "rate_limit",
            // Content filtering is a validation-class rejection on the wire.
            ClientError::Validation(_) | ClientError::ContentFiltered(_) => "validation",
            ClientError::Server(_) => "server",
            ClientError::Network(_) => "network",
            ClientError::Unknown(_) => "unknown",
        }
    }

    /// Whether a retry may succeed. 4xx validation and auth failures are
    /// never retried.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ClientError::Timeout(_)
                | ClientError::RateLimit(_)
                | ClientError::Server(_)
                | ClientError::Network(_)
                | ClientError::Unknown(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classes() {
        assert!(ClientError::Timeout("t".into()).is_retryable());
        assert!(ClientError::RateLimit("r".into()).is_retryable());
        assert!(ClientError::Server("s".into()).is_retryable());
        assert!(ClientError::Network("n".into()).is_retryable());
    }

    #[test]
    fn test_non_retryable_classes() {
        assert!(!ClientError::Authentication("a".into()).is_retryable());
        assert!(!ClientError::Validation("v".into()).is_retryable());
        assert!(!ClientError::ContentFiltered("c".into()).is_retryable());
    }

    #[test]
    fn test_classification_labels() {
        assert_eq!(ClientError::Timeout("t".into()).classification(), "timeout");
        assert_eq!(
            ClientError::ContentFiltered("c".into()).classification(),
            "validation"
        );
        assert_eq!(ClientError::Network("n".into()).classification(), "network");
    }
}
