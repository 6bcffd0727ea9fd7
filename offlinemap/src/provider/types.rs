//! Fetch error type

use thiserror::Error;

/// Errors raised while fetching a single resource.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// The server answered with a non-success status.
    #[error("HTTP {status} from {url}")]
    Status { url: String, status: u16 },

    /// No complete response arrived within the per-request timeout.
    #[error("request to {url} timed out after {timeout_secs}s")]
    Timeout { url: String, timeout_secs: u64 },

    /// Connection, TLS or body read failure.
    #[error("request to {url} failed: {cause}")]
    Transport { url: String, cause: String },

    /// The HTTP client could not be constructed.
    #[error("failed to create HTTP client: {0}")]
    ClientInit(String),
}

impl FetchError {
    /// HTTP status, when the server answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            FetchError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// URL the error relates to.
    pub fn url(&self) -> Option<&str> {
        match self {
            FetchError::Status { url, .. }
            | FetchError::Timeout { url, .. }
            | FetchError::Transport { url, .. } => Some(url),
            FetchError::ClientInit(_) => None,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, FetchError::Timeout { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_accessor() {
        let err = FetchError::Status {
            url: "http://a".to_string(),
            status: 404,
        };
        assert_eq!(err.status(), Some(404));
        assert_eq!(err.url(), Some("http://a"));
        assert_eq!(err.to_string(), "HTTP 404 from http://a");
    }

    #[test]
    fn test_timeout_display() {
        let err = FetchError::Timeout {
            url: "http://a".to_string(),
            timeout_secs: 60,
        };
        assert!(err.is_timeout());
        assert_eq!(err.status(), None);
        assert!(err.to_string().contains("60s"));
    }
}
