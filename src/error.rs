//! Error types for credential fetch operations.

use thiserror::Error;

/// Errors that can occur when fetching or refreshing credentials.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The fetcher returned nothing usable. Callers should try the next source.
    #[error("no credentials available")]
    NoCredentials,

    /// Request timed out.
    #[error("request timeout")]
    Timeout,

    /// HTTP error with status code.
    #[error("http {0}")]
    Http(u16),

    /// The metadata service rejected the token request.
    #[error("bad request to instance metadata service")]
    BadRequest,

    /// A refresh produced credentials that had already expired.
    #[error("credentials expired at fetch time")]
    Expired,

    /// Response was not valid UTF-8.
    #[error("invalid utf-8")]
    Utf8,

    /// JSON deserialization error.
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP request error.
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The HTTP client could not be constructed.
    #[error("http client: {0}")]
    Client(String),

    /// Response exceeds maximum allowed size.
    #[error("response too large: {0} bytes exceeds limit of {1} bytes")]
    TooLarge(usize, usize),

    /// Every attempt against the metadata service failed.
    #[error("metadata request failed after {attempts} attempts: {source}")]
    RetriesExceeded {
        attempts: u32,
        #[source]
        source: Box<FetchError>,
    },
}

impl FetchError {
    /// Returns `true` when the fetcher simply had no credentials to offer.
    pub fn is_no_credentials(&self) -> bool {
        matches!(self, FetchError::NoCredentials)
    }

    /// Returns `true` for failures worth another attempt against the service.
    pub(crate) fn is_retryable(&self) -> bool {
        match self {
            FetchError::Timeout | FetchError::Utf8 | FetchError::Json(_) | FetchError::Http(_) => {
                true
            }
            FetchError::Request(e) => !e.is_builder(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(
            FetchError::NoCredentials.to_string(),
            "no credentials available"
        );
        assert_eq!(FetchError::Timeout.to_string(), "request timeout");
        assert_eq!(FetchError::Http(404).to_string(), "http 404");
        assert_eq!(
            FetchError::BadRequest.to_string(),
            "bad request to instance metadata service"
        );
        assert_eq!(FetchError::Utf8.to_string(), "invalid utf-8");
        assert_eq!(
            FetchError::TooLarge(10, 5).to_string(),
            "response too large: 10 bytes exceeds limit of 5 bytes"
        );
    }

    #[test]
    fn test_retries_exceeded_display() {
        let err = FetchError::RetriesExceeded {
            attempts: 3,
            source: Box::new(FetchError::Http(500)),
        };
        assert_eq!(
            err.to_string(),
            "metadata request failed after 3 attempts: http 500"
        );
    }

    #[test]
    fn test_is_no_credentials() {
        assert!(FetchError::NoCredentials.is_no_credentials());
        assert!(!FetchError::Timeout.is_no_credentials());
    }

    #[test]
    fn test_is_retryable() {
        assert!(FetchError::Timeout.is_retryable());
        assert!(FetchError::Http(503).is_retryable());
        assert!(!FetchError::BadRequest.is_retryable());
        assert!(!FetchError::TooLarge(2, 1).is_retryable());
    }
}
