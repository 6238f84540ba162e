//! Blocking HTTP client wrapper for metadata requests.

use std::io::Read;
use std::time::Duration;

use reqwest::blocking::{Client, Response};

use crate::error::FetchError;

/// Default timeout for metadata requests.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(1000);

/// Default metadata service base URL (link-local address).
pub const DEFAULT_BASE_URL: &str = "http://169.254.169.254";

/// Largest response body accepted from the metadata service.
pub const MAX_BODY_SIZE: usize = 64 * 1024;

/// HTTP client wrapper for metadata service requests.
#[derive(Debug, Clone)]
pub struct MetadataClient {
    inner: Client,
    base_url: String,
}

impl MetadataClient {
    /// Create a new metadata client with the specified timeout and base URL.
    pub fn new(timeout: Duration, base_url: &str) -> Result<Self, FetchError> {
        let inner = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()
            .map_err(|e| FetchError::Client(e.to_string()))?;
        Ok(Self {
            inner,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Get the underlying reqwest client.
    pub fn inner(&self) -> &Client {
        &self.inner
    }

    /// Build an absolute URL for `path`.
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

/// Map a transport error, singling out timeouts.
pub fn transport_error(err: reqwest::Error) -> FetchError {
    if err.is_timeout() {
        FetchError::Timeout
    } else {
        FetchError::Request(err)
    }
}

/// Read response body with a size limit.
///
/// The `Content-Length` header is checked first so oversized bodies are
/// rejected without reading. Otherwise at most `max_size + 1` bytes are read.
pub fn read_body_limited(response: Response, max_size: usize) -> Result<Vec<u8>, FetchError> {
    if let Some(content_length) = response.content_length() {
        if content_length as usize > max_size {
            return Err(FetchError::TooLarge(content_length as usize, max_size));
        }
    }

    let capacity = response
        .content_length()
        .map(|cl| (cl as usize).min(max_size))
        .unwrap_or(max_size.min(8192));
    let mut body = Vec::with_capacity(capacity);

    response
        .take(max_size as u64 + 1)
        .read_to_end(&mut body)
        .map_err(|e| FetchError::Client(e.to_string()))?;

    if body.len() > max_size {
        return Err(FetchError::TooLarge(body.len(), max_size));
    }
    Ok(body)
}

/// Read a size-limited body as UTF-8 text.
pub fn read_text_limited(response: Response, max_size: usize) -> Result<String, FetchError> {
    let body = read_body_limited(response, max_size)?;
    String::from_utf8(body).map_err(|_| FetchError::Utf8)
}
