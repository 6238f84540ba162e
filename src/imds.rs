//! EC2 instance metadata service credential fetcher.

use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use serde::Deserialize;

use crate::client::{read_text_limited, transport_error, MetadataClient, MAX_BODY_SIZE};
use crate::config::ProviderConfig;
use crate::credential::Credential;
use crate::error::FetchError;
use crate::fetcher::CredentialFetcher;

/// IMDSv2 token endpoint path.
const TOKEN_PATH: &str = "/latest/api/token";

/// Role listing and credential document path.
const CREDENTIALS_PATH: &str = "/latest/meta-data/iam/security-credentials/";

/// Token TTL header name.
const TOKEN_TTL_HEADER: &str = "X-aws-ec2-metadata-token-ttl-seconds";

/// Token header name for requests.
const TOKEN_HEADER: &str = "X-aws-ec2-metadata-token";

/// Requested token lifetime in seconds.
const TOKEN_TTL: &str = "21600";

/// Credential document served for an instance profile role.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CredentialDocument {
    access_key_id: Option<String>,
    secret_access_key: Option<String>,
    token: Option<String>,
    expiration: Option<DateTime<Utc>>,
    code: Option<String>,
    message: Option<String>,
}

/// Fetches role credentials from the instance metadata service.
///
/// Construction performs no I/O. Each [`retrieve`](CredentialFetcher::retrieve)
/// builds a client with the configured timeout and walks the token, role and
/// credential endpoints, retrying each step up to `num_attempts` times.
#[derive(Debug, Clone)]
pub struct InstanceMetadataFetcher {
    base_url: String,
    timeout: Duration,
    num_attempts: u32,
}

impl InstanceMetadataFetcher {
    pub fn new(base_url: impl Into<String>, timeout: Duration, num_attempts: u32) -> Self {
        Self {
            base_url: base_url.into(),
            timeout,
            num_attempts: num_attempts.max(1),
        }
    }

    pub fn from_config(config: &ProviderConfig) -> Self {
        Self::new(&config.base_url, config.timeout, config.fetch_attempts)
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn num_attempts(&self) -> u32 {
        self.num_attempts
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Fetch an IMDSv2 session token.
    ///
    /// `Ok(None)` means the service does not offer tokens and requests should
    /// go out without one.
    fn fetch_token(&self, client: &MetadataClient) -> Result<Option<String>, FetchError> {
        let url = client.url(TOKEN_PATH);
        let mut last = FetchError::NoCredentials;

        for attempt in 1..=self.num_attempts {
            let response = client
                .inner()
                .put(&url)
                .header(TOKEN_TTL_HEADER, TOKEN_TTL)
                .send();

            let response = match response {
                Ok(response) => response,
                Err(e) => {
                    last = transport_error(e);
                    tracing::debug!(attempt, error = %last, "token request failed");
                    continue;
                }
            };

            match response.status() {
                StatusCode::OK => return Ok(Some(read_text_limited(response, MAX_BODY_SIZE)?)),
                StatusCode::FORBIDDEN | StatusCode::NOT_FOUND | StatusCode::METHOD_NOT_ALLOWED => {
                    tracing::debug!("IMDSv2 token unavailable, falling back to IMDSv1");
                    return Ok(None);
                }
                StatusCode::BAD_REQUEST => return Err(FetchError::BadRequest),
                status => {
                    last = FetchError::Http(status.as_u16());
                    tracing::debug!(attempt, error = %last, "token request failed");
                }
            }
        }

        if matches!(last, FetchError::Timeout) {
            tracing::debug!("token request timed out, continuing without a token");
            return Ok(None);
        }
        Err(FetchError::RetriesExceeded {
            attempts: self.num_attempts,
            source: Box::new(last),
        })
    }

    /// GET `path`, retrying failed requests, non-200 answers, empty bodies and
    /// bodies rejected by `validate`.
    fn get_with_retry<T>(
        &self,
        client: &MetadataClient,
        path: &str,
        token: Option<&str>,
        validate: impl Fn(&str) -> Result<T, FetchError>,
    ) -> Result<T, FetchError> {
        let url = client.url(path);
        let mut last = FetchError::NoCredentials;

        for attempt in 1..=self.num_attempts {
            match self.get_once(client, &url, token).and_then(|body| validate(&body)) {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() || e.is_no_credentials() => {
                    tracing::debug!(attempt, url = %url, error = %e, "metadata request failed");
                    last = e;
                }
                Err(e) => return Err(e),
            }
        }

        tracing::debug!(url = %url, attempts = self.num_attempts, "metadata retries exhausted");
        Err(FetchError::RetriesExceeded {
            attempts: self.num_attempts,
            source: Box::new(last),
        })
    }

    fn get_once(
        &self,
        client: &MetadataClient,
        url: &str,
        token: Option<&str>,
    ) -> Result<String, FetchError> {
        let mut request = client.inner().get(url);
        if let Some(token) = token {
            request = request.header(TOKEN_HEADER, token);
        }
        let response = request.send().map_err(transport_error)?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(FetchError::Http(status.as_u16()));
        }

        let body = read_text_limited(response, MAX_BODY_SIZE)?;
        if body.trim().is_empty() {
            return Err(FetchError::NoCredentials);
        }
        Ok(body)
    }

    fn retrieve_role_credentials(&self) -> Result<Option<Credential>, FetchError> {
        let client = MetadataClient::new(self.timeout, &self.base_url)?;
        let token = self.fetch_token(&client)?;
        let token = token.as_deref();

        let role_name = self.get_with_retry(&client, CREDENTIALS_PATH, token, |body| {
            parse_role_name(body).ok_or(FetchError::NoCredentials)
        })?;

        let path = format!("{CREDENTIALS_PATH}{role_name}");
        let document = self.get_with_retry(&client, &path, token, |body| {
            serde_json::from_str::<CredentialDocument>(body).map_err(FetchError::from)
        })?;

        Ok(document.into_credential(&role_name))
    }
}

impl CredentialFetcher for InstanceMetadataFetcher {
    /// A rejected token request or exhausted retries mean the instance has
    /// nothing to offer, and are reported as `Ok(None)`.
    fn retrieve(&self) -> Result<Option<Credential>, FetchError> {
        match self.retrieve_role_credentials() {
            Err(e @ (FetchError::RetriesExceeded { .. } | FetchError::BadRequest)) => {
                tracing::debug!(error = %e, "no credentials from instance metadata service");
                Ok(None)
            }
            result => result,
        }
    }
}

impl CredentialDocument {
    fn into_credential(self, role_name: &str) -> Option<Credential> {
        match (
            self.access_key_id,
            self.secret_access_key,
            self.token,
            self.expiration,
        ) {
            (Some(access_key), Some(secret_key), Some(token), Some(expiration)) => Some(
                Credential::new(access_key, secret_key, Some(token), expiration)
                    .with_role_name(role_name),
            ),
            _ => {
                if let (Some(code), Some(message)) = (&self.code, &self.message) {
                    tracing::debug!(%code, %message, "error response received when retrieving credentials");
                }
                None
            }
        }
    }
}

/// The role listing names one role per line; the first one is used.
fn parse_role_name(body: &str) -> Option<String> {
    body.lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths() {
        assert_eq!(TOKEN_PATH, "/latest/api/token");
        assert_eq!(CREDENTIALS_PATH, "/latest/meta-data/iam/security-credentials/");
    }

    #[test]
    fn test_parse_role_name() {
        assert_eq!(parse_role_name("web-role\n"), Some("web-role".to_string()));
        assert_eq!(
            parse_role_name("\nfirst\nsecond"),
            Some("first".to_string())
        );
        assert_eq!(parse_role_name("  \n"), None);
    }

    #[test]
    fn test_document_into_credential() {
        let document: CredentialDocument = serde_json::from_str(
            r#"{
                "Code": "Success",
                "LastUpdated": "2026-10-18T08:00:00Z",
                "Type": "AWS-HMAC",
                "AccessKeyId": "ASIAEXAMPLE",
                "SecretAccessKey": "secret",
                "Token": "token",
                "Expiration": "2026-10-18T14:00:00Z"
            }"#,
        )
        .unwrap();
        let credential = document.into_credential("web").unwrap();
        assert_eq!(credential.access_key(), "ASIAEXAMPLE");
        assert_eq!(credential.secret_key(), "secret");
        assert_eq!(credential.session_token(), Some("token"));
        assert_eq!(credential.role_name(), Some("web"));
        assert_eq!(
            credential.expiry().to_rfc3339(),
            "2026-10-18T14:00:00+00:00"
        );
    }

    #[test]
    fn test_document_missing_fields() {
        let document: CredentialDocument = serde_json::from_str(
            r#"{"Code": "AssumeRoleUnauthorizedAccess", "Message": "denied"}"#,
        )
        .unwrap();
        assert!(document.into_credential("web").is_none());
    }

    #[test]
    fn test_attempts_at_least_one() {
        let fetcher = InstanceMetadataFetcher::new("http://localhost", Duration::from_millis(5), 0);
        assert_eq!(fetcher.num_attempts(), 1);
    }
}
