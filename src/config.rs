//! Provider configuration, read once at construction.

use std::time::Duration;

use crate::client::{DEFAULT_BASE_URL, DEFAULT_TIMEOUT};

/// Environment variable holding the metadata request timeout in milliseconds.
pub const TIMEOUT_ENV: &str = "CREDENTIALS_TIMEOUT";

/// Environment variables consulted for the region, in order.
pub const REGION_ENV: [&str; 2] = ["AWS_REGION", "AWS_DEFAULT_REGION"];

/// Environment variable overriding the metadata service endpoint.
pub const ENDPOINT_ENV: &str = "AWS_EC2_METADATA_SERVICE_ENDPOINT";

/// Default number of attempts per metadata request.
pub const DEFAULT_FETCH_ATTEMPTS: u32 = 3;

/// Settings for a [`RefreshableCredentialProvider`](crate::RefreshableCredentialProvider).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderConfig {
    pub region: Option<String>,
    pub session_name: Option<String>,
    pub timeout: Duration,
    pub fetch_attempts: u32,
    pub base_url: String,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            region: None,
            session_name: None,
            timeout: DEFAULT_TIMEOUT,
            fetch_attempts: DEFAULT_FETCH_ATTEMPTS,
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }
}

impl ProviderConfig {
    /// Read configuration from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(raw) = lookup(TIMEOUT_ENV) {
            match raw.trim().parse::<u64>() {
                Ok(ms) => config.timeout = Duration::from_millis(ms),
                Err(_) => tracing::warn!(
                    value = %raw,
                    "ignoring unparsable {TIMEOUT_ENV}, using {}ms",
                    DEFAULT_TIMEOUT.as_millis()
                ),
            }
        }

        config.region = REGION_ENV
            .iter()
            .filter_map(|key| lookup(*key))
            .find(|value| !value.is_empty());

        if let Some(endpoint) = lookup(ENDPOINT_ENV).filter(|v| !v.is_empty()) {
            config.base_url = endpoint;
        }

        config
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    pub fn with_session_name(mut self, session_name: impl Into<String>) -> Self {
        self.session_name = Some(session_name.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_fetch_attempts(mut self, fetch_attempts: u32) -> Self {
        self.fetch_attempts = fetch_attempts;
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}
