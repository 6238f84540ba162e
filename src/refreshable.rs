//! Credentials that replace themselves as expiry approaches.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, TryLockError};
use std::time::Duration;

use crate::credential::Credential;
use crate::error::FetchError;
use crate::fetcher::CredentialFetcher;

/// Window before expiry in which a refresh is attempted but may fail.
pub const ADVISORY_REFRESH_TIMEOUT: Duration = Duration::from_secs(15 * 60);

/// Window before expiry in which a refresh must succeed.
pub const MANDATORY_REFRESH_TIMEOUT: Duration = Duration::from_secs(10 * 60);

/// A credential bound to the capability that produces its replacement.
///
/// Clones share the same cached credential, so a refresh observed through one
/// clone is visible to all of them. Only one refresh runs at a time. Inside the
/// advisory window readers never wait for it and keep the current credential;
/// inside the mandatory window they wait and reuse its result.
#[derive(Clone)]
pub struct RefreshableCredentials {
    current: Arc<Mutex<Credential>>,
    refreshing: Arc<Mutex<()>>,
    refresh_using: Arc<dyn CredentialFetcher>,
    method: String,
    advisory_timeout: Duration,
    mandatory_timeout: Duration,
}

impl RefreshableCredentials {
    /// Bind an already fetched credential to its refresh capability.
    pub fn create_from_metadata(
        credential: Credential,
        refresh_using: Arc<dyn CredentialFetcher>,
        method: impl Into<String>,
    ) -> Self {
        Self {
            current: Arc::new(Mutex::new(credential)),
            refreshing: Arc::new(Mutex::new(())),
            refresh_using,
            method: method.into(),
            advisory_timeout: ADVISORY_REFRESH_TIMEOUT,
            mandatory_timeout: MANDATORY_REFRESH_TIMEOUT,
        }
    }

    /// Override the refresh windows. The advisory window is never shorter
    /// than the mandatory one.
    pub fn with_refresh_windows(mut self, advisory: Duration, mandatory: Duration) -> Self {
        self.advisory_timeout = advisory.max(mandatory);
        self.mandatory_timeout = mandatory;
        self
    }

    /// Tag naming where these credentials came from.
    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn advisory_timeout(&self) -> Duration {
        self.advisory_timeout
    }

    pub fn mandatory_timeout(&self) -> Duration {
        self.mandatory_timeout
    }

    /// The cached credential, without checking expiry.
    pub fn current(&self) -> Credential {
        self.lock().clone()
    }

    /// Whether the next read will attempt a refresh.
    pub fn refresh_needed(&self) -> bool {
        self.lock().expires_within(self.advisory_timeout)
    }

    /// A consistent snapshot of usable credentials, refreshing first if the
    /// cached ones are close to expiry.
    ///
    /// # Errors
    ///
    /// Fails only when the cached credential is inside the mandatory window
    /// and the refresh did not produce a valid replacement.
    pub fn frozen_credentials(&self) -> Result<Credential, FetchError> {
        let snapshot = self.current();
        if !snapshot.expires_within(self.advisory_timeout) {
            return Ok(snapshot);
        }

        if snapshot.expires_within(self.mandatory_timeout) {
            return self.mandatory_refresh();
        }

        let _refreshing = match self.refreshing.try_lock() {
            Ok(guard) => guard,
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
            Err(TryLockError::WouldBlock) => return Ok(snapshot),
        };
        let latest = self.current();
        if !latest.expires_within(self.advisory_timeout) {
            return Ok(latest);
        }

        match self.refresh() {
            Ok(fresh) => Ok(self.replace(fresh)),
            Err(e) => {
                tracing::warn!(method = %self.method, error = %e, "advisory credential refresh failed, keeping current credentials");
                Ok(latest)
            }
        }
    }

    fn mandatory_refresh(&self) -> Result<Credential, FetchError> {
        let _refreshing = self
            .refreshing
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let latest = self.current();
        if !latest.expires_within(self.mandatory_timeout) {
            return Ok(latest);
        }

        match self.refresh() {
            Ok(fresh) => Ok(self.replace(fresh)),
            Err(e) => {
                tracing::warn!(method = %self.method, error = %e, "mandatory credential refresh failed");
                Err(e)
            }
        }
    }

    fn replace(&self, fresh: Credential) -> Credential {
        tracing::debug!(method = %self.method, expiry = %fresh.expiry(), "credentials refreshed");
        *self.lock() = fresh.clone();
        fresh
    }

    fn refresh(&self) -> Result<Credential, FetchError> {
        match self.refresh_using.retrieve()? {
            Some(fresh) if fresh.is_expired() => Err(FetchError::Expired),
            Some(fresh) => Ok(fresh),
            None => Err(FetchError::NoCredentials),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Credential> {
        self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for RefreshableCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RefreshableCredentials")
            .field("current", &*self.lock())
            .field("method", &self.method)
            .field("advisory_timeout", &self.advisory_timeout)
            .field("mandatory_timeout", &self.mandatory_timeout)
            .finish_non_exhaustive()
    }
}
