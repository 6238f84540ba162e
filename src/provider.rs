//! The refreshable credential provider.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::config::ProviderConfig;
use crate::credential::Credential;
use crate::error::FetchError;
use crate::fetcher::CredentialFetcher;
use crate::id::{IdGenerator, RandomIdGenerator};
use crate::imds::InstanceMetadataFetcher;
use crate::refreshable::RefreshableCredentials;
use crate::session::{DefaultSessionFactory, Session, SessionFactory};

/// Method tag attached to credentials fetched by the provider.
pub const METHOD: &str = "iam-role";

/// Canonical name of the credential source.
pub const CANONICAL_NAME: &str = "Ec2InstanceMetadata";

/// Where a provider is in its fetch lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderState {
    /// Nothing fetched yet.
    Uninitialized,
    /// A fetch is running.
    Fetching,
    /// The last fetch succeeded.
    Refreshed,
    /// The last session build failed to fetch and returned a default session.
    FellBack,
}

impl fmt::Display for ProviderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderState::Uninitialized => write!(f, "uninitialized"),
            ProviderState::Fetching => write!(f, "fetching"),
            ProviderState::Refreshed => write!(f, "refreshed"),
            ProviderState::FellBack => write!(f, "fell back"),
        }
    }
}

/// Keys from the most recent successful fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
struct KeyPair {
    access_key: String,
    secret_key: String,
}

/// State shared between the provider and the refresh callbacks it hands out.
struct Shared {
    fetcher: Arc<dyn CredentialFetcher>,
    keys: Mutex<Option<KeyPair>>,
    state: Mutex<ProviderState>,
}

impl Shared {
    /// Call the fetcher once. Last writer wins on the recorded keys. A failed
    /// fetch only rolls the state back while it still reads `Fetching`, so it
    /// never undoes the outcome of a concurrent fetch.
    fn fetch(&self) -> Result<Credential, FetchError> {
        let previous = std::mem::replace(&mut *lock(&self.state), ProviderState::Fetching);

        let result = match self.fetcher.retrieve() {
            Ok(Some(credential)) if credential.is_expired() => Err(FetchError::Expired),
            Ok(Some(credential)) => Ok(credential),
            Ok(None) => Err(FetchError::NoCredentials),
            Err(e) => Err(e),
        };

        match &result {
            Ok(credential) => {
                if let Some(role_name) = credential.role_name() {
                    tracing::debug!(%role_name, "found credentials from IAM role");
                }
                *lock(&self.keys) = Some(KeyPair {
                    access_key: credential.access_key().to_string(),
                    secret_key: credential.secret_key().to_string(),
                });
                *lock(&self.state) = ProviderState::Refreshed;
            }
            Err(_) => {
                let mut state = lock(&self.state);
                if *state == ProviderState::Fetching {
                    *state = previous;
                }
            }
        }
        result
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Produces sessions whose credentials refresh themselves before expiry, so a
/// long-lived session (and the clients built from it) can be cached.
///
/// # Example
///
/// ```ignore
/// use imds_session::RefreshableCredentialProvider;
///
/// let provider = RefreshableCredentialProvider::from_env();
/// let session = provider.refreshable_session();
/// if let Some(credentials) = session.credentials()? {
///     println!("using {}", credentials.access_key());
/// }
/// ```
///
/// Building a session never fails: if credentials cannot be fetched, the
/// session factory's default session is returned instead.
///
/// The provider caches no credential itself; each session's cached credential
/// lives in its [`RefreshableCredentials`]. [`ProviderState`] only tracks the
/// fetch lifecycle.
pub struct RefreshableCredentialProvider {
    region: Option<String>,
    session_name: String,
    shared: Arc<Shared>,
    session_factory: Arc<dyn SessionFactory>,
}

impl RefreshableCredentialProvider {
    /// Create a provider backed by the instance metadata service.
    ///
    /// Performs no I/O. `session_name` defaults to a random 32-character hex id.
    pub fn new(
        region: Option<String>,
        session_name: Option<String>,
        timeout: Duration,
        fetch_attempts: u32,
    ) -> Self {
        let config = ProviderConfig {
            region,
            session_name,
            timeout,
            fetch_attempts,
            ..ProviderConfig::default()
        };
        Self::from_config(config)
    }

    /// Create a provider from explicit configuration.
    pub fn from_config(config: ProviderConfig) -> Self {
        Self::builder().config(config).build()
    }

    /// Create a provider configured from the process environment.
    pub fn from_env() -> Self {
        Self::builder()
            .config(ProviderConfig::from_env())
            .session_factory(DefaultSessionFactory::from_env())
            .build()
    }

    pub fn builder() -> Builder {
        Builder::default()
    }

    pub fn region(&self) -> Option<&str> {
        self.region.as_deref()
    }

    /// Role session name, fixed for the provider's lifetime.
    pub fn session_name(&self) -> &str {
        &self.session_name
    }

    pub fn method(&self) -> &'static str {
        METHOD
    }

    pub fn state(&self) -> ProviderState {
        *lock(&self.shared.state)
    }

    /// Access key from the most recent successful fetch.
    pub fn access_key(&self) -> Option<String> {
        lock(&self.shared.keys)
            .as_ref()
            .map(|keys| keys.access_key.clone())
    }

    /// Secret key from the most recent successful fetch.
    pub fn secret_key(&self) -> Option<String> {
        lock(&self.shared.keys)
            .as_ref()
            .map(|keys| keys.secret_key.clone())
    }

    /// Fetch credentials once and bind them to a callback that fetches again.
    ///
    /// # Errors
    ///
    /// Returns `FetchError::NoCredentials` when the fetcher had nothing usable,
    /// or the fetcher's own error.
    pub fn fetch_credentials(&self) -> Result<RefreshableCredentials, FetchError> {
        let credential = self.shared.fetch()?;

        let shared = Arc::clone(&self.shared);
        let refresh_using: Arc<dyn CredentialFetcher> =
            Arc::new(move || shared.fetch().map(Some));

        Ok(RefreshableCredentials::create_from_metadata(
            credential,
            refresh_using,
            METHOD,
        ))
    }

    /// Build a session bound to refreshable credentials.
    ///
    /// Any fetch failure is logged and answered with the default session.
    /// The returned session may therefore be unauthenticated; check
    /// [`Session::is_refreshable`] when that matters.
    pub fn refreshable_session(&self) -> Session {
        match self.fetch_credentials() {
            Ok(credentials) => self
                .session_factory
                .refreshable(credentials, self.region.as_deref()),
            Err(e) => {
                if e.is_no_credentials() {
                    tracing::debug!(session_name = %self.session_name, "no instance credentials, using default session");
                } else {
                    tracing::warn!(session_name = %self.session_name, error = %e, "credential fetch failed, using default session");
                }
                *lock(&self.shared.state) = ProviderState::FellBack;
                self.session_factory.default_session()
            }
        }
    }
}

impl fmt::Debug for RefreshableCredentialProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RefreshableCredentialProvider")
            .field("region", &self.region)
            .field("session_name", &self.session_name)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

/// Assembles a [`RefreshableCredentialProvider`] with substitutable collaborators.
#[derive(Default)]
pub struct Builder {
    config: ProviderConfig,
    fetcher: Option<Arc<dyn CredentialFetcher>>,
    session_factory: Option<Arc<dyn SessionFactory>>,
    id_generator: Option<Box<dyn IdGenerator>>,
}

impl Builder {
    pub fn config(mut self, config: ProviderConfig) -> Self {
        self.config = config;
        self
    }

    pub fn region(mut self, region: impl Into<String>) -> Self {
        self.config.region = Some(region.into());
        self
    }

    pub fn session_name(mut self, session_name: impl Into<String>) -> Self {
        self.config.session_name = Some(session_name.into());
        self
    }

    /// Use `fetcher` instead of the instance metadata service.
    pub fn fetcher(mut self, fetcher: impl CredentialFetcher + 'static) -> Self {
        self.fetcher = Some(Arc::new(fetcher));
        self
    }

    pub fn session_factory(mut self, factory: impl SessionFactory + 'static) -> Self {
        self.session_factory = Some(Arc::new(factory));
        self
    }

    /// Generator for the session name when none is configured.
    pub fn id_generator(mut self, generator: impl IdGenerator + 'static) -> Self {
        self.id_generator = Some(Box::new(generator));
        self
    }

    pub fn build(self) -> RefreshableCredentialProvider {
        let session_name = match self.config.session_name.clone() {
            Some(name) => name,
            None => match &self.id_generator {
                Some(generator) => generator.generate(),
                None => RandomIdGenerator.generate(),
            },
        };

        let fetcher = self
            .fetcher
            .unwrap_or_else(|| Arc::new(InstanceMetadataFetcher::from_config(&self.config)));
        let session_factory = self
            .session_factory
            .unwrap_or_else(|| Arc::new(DefaultSessionFactory::default()));

        RefreshableCredentialProvider {
            region: self.config.region,
            session_name,
            shared: Arc::new(Shared {
                fetcher,
                keys: Mutex::new(None),
                state: Mutex::new(ProviderState::Uninitialized),
            }),
            session_factory,
        }
    }
}
