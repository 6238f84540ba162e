//! Sessions handed to client code, and the factory that builds them.

use std::collections::BTreeMap;

use crate::config::ProviderConfig;
use crate::credential::Credential;
use crate::error::FetchError;
use crate::refreshable::RefreshableCredentials;

/// Config variable holding the session region.
pub const REGION_VARIABLE: &str = "region";

/// How a session authenticates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionKind {
    /// Bound to credentials that refresh themselves.
    Refreshable,
    /// Ambient configuration; credentials come from whatever the caller's
    /// default chain provides, possibly none.
    Default,
}

/// A session from which service clients are built.
#[derive(Debug, Clone)]
pub struct Session {
    kind: SessionKind,
    credentials: Option<RefreshableCredentials>,
    config: BTreeMap<String, String>,
}

impl Session {
    /// A session bound to refreshable credentials.
    pub fn refreshable(credentials: RefreshableCredentials) -> Self {
        Self {
            kind: SessionKind::Refreshable,
            credentials: Some(credentials),
            config: BTreeMap::new(),
        }
    }

    /// A session with no explicit credentials.
    pub fn ambient() -> Self {
        Self {
            kind: SessionKind::Default,
            credentials: None,
            config: BTreeMap::new(),
        }
    }

    pub fn kind(&self) -> SessionKind {
        self.kind
    }

    pub fn is_refreshable(&self) -> bool {
        self.kind == SessionKind::Refreshable
    }

    pub fn set_config_variable(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.config.insert(name.into(), value.into());
    }

    pub fn config_variable(&self, name: &str) -> Option<&str> {
        self.config.get(name).map(String::as_str)
    }

    pub fn region(&self) -> Option<&str> {
        self.config_variable(REGION_VARIABLE)
    }

    /// The refreshable credential binding, if any.
    pub fn refreshable_credentials(&self) -> Option<&RefreshableCredentials> {
        self.credentials.as_ref()
    }

    /// Current credentials, refreshed first if they are about to expire.
    ///
    /// Default sessions carry no credentials and return `Ok(None)`.
    pub fn credentials(&self) -> Result<Option<Credential>, FetchError> {
        self.credentials
            .as_ref()
            .map(RefreshableCredentials::frozen_credentials)
            .transpose()
    }
}

/// Builds sessions for the provider.
pub trait SessionFactory: Send + Sync {
    /// A session bound to `credentials`, with `region` configured when given.
    fn refreshable(&self, credentials: RefreshableCredentials, region: Option<&str>) -> Session;

    /// The fallback session used when credentials could not be fetched.
    fn default_session(&self) -> Session;
}

/// Factory producing [`Session`] values with an ambient region for the fallback.
#[derive(Debug, Clone, Default)]
pub struct DefaultSessionFactory {
    ambient_region: Option<String>,
}

impl DefaultSessionFactory {
    pub fn new(ambient_region: Option<String>) -> Self {
        Self { ambient_region }
    }

    /// Use the region of `config` for default sessions.
    pub fn from_config(config: &ProviderConfig) -> Self {
        Self::new(config.region.clone())
    }

    /// Pick up the ambient region from `AWS_REGION` or `AWS_DEFAULT_REGION`.
    pub fn from_env() -> Self {
        Self::from_config(&ProviderConfig::from_env())
    }

    pub fn ambient_region(&self) -> Option<&str> {
        self.ambient_region.as_deref()
    }
}

impl SessionFactory for DefaultSessionFactory {
    fn refreshable(&self, credentials: RefreshableCredentials, region: Option<&str>) -> Session {
        let mut session = Session::refreshable(credentials);
        if let Some(region) = region {
            session.set_config_variable(REGION_VARIABLE, region);
        }
        session
    }

    fn default_session(&self) -> Session {
        let mut session = Session::ambient();
        if let Some(region) = &self.ambient_region {
            session.set_config_variable(REGION_VARIABLE, region.as_str());
        }
        session
    }
}
