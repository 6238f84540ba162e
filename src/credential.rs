//! Immutable credential values.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};

/// A fetched credential set.
///
/// Credentials are never mutated in place; a refresh replaces the whole value.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    access_key: String,
    secret_key: String,
    session_token: Option<String>,
    expiry: DateTime<Utc>,
    role_name: Option<String>,
}

impl Credential {
    /// Create a credential expiring at `expiry`.
    pub fn new(
        access_key: impl Into<String>,
        secret_key: impl Into<String>,
        session_token: Option<String>,
        expiry: DateTime<Utc>,
    ) -> Self {
        Self {
            access_key: access_key.into(),
            secret_key: secret_key.into(),
            session_token,
            expiry,
            role_name: None,
        }
    }

    /// Attach the name of the role these credentials were issued for.
    pub fn with_role_name(mut self, role_name: impl Into<String>) -> Self {
        self.role_name = Some(role_name.into());
        self
    }

    pub fn access_key(&self) -> &str {
        &self.access_key
    }

    pub fn secret_key(&self) -> &str {
        &self.secret_key
    }

    pub fn session_token(&self) -> Option<&str> {
        self.session_token.as_deref()
    }

    pub fn expiry(&self) -> DateTime<Utc> {
        self.expiry
    }

    pub fn role_name(&self) -> Option<&str> {
        self.role_name.as_deref()
    }

    /// Time left before expiry, or zero once expired.
    pub fn remaining(&self) -> Duration {
        (self.expiry - Utc::now()).to_std().unwrap_or(Duration::ZERO)
    }

    /// Whether the credential has expired.
    pub fn is_expired(&self) -> bool {
        self.expiry <= Utc::now()
    }

    /// Whether the credential expires within `window` from now.
    pub fn expires_within(&self, window: Duration) -> bool {
        self.remaining() <= window
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("access_key", &self.access_key)
            .field("secret_key", &"** redacted **")
            .field(
                "session_token",
                &self.session_token.as_ref().map(|_| "** redacted **"),
            )
            .field("expiry", &self.expiry)
            .field("role_name", &self.role_name)
            .finish()
    }
}
