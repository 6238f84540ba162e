//! The credential source seam.

use crate::credential::Credential;
use crate::error::FetchError;

/// A source of credentials.
///
/// `Ok(None)` means the source answered but had nothing usable, which callers
/// treat as "try the next source". `Err` is a transport-level failure.
pub trait CredentialFetcher: Send + Sync {
    fn retrieve(&self) -> Result<Option<Credential>, FetchError>;
}

impl<F> CredentialFetcher for F
where
    F: Fn() -> Result<Option<Credential>, FetchError> + Send + Sync,
{
    fn retrieve(&self) -> Result<Option<Credential>, FetchError> {
        self()
    }
}
