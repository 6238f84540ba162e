//! Auto-refreshing credential sessions backed by the EC2 instance metadata service.
//!
//! A [`RefreshableCredentialProvider`] fetches role credentials from the
//! instance metadata service and hands out a [`Session`] whose credentials
//! replace themselves before they expire. Long-lived clients built from that
//! session can be cached without the caller managing token rotation.
//!
//! # Features
//!
//! - Lazy fetch: constructing a provider performs no I/O
//! - IMDSv2 session tokens, with IMDSv1 fallback
//! - Advisory and mandatory refresh windows ahead of expiry
//! - Fail-open session building: fetch failures yield the default session
//! - Substitutable fetcher, session factory and session-name generator
//!
//! # Example
//!
//! ```ignore
//! use imds_session::{FetchError, RefreshableCredentialProvider};
//!
//! fn main() -> Result<(), FetchError> {
//!     // Reads CREDENTIALS_TIMEOUT and AWS_REGION once
//!     let provider = RefreshableCredentialProvider::from_env();
//!
//!     // Never fails; falls back to the default session
//!     let session = provider.refreshable_session();
//!
//!     // Refreshes first if the credentials are about to expire
//!     if let Some(credentials) = session.credentials()? {
//!         println!("{}", credentials.access_key());
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Blocking
//!
//! All network calls block the calling thread. From async code, run them on
//! a blocking pool such as `tokio::task::spawn_blocking`.
//!
//! # Configuration
//!
//! | Variable | Meaning | Default |
//! |----------|---------|---------|
//! | `CREDENTIALS_TIMEOUT` | Metadata request timeout (ms) | 1000 |
//! | `AWS_REGION` / `AWS_DEFAULT_REGION` | Session region | unset |
//! | `AWS_EC2_METADATA_SERVICE_ENDPOINT` | Metadata service URL | `http://169.254.169.254` |

mod client;
mod config;
mod credential;
mod error;
mod fetcher;
mod id;
mod imds;
mod provider;
mod refreshable;
mod session;

pub use client::MAX_BODY_SIZE;
pub use config::{ProviderConfig, DEFAULT_FETCH_ATTEMPTS};
pub use credential::Credential;
pub use error::FetchError;
pub use fetcher::CredentialFetcher;
pub use id::{IdGenerator, RandomIdGenerator};
pub use imds::InstanceMetadataFetcher;
pub use provider::{
    Builder, ProviderState, RefreshableCredentialProvider, CANONICAL_NAME, METHOD,
};
pub use refreshable::{
    RefreshableCredentials, ADVISORY_REFRESH_TIMEOUT, MANDATORY_REFRESH_TIMEOUT,
};
pub use session::{DefaultSessionFactory, Session, SessionFactory, SessionKind};
