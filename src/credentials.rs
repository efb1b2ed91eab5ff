//! Process-wide credential storage
//!
//! One credential bundle exists per process. Writers replace it wholesale;
//! readers take a snapshot and keep working with it even if the bundle is
//! replaced mid-scrape. A generation counter lets the Auth Manager detect
//! replacement and discard any cached status.

use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;

use crate::error::{Error, Result};

/// A parsed cookie-bundle credential
///
/// Construction validates the bundle: it must contain at least one
/// `name=value` pair. The raw bundle is kept verbatim for the driver and
/// the liveness probe; only the pair count is ever exposed to API callers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Credential {
    cookies: String,
    cookie_count: usize,
}

impl Credential {
    /// Parse a raw cookie bundle (`name=value; name2=value2; …`)
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(Error::InvalidCredential(
                "cookie bundle is empty".to_string(),
            ));
        }

        let cookie_count = trimmed
            .split(';')
            .map(str::trim)
            .filter(|pair| {
                pair.split_once('=')
                    .is_some_and(|(name, _)| !name.trim().is_empty())
            })
            .count();

        if cookie_count == 0 {
            return Err(Error::InvalidCredential(
                "cookie bundle contains no name=value pairs".to_string(),
            ));
        }

        Ok(Self {
            cookies: trimmed.to_string(),
            cookie_count,
        })
    }

    /// The raw bundle, for the driver and the probe
    pub fn cookies(&self) -> &str {
        &self.cookies
    }

    /// Number of cookie pairs in the bundle
    pub fn cookie_count(&self) -> usize {
        self.cookie_count
    }
}

// The raw bundle is a session secret; never let Debug output leak it
impl std::fmt::Display for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "credential({} cookies)", self.cookie_count)
    }
}

/// Process-wide credential store
///
/// Snapshot-on-read: `snapshot` hands out a clone, so in-flight jobs keep
/// the credential they started with regardless of later `set`/`clear`
/// calls. Every write bumps the generation counter.
#[derive(Debug, Default)]
pub struct CredentialStore {
    inner: RwLock<Option<Credential>>,
    generation: AtomicU64,
}

impl CredentialStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the stored credential, returning the new generation
    pub async fn set(&self, credential: Credential) -> u64 {
        let mut guard = self.inner.write().await;
        *guard = Some(credential);
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Remove the stored credential
    pub async fn clear(&self) {
        let mut guard = self.inner.write().await;
        if guard.take().is_some() {
            self.generation.fetch_add(1, Ordering::SeqCst);
        }
    }

    /// Snapshot the current credential (clone, not a reference)
    pub async fn snapshot(&self) -> Option<Credential> {
        self.inner.read().await.clone()
    }

    /// Current generation; changes whenever the stored credential does
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }
}
