//! Authentication tier management
//!
//! The [`AuthManager`] classifies the stored credential into one of three
//! tiers by probing the target service for liveness. Status is derived, not
//! stored: it is cached only per credential generation, so replacing the
//! credential makes the next query re-probe.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::config::ProbeConfig;
use crate::credentials::{Credential, CredentialStore};
use crate::error::{Error, ProbeError, Result};
use crate::types::{AuthStatus, AuthTier};

/// Outcome of a liveness probe against the target service
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// The credential was rejected outright
    Unauthenticated,
    /// The credential was accepted but only a degraded identity resolved
    Degraded {
        /// Partial identity, when the service leaked one
        identity_id: Option<String>,
    },
    /// The credential resolved a full identity
    Full {
        /// Resolved identity id
        identity_id: String,
    },
}

/// Checks whether a credential is currently accepted by the target service
///
/// Implementations must be safe to call concurrently with running scrapes;
/// the probe touches the target service read-only.
#[async_trait]
pub trait LivenessProbe: Send + Sync {
    /// Probe the target service with the given credential
    async fn probe(
        &self,
        credential: Option<&Credential>,
    ) -> std::result::Result<ProbeOutcome, ProbeError>;
}

/// Classifies credentials and answers tier queries
///
/// Cheap to clone; all state is shared.
#[derive(Clone)]
pub struct AuthManager {
    store: Arc<CredentialStore>,
    probe: Arc<dyn LivenessProbe>,
    cached: Arc<tokio::sync::Mutex<Option<(u64, AuthStatus)>>>,
}

impl AuthManager {
    /// Create a manager over a credential store and a probe implementation
    pub fn new(store: Arc<CredentialStore>, probe: Arc<dyn LivenessProbe>) -> Self {
        Self {
            store,
            probe,
            cached: Arc::new(tokio::sync::Mutex::new(None)),
        }
    }

    /// The underlying credential store
    pub fn store(&self) -> &Arc<CredentialStore> {
        &self.store
    }

    /// Current authentication status
    ///
    /// Probes the target service on the first call per credential
    /// generation; later calls within the same generation return the
    /// cached classification. Replacing the credential invalidates the
    /// cache, so there is no path from anonymous to a higher tier without
    /// a fresh probe.
    pub async fn check_status(&self) -> Result<AuthStatus> {
        let generation = self.store.generation();

        {
            let cached = self.cached.lock().await;
            if let Some((cached_gen, status)) = cached.as_ref() {
                if *cached_gen == generation {
                    return Ok(status.clone());
                }
            }
        }

        let credential = self.store.snapshot().await;
        let status = self.classify(credential.as_ref()).await?;

        let mut cached = self.cached.lock().await;
        *cached = Some((generation, status.clone()));
        Ok(status)
    }

    /// Store a full-session cookie bundle and reclassify
    ///
    /// Validation failures leave the store untouched. A stored bundle that
    /// the probe then rejects is kept (the caller may retry scrapes with
    /// it later) and reported as basic_authenticated.
    pub async fn setup_full_auth(&self, raw_cookies: &str) -> Result<AuthStatus> {
        let credential = Credential::parse(raw_cookies)?;
        let generation = self.store.set(credential.clone()).await;
        debug!(cookie_count = credential.cookie_count(), "credential replaced");

        let status = self.classify(Some(&credential)).await?;

        let mut cached = self.cached.lock().await;
        *cached = Some((generation, status.clone()));
        Ok(status)
    }

    /// Current tier without the full status report
    ///
    /// Used by the job controller at job start; probe failures degrade to
    /// anonymous rather than failing the job.
    pub async fn current_tier(&self) -> AuthTier {
        match self.check_status().await {
            Ok(status) => status.tier,
            Err(e) => {
                warn!(error = %e, "liveness probe failed; treating tier as anonymous");
                AuthTier::Anonymous
            }
        }
    }

    /// Run the probe (with one retry on a transient fault) and classify
    async fn classify(&self, credential: Option<&Credential>) -> Result<AuthStatus> {
        let Some(credential) = credential else {
            return Ok(anonymous_status());
        };

        let outcome = match self.probe.probe(Some(credential)).await {
            Ok(outcome) => outcome,
            Err(e) if e.is_transient() => {
                warn!(error = %e, "transient probe fault, retrying once");
                self.probe.probe(Some(credential)).await.map_err(Error::from)?
            }
            Err(e) => return Err(e.into()),
        };

        Ok(match outcome {
            ProbeOutcome::Full { identity_id } => {
                full_status(Some(identity_id), credential.cookie_count())
            }
            ProbeOutcome::Degraded { identity_id } => {
                basic_status(identity_id, credential.cookie_count())
            }
            ProbeOutcome::Unauthenticated => basic_status(None, credential.cookie_count()),
        })
    }
}

fn anonymous_status() -> AuthStatus {
    AuthStatus {
        tier: AuthTier::Anonymous,
        message: "No credential configured; scraping anonymously".to_string(),
        identity_id: None,
        cookie_count: None,
        benefits: vec![],
        limitations: vec![
            "Limited to the first page of posts per profile".to_string(),
            "Cannot access private profiles".to_string(),
            "Subject to strict rate limiting".to_string(),
        ],
    }
}

fn basic_status(identity_id: Option<String>, cookie_count: usize) -> AuthStatus {
    AuthStatus {
        tier: AuthTier::BasicAuthenticated,
        message: "Credential stored but not confirmed as a full session".to_string(),
        identity_id,
        cookie_count: Some(cookie_count),
        benefits: vec![
            "Higher post limits than anonymous scraping".to_string(),
            "Reduced rate limiting".to_string(),
        ],
        limitations: vec![
            "Identity not fully resolved; privileged endpoints may refuse".to_string(),
            "Private profiles may remain inaccessible".to_string(),
        ],
    }
}

fn full_status(identity_id: Option<String>, cookie_count: usize) -> AuthStatus {
    AuthStatus {
        tier: AuthTier::FullAuthenticated,
        message: "Full session authentication active".to_string(),
        identity_id,
        cookie_count: Some(cookie_count),
        benefits: vec![
            "Maximum authentication level".to_string(),
            "Complete browser session cookies loaded".to_string(),
            "Best chance to capture every post".to_string(),
            "Reduced rate limiting".to_string(),
            "Access to authorized private content".to_string(),
        ],
        limitations: vec![],
    }
}

/// HTTP implementation of [`LivenessProbe`] backed by reqwest
///
/// Issues a GET against the configured endpoint with the cookie bundle in
/// the `Cookie` header and classifies the response:
/// - 401/403 ⇒ unauthenticated
/// - 2xx with a resolvable identity id in the JSON body ⇒ full
/// - 2xx without one ⇒ degraded
/// - timeouts and transport failures ⇒ transient probe faults
pub struct HttpLivenessProbe {
    client: reqwest::Client,
    endpoint: String,
    timeout: Duration,
}

impl HttpLivenessProbe {
    /// Build a probe from configuration
    pub fn new(config: &ProbeConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()?;
        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            timeout: config.timeout(),
        })
    }

    /// Pull an identity id out of the probe response body, if present
    fn extract_identity(body: &serde_json::Value) -> Option<String> {
        let candidate = body
            .pointer("/user/id")
            .or_else(|| body.pointer("/user/pk"))
            .or_else(|| body.get("id"))
            .or_else(|| body.get("pk"))?;
        match candidate {
            serde_json::Value::String(s) if !s.is_empty() => Some(s.clone()),
            serde_json::Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }
}

#[async_trait]
impl LivenessProbe for HttpLivenessProbe {
    async fn probe(
        &self,
        credential: Option<&Credential>,
    ) -> std::result::Result<ProbeOutcome, ProbeError> {
        let mut request = self.client.get(&self.endpoint);
        if let Some(credential) = credential {
            request = request.header(reqwest::header::COOKIE, credential.cookies());
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                ProbeError::Timeout(self.timeout)
            } else {
                ProbeError::Transport(e.to_string())
            }
        })?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED
            || status == reqwest::StatusCode::FORBIDDEN
        {
            return Ok(ProbeOutcome::Unauthenticated);
        }
        if status.is_server_error() {
            return Err(ProbeError::Transport(format!(
                "target service answered {}",
                status
            )));
        }
        if !status.is_success() {
            return Err(ProbeError::UnexpectedResponse(format!(
                "target service answered {}",
                status
            )));
        }

        match response.json::<serde_json::Value>().await {
            Ok(body) => match Self::extract_identity(&body) {
                Some(identity_id) => Ok(ProbeOutcome::Full { identity_id }),
                None => Ok(ProbeOutcome::Degraded { identity_id: None }),
            },
            // A 2xx that is not JSON still proves the credential is accepted
            Err(_) => Ok(ProbeOutcome::Degraded { identity_id: None }),
        }
    }
}
