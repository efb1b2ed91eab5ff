//! Configuration types for scrapeflow

use serde::{Deserialize, Serialize};
use std::{net::SocketAddr, time::Duration};
use utoipa::ToSchema;

/// Orchestrator behavior configuration (concurrency, buffers, retention)
///
/// Groups settings for how jobs are scheduled and how progress is buffered.
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct OrchestratorConfig {
    /// Maximum concurrent driver slots (default: 1)
    ///
    /// Browser-automation drivers are heavy; jobs beyond this limit stay
    /// `queued` until a slot frees up.
    #[serde(default = "default_max_concurrent_jobs")]
    pub max_concurrent_jobs: usize,

    /// Live event buffer capacity per subscriber (default: 256)
    ///
    /// A subscriber that falls more than this many events behind is
    /// disconnected with a slow-consumer error; the replay log is not
    /// bounded by this value.
    #[serde(default = "default_event_buffer_size")]
    pub event_buffer_size: usize,

    /// Default wait for `get_result` in seconds (default: 30)
    #[serde(default = "default_result_timeout_secs")]
    pub result_timeout_secs: u64,

    /// How long terminal jobs stay queryable, in seconds (default: 600)
    ///
    /// After this window the job entry and its replay log are dropped.
    #[serde(default = "default_job_retention_secs")]
    pub job_retention_secs: u64,
}

impl OrchestratorConfig {
    /// Default `get_result` wait as a Duration
    pub fn result_timeout(&self) -> Duration {
        Duration::from_secs(self.result_timeout_secs)
    }

    /// Terminal-job retention as a Duration
    pub fn job_retention(&self) -> Duration {
        Duration::from_secs(self.job_retention_secs)
    }
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: default_max_concurrent_jobs(),
            event_buffer_size: default_event_buffer_size(),
            result_timeout_secs: default_result_timeout_secs(),
            job_retention_secs: default_job_retention_secs(),
        }
    }
}

/// Liveness probe configuration
///
/// The bundled HTTP probe issues a GET against `endpoint` with the stored
/// cookie bundle attached and classifies the response.
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct ProbeConfig {
    /// Endpoint the probe targets (default: target-service account endpoint)
    #[serde(default = "default_probe_endpoint")]
    pub endpoint: String,

    /// Probe request timeout in seconds (default: 10)
    #[serde(default = "default_probe_timeout_secs")]
    pub timeout_secs: u64,
}

impl ProbeConfig {
    /// Probe timeout as a Duration
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            endpoint: default_probe_endpoint(),
            timeout_secs: default_probe_timeout_secs(),
        }
    }
}

/// REST API server configuration
///
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct ApiConfig {
    /// Whether to start the API server (default: false)
    ///
    /// The library can be embedded without any HTTP surface.
    #[serde(default)]
    pub enabled: bool,

    /// Bind address for the API server (default: 127.0.0.1:7878)
    #[serde(default = "default_bind_address")]
    pub bind_address: SocketAddr,

    /// Optional API key; when set, requests must carry it in `X-Api-Key`
    #[serde(default)]
    pub api_key: Option<String>,

    /// Whether to add a CORS layer (default: true)
    #[serde(default = "default_true")]
    pub cors_enabled: bool,

    /// Allowed CORS origins; `["*"]` means any (default: any)
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,

    /// Whether to mount Swagger UI at `/swagger-ui` (default: true)
    #[serde(default = "default_true")]
    pub swagger_ui: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            bind_address: default_bind_address(),
            api_key: None,
            cors_enabled: true,
            cors_origins: default_cors_origins(),
            swagger_ui: true,
        }
    }
}

/// Top-level configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct Config {
    /// Job scheduling and progress buffering
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,

    /// Liveness probe settings
    #[serde(default)]
    pub probe: ProbeConfig,

    /// REST API server settings
    #[serde(default)]
    pub api: ApiConfig,
}

fn default_max_concurrent_jobs() -> usize {
    1
}

fn default_event_buffer_size() -> usize {
    256
}

fn default_result_timeout_secs() -> u64 {
    30
}

fn default_job_retention_secs() -> u64 {
    600
}

fn default_probe_endpoint() -> String {
    "https://www.instagram.com/accounts/edit/".to_string()
}

fn default_probe_timeout_secs() -> u64 {
    10
}

fn default_bind_address() -> SocketAddr {
    // Bound to loopback: exposing the API wider is an operator decision
    "127.0.0.1:7878"
        .parse()
        .unwrap_or_else(|_| SocketAddr::from(([127, 0, 0, 1], 7878)))
}

fn default_cors_origins() -> Vec<String> {
    vec!["*".to_string()]
}

fn default_true() -> bool {
    true
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_sane_values() {
        let config = Config::default();
        assert_eq!(config.orchestrator.max_concurrent_jobs, 1);
        assert_eq!(config.orchestrator.event_buffer_size, 256);
        assert_eq!(config.orchestrator.result_timeout(), Duration::from_secs(30));
        assert_eq!(config.orchestrator.job_retention(), Duration::from_secs(600));
        assert_eq!(config.probe.timeout(), Duration::from_secs(10));
        assert!(!config.api.enabled);
        assert!(config.api.cors_enabled);
        assert!(config.api.swagger_ui);
        assert!(config.api.api_key.is_none());
    }

    #[test]
    fn empty_json_deserializes_to_defaults() {
        let config: Config = serde_json::from_str("{}").unwrap();
        assert_eq!(config.orchestrator.max_concurrent_jobs, 1);
        assert_eq!(config.api.bind_address.port(), 7878);
    }

    #[test]
    fn partial_json_overrides_only_named_fields() {
        let config: Config = serde_json::from_str(
            r#"{
                "orchestrator": { "max_concurrent_jobs": 4 },
                "api": { "enabled": true, "api_key": "secret" }
            }"#,
        )
        .unwrap();
        assert_eq!(config.orchestrator.max_concurrent_jobs, 4);
        assert_eq!(config.orchestrator.event_buffer_size, 256, "untouched default");
        assert!(config.api.enabled);
        assert_eq!(config.api.api_key.as_deref(), Some("secret"));
    }

    #[test]
    fn config_round_trips_through_json() {
        let config = Config::default();
        let json = serde_json::to_string(&config).unwrap();
        let back: Config = serde_json::from_str(&json).unwrap();
        assert_eq!(
            back.orchestrator.max_concurrent_jobs,
            config.orchestrator.max_concurrent_jobs
        );
        assert_eq!(back.probe.endpoint, config.probe.endpoint);
    }
}
