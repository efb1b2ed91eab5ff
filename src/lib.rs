//! # scrapeflow
//!
//! Backend library for orchestrating social-media scrape jobs.
//!
//! ## Design Philosophy
//!
//! scrapeflow is designed to be:
//! - **Driver-agnostic** - The browser/HTTP engine is injected behind a trait
//! - **Sensible defaults** - Works out of the box with zero configuration
//! - **Library-first** - No CLI or UI, purely a Rust crate for embedding
//! - **Event-driven** - Consumers subscribe to progress events, no polling required
//!
//! ## Quick Start
//!
//! ```no_run
//! use scrapeflow::{Config, Orchestrator, ScrapeMode, ScrapeRequest};
//! use scrapeflow::auth::HttpLivenessProbe;
//! use std::sync::Arc;
//!
//! # async fn example(driver: Arc<dyn scrapeflow::driver::ScrapeDriver>) -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::default();
//! let probe = Arc::new(HttpLivenessProbe::new(&config.probe)?);
//! let orchestrator = Orchestrator::new(config, driver, probe);
//!
//! let snapshot = orchestrator
//!     .start(ScrapeRequest {
//!         username: Some("alice".to_string()),
//!         hashtag: None,
//!         mode: ScrapeMode::SingleProfile,
//!         cookies: None,
//!         streaming: true,
//!     })
//!     .await?;
//!
//! // Follow progress: replay from sequence 0, then live events
//! let mut events = orchestrator.subscribe(snapshot.id).await?;
//! use futures::StreamExt;
//! while let Some(Ok(event)) = events.next().await {
//!     println!("{}: {:?}", event.seq, event.kind);
//! }
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// REST API module
pub mod api;
/// Authentication tier management and liveness probing
pub mod auth;
/// Configuration types
pub mod config;
/// Credential parsing and storage
pub mod credentials;
/// Scrape driver abstraction
pub mod driver;
/// Error types
pub mod error;
/// Job scheduling, progress streaming and result aggregation
pub mod orchestrator;
/// Core types and events
pub mod types;

// Re-export commonly used types
pub use auth::{AuthManager, HttpLivenessProbe, LivenessProbe};
pub use config::{ApiConfig, Config, OrchestratorConfig, ProbeConfig};
pub use credentials::{Credential, CredentialStore};
pub use driver::{DriverFault, DriverNotice, DriverRequest, EngineInfo, ScrapeDriver};
pub use error::{ApiError, Error, ErrorDetail, ProbeError, Result, ToHttpStatus};
pub use orchestrator::{EventStream, Orchestrator, SubscriptionLag};
pub use types::{
    AuthStatus, AuthTier, EventKind, FaultKind, JobId, JobSnapshot, JobState, MediaType, Post,
    Profile, ProgressEvent, ScrapeMode, ScrapeRequest, ScrapeResult, ScrapeStatistics,
};

/// Helper function to run the orchestrator with graceful signal handling.
///
/// Waits for a termination signal and then calls the orchestrator's
/// `shutdown()` method, which cancels in-flight jobs and lets them settle.
///
/// - **Unix:** listens for SIGTERM and SIGINT, with fallbacks if signal registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
///
/// # Example
///
/// ```no_run
/// use scrapeflow::{Config, Orchestrator, run_with_shutdown};
/// use scrapeflow::auth::HttpLivenessProbe;
/// use std::sync::Arc;
///
/// # async fn example(driver: Arc<dyn scrapeflow::driver::ScrapeDriver>) -> Result<(), Box<dyn std::error::Error>> {
/// let config = Config::default();
/// let probe = Arc::new(HttpLivenessProbe::new(&config.probe)?);
/// let orchestrator = Orchestrator::new(config, driver, probe);
///
/// let api = orchestrator.spawn_api_server();
///
/// // Run with automatic signal handling
/// run_with_shutdown(orchestrator).await;
/// api.abort();
/// # Ok(())
/// # }
/// ```
pub async fn run_with_shutdown(orchestrator: Orchestrator) {
    wait_for_signal().await;
    orchestrator.shutdown().await;
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    // Set up signal handlers - these may fail in restricted environments (containers, tests)
    let sigterm_result = signal(SignalKind::terminate());
    let sigint_result = signal(SignalKind::interrupt());

    match (sigterm_result, sigint_result) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM signal");
                }
                _ = sigint.recv() => {
                    tracing::info!("Received SIGINT signal (Ctrl+C)");
                }
            }
        }
        (Err(e), _) => {
            tracing::warn!(error = %e, "Could not register SIGTERM handler, waiting for SIGINT only");
            if let Ok(mut sigint) = signal(SignalKind::interrupt()) {
                sigint.recv().await;
                tracing::info!("Received SIGINT signal (Ctrl+C)");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
        (_, Err(e)) => {
            tracing::warn!(error = %e, "Could not register SIGINT handler, waiting for SIGTERM only");
            if let Ok(mut sigterm) = signal(SignalKind::terminate()) {
                sigterm.recv().await;
                tracing::info!("Received SIGTERM signal");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Received Ctrl+C signal");
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
        }
    }
}
