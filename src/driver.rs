//! Scrape driver seam
//!
//! The actual browser automation lives outside this crate, behind the
//! [`ScrapeDriver`] trait. A driver run is a finite, lazy stream of
//! [`DriverNotice`]s; the orchestrator owns all sequencing, event numbering
//! and result assembly, so driver implementations stay a thin adapter over
//! whatever automation stack they wrap.

use futures::stream::BoxStream;
use tokio_util::sync::CancellationToken;

use crate::credentials::Credential;
use crate::types::{AuthTier, FaultKind, Post, Profile, ScrapeMode, ScrapeTarget};

/// Stream type returned by a driver run
pub type NoticeStream = BoxStream<'static, DriverNotice>;

/// One notice from an in-flight driver run
#[derive(Clone, Debug)]
pub enum DriverNotice {
    /// A profile record was captured
    Profile(Profile),
    /// A post record was captured
    Post(Post),
    /// Free-form progress information
    Info(String),
    /// Cumulative count of posts loaded through scrolling so far
    ScrollCount(u64),
    /// The run hit an unrecoverable fault; no further notices follow
    Fatal(DriverFault),
}

/// A classified, unrecoverable driver fault
///
/// The orchestrator never retries these; the classification flows straight
/// into the job's terminal event and result reason.
#[derive(Clone, Debug)]
pub struct DriverFault {
    /// Failure classification
    pub kind: FaultKind,
    /// Human-readable description, surfaced in the terminal error event
    pub message: String,
}

impl DriverFault {
    /// Build a fault with the given classification
    pub fn new(kind: FaultKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// The target profile or hashtag does not exist
    pub fn target_not_found(message: impl Into<String>) -> Self {
        Self::new(FaultKind::TargetNotFound, message)
    }

    /// The target service throttled the run
    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::new(FaultKind::RateLimited, message)
    }
}

impl std::fmt::Display for DriverFault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

/// Everything a driver needs to perform one run
#[derive(Clone, Debug)]
pub struct DriverRequest {
    /// What to scrape
    pub target: ScrapeTarget,
    /// Requested mode
    pub mode: ScrapeMode,
    /// Tier the job runs at, for the driver's own pacing decisions
    pub tier: AuthTier,
    /// Credential snapshot taken at job start (None for anonymous runs)
    pub credential: Option<Credential>,
}

/// Static self-description of a driver engine
#[derive(Clone, Debug)]
pub struct EngineInfo {
    /// Engine label, e.g. the automation stack and browser in use
    pub label: String,
    /// Countermeasures the engine applies against bot detection
    pub countermeasures: Vec<String>,
}

/// A pluggable scrape engine
///
/// `run` returns a finite stream: it ends either naturally (success) or
/// after a single [`DriverNotice::Fatal`]. The stream is lazy; nothing
/// touches the target service until it is polled. Drivers must honor the
/// cancellation token at their next safe point; the orchestrator stops
/// polling once the token fires, so a stalled driver cannot wedge a job.
#[async_trait::async_trait]
pub trait ScrapeDriver: Send + Sync {
    /// Describe the engine for result metadata
    fn engine_info(&self) -> EngineInfo;

    /// Perform one scrape run
    async fn run(&self, request: DriverRequest, cancel: CancellationToken) -> NoticeStream;
}
