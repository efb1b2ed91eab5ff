//! Core types for scrapeflow

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::{Error, Result};

/// Unique identifier for a scrape job
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema,
)]
#[serde(transparent)]
pub struct JobId(pub i64);

impl JobId {
    /// Create a new JobId
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    /// Get the inner i64 value
    pub fn get(&self) -> i64 {
        self.0
    }
}

impl From<i64> for JobId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

impl From<JobId> for i64 {
    fn from(id: JobId) -> Self {
        id.0
    }
}

impl PartialEq<i64> for JobId {
    fn eq(&self, other: &i64) -> bool {
        self.0 == *other
    }
}

impl PartialEq<JobId> for i64 {
    fn eq(&self, other: &JobId) -> bool {
        *self == other.0
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for JobId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(s.parse()?))
    }
}

/// Scrape job lifecycle state
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    /// Accepted and waiting for a driver slot
    Queued,
    /// Actively driving the scrape driver
    Running,
    /// Finished with a successful result
    Completed,
    /// Finished with a classified failure
    Failed,
    /// Stopped cooperatively by a caller
    Cancelled,
}

impl JobState {
    /// Whether the job has reached a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobState::Completed | JobState::Failed | JobState::Cancelled
        )
    }
}

/// Scrape mode requested by the caller
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "kebab-case")]
pub enum ScrapeMode {
    /// Capture one profile and its posts
    SingleProfile,
    /// Discover profiles posting under a hashtag
    HashtagDiscovery,
}

impl std::fmt::Display for ScrapeMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScrapeMode::SingleProfile => write!(f, "single-profile"),
            ScrapeMode::HashtagDiscovery => write!(f, "hashtag-discovery"),
        }
    }
}

/// The resolved subject of a scrape request
///
/// Produced by [`ScrapeRequest::validate`]; a request carries free-form
/// optional fields, the target is the checked exactly-one-of form.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ScrapeTarget {
    /// A single profile, addressed by username (no leading @)
    Username(String),
    /// A hashtag, addressed without the leading #
    Hashtag(String),
}

impl ScrapeTarget {
    /// Stable key used to serialize jobs against the same target
    pub fn key(&self) -> String {
        match self {
            ScrapeTarget::Username(u) => format!("user:{}", u),
            ScrapeTarget::Hashtag(h) => format!("tag:{}", h),
        }
    }
}

impl std::fmt::Display for ScrapeTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScrapeTarget::Username(u) => write!(f, "@{}", u),
            ScrapeTarget::Hashtag(h) => write!(f, "#{}", h),
        }
    }
}

/// A request to scrape one profile or discover profiles under a hashtag
///
/// Exactly one of `username` / `hashtag` must be set, and it must agree with
/// `mode`. Violations are rejected synchronously before a job exists.
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct ScrapeRequest {
    /// Target username for `single-profile` mode (without @)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    /// Target hashtag for `hashtag-discovery` mode (without #)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hashtag: Option<String>,

    /// Requested scrape mode
    pub mode: ScrapeMode,

    /// Per-request credential override (serialized cookie bundle)
    ///
    /// When absent the process-wide stored credential is snapshotted at
    /// job start.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cookies: Option<String>,

    /// Whether the caller intends to consume the live event stream
    ///
    /// Informational only: streaming and polling callers share one event
    /// path. Recorded on the job snapshot.
    #[serde(default)]
    pub streaming: bool,
}

impl ScrapeRequest {
    /// Validate the request and resolve its target
    ///
    /// Rejects with `InvalidRequest` when both or neither of
    /// username/hashtag are set, when the set field is empty, or when the
    /// set field does not match the requested mode.
    pub fn validate(&self) -> Result<ScrapeTarget> {
        let username = self
            .username
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty());
        let hashtag = self
            .hashtag
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty());

        match (username, hashtag, self.mode) {
            (Some(u), None, ScrapeMode::SingleProfile) => {
                Ok(ScrapeTarget::Username(u.trim_start_matches('@').to_string()))
            }
            (None, Some(h), ScrapeMode::HashtagDiscovery) => {
                Ok(ScrapeTarget::Hashtag(h.trim_start_matches('#').to_string()))
            }
            (Some(_), Some(_), _) => Err(Error::InvalidRequest(
                "username and hashtag are mutually exclusive".to_string(),
            )),
            (None, None, _) => Err(Error::InvalidRequest(
                "exactly one of username or hashtag is required".to_string(),
            )),
            (Some(_), None, ScrapeMode::HashtagDiscovery) => Err(Error::InvalidRequest(
                "hashtag-discovery mode requires a hashtag, not a username".to_string(),
            )),
            (None, Some(_), ScrapeMode::SingleProfile) => Err(Error::InvalidRequest(
                "single-profile mode requires a username, not a hashtag".to_string(),
            )),
        }
    }

    /// Copy of the request with the credential field blanked
    ///
    /// Job snapshots echo the request to API callers; the raw cookie
    /// bundle must never leave the process.
    pub fn redacted(&self) -> Self {
        Self {
            cookies: self.cookies.as_ref().map(|_| "<redacted>".to_string()),
            ..self.clone()
        }
    }
}

/// Point-in-time view of a job, safe to hand to API callers
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct JobSnapshot {
    /// Job identifier
    pub id: JobId,

    /// Current lifecycle state
    pub state: JobState,

    /// The request that created the job (credential redacted)
    pub request: ScrapeRequest,

    /// When the job was accepted
    pub created_at: DateTime<Utc>,

    /// When the job reached a terminal state (None while in flight)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub terminal_at: Option<DateTime<Utc>>,
}

/// Progress event kind
///
/// `Complete` and `Error` are terminal: no further events are produced for
/// the job after either is emitted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    /// Job started driving the scrape
    Start,
    /// Informational progress notice
    Info,
    /// Driver finished without a fault (statistics and complete follow)
    Success,
    /// Terminal failure or cancellation
    Error,
    /// Profile record discovered
    Profile,
    /// Post record discovered
    Posts,
    /// Final statistics payload
    Statistics,
    /// Terminal success marker carrying the full result
    Complete,
}

impl EventKind {
    /// Whether an event of this kind terminates the job's stream
    pub fn is_terminal(&self) -> bool {
        matches!(self, EventKind::Complete | EventKind::Error)
    }

    /// Stable wire name, used as the SSE event name
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Start => "start",
            EventKind::Info => "info",
            EventKind::Success => "success",
            EventKind::Error => "error",
            EventKind::Profile => "profile",
            EventKind::Posts => "posts",
            EventKind::Statistics => "statistics",
            EventKind::Complete => "complete",
        }
    }
}

/// One ordered progress event for a job
///
/// Immutable once emitted. `seq` is the sole ordering authority: strictly
/// increasing per job, starting at 0, with no gaps.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ProgressEvent {
    /// Owning job
    pub job_id: JobId,

    /// Sequence number, contiguous from 0 per job
    pub seq: u64,

    /// Event kind
    #[serde(rename = "type")]
    pub kind: EventKind,

    /// Human-readable message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Structured payload (profile, post, statistics, result, …)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

/// A scraped profile record
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Profile {
    /// Username without the leading @
    pub username: String,

    /// Display name
    #[serde(default)]
    pub full_name: String,

    /// Profile biography text
    #[serde(default)]
    pub biography: String,

    /// Follower count
    #[serde(default)]
    pub followers_count: u64,

    /// Following count
    #[serde(default)]
    pub following_count: u64,

    /// Post count the profile claims to have
    #[serde(default)]
    pub posts_count: u64,

    /// Profile picture reference
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_pic_url: Option<String>,

    /// Whether the profile is private
    #[serde(default)]
    pub is_private: bool,

    /// Whether the profile is verified
    #[serde(default)]
    pub is_verified: bool,
}

/// Media type of a scraped post
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    /// Still image
    Image,
    /// Video
    Video,
    /// Could not be determined from the page
    #[default]
    Unknown,
}

/// A scraped post record
///
/// `shortcode` is unique within a job; the job task drops duplicate
/// shortcodes reported by the driver.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Post {
    /// Post shortcode extracted from its permalink
    pub shortcode: String,

    /// Media URL (image or video source)
    #[serde(default)]
    pub url: String,

    /// Media type
    #[serde(rename = "type", default)]
    pub media_type: MediaType,

    /// Permalink to the post
    #[serde(default)]
    pub post_url: String,
}

/// Authentication tier derived from the stored credential
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AuthTier {
    /// No credential configured
    Anonymous,
    /// Credential present but the probe rejected it or resolved only a
    /// degraded identity
    BasicAuthenticated,
    /// Credential confirmed: identity resolvable, privileged endpoints
    /// reachable
    FullAuthenticated,
}

impl AuthTier {
    /// Whether the tier carries a usable credential
    pub fn is_authenticated(&self) -> bool {
        !matches!(self, AuthTier::Anonymous)
    }
}

impl std::fmt::Display for AuthTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            AuthTier::Anonymous => "anonymous",
            AuthTier::BasicAuthenticated => "basic_authenticated",
            AuthTier::FullAuthenticated => "full_authenticated",
        };
        write!(f, "{}", s)
    }
}

/// Authentication status report
///
/// Derived on demand from the current credential plus a liveness probe;
/// never persisted independently of the credential generation it was
/// computed for.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct AuthStatus {
    /// Classified tier
    pub tier: AuthTier,

    /// Human-readable summary
    pub message: String,

    /// Resolved identity id, when the probe confirmed one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity_id: Option<String>,

    /// Number of cookie pairs in the stored bundle
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cookie_count: Option<usize>,

    /// What this tier enables
    pub benefits: Vec<String>,

    /// What this tier cannot do
    pub limitations: Vec<String>,
}

/// Classified reason for a terminal job failure
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum FaultKind {
    /// The target profile or hashtag does not exist
    TargetNotFound,
    /// The target profile is private and the tier cannot read it
    TargetPrivate,
    /// The target service throttled the driver
    RateLimited,
    /// The target service demanded authentication mid-scrape
    AuthRequired,
    /// Network failure between driver and target service
    Network,
    /// Unclassified driver fault
    Driver,
    /// The job was cancelled by a caller
    Cancelled,
}

impl std::fmt::Display for FaultKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            FaultKind::TargetNotFound => "target_not_found",
            FaultKind::TargetPrivate => "target_private",
            FaultKind::RateLimited => "rate_limited",
            FaultKind::AuthRequired => "auth_required",
            FaultKind::Network => "network",
            FaultKind::Driver => "driver",
            FaultKind::Cancelled => "cancelled",
        };
        write!(f, "{}", s)
    }
}

/// Capture effectiveness: posts captured over posts believed to exist
///
/// Serialized as a JSON number in [0,1], or the string `"indeterminate"`
/// when the driver never established how many posts the profile has.
/// Computing a ratio against a default total would fabricate a misleading
/// 0% or 100%, so the unknown case stays explicit.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Effectiveness {
    /// Ratio in [0, 1]
    Ratio(f64),
    /// The profile total was never established
    Indeterminate,
}

impl Effectiveness {
    /// The ratio, when known
    pub fn ratio(&self) -> Option<f64> {
        match self {
            Effectiveness::Ratio(r) => Some(*r),
            Effectiveness::Indeterminate => None,
        }
    }
}

impl Serialize for Effectiveness {
    fn serialize<S: serde::Serializer>(
        &self,
        serializer: S,
    ) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Effectiveness::Ratio(r) => serializer.serialize_f64(*r),
            Effectiveness::Indeterminate => serializer.serialize_str("indeterminate"),
        }
    }
}

impl<'de> Deserialize<'de> for Effectiveness {
    fn deserialize<D: serde::Deserializer<'de>>(
        deserializer: D,
    ) -> std::result::Result<Self, D::Error> {
        use serde::de::Error as _;
        let value = serde_json::Value::deserialize(deserializer)?;
        match value {
            serde_json::Value::Number(n) => n
                .as_f64()
                .map(Effectiveness::Ratio)
                .ok_or_else(|| D::Error::custom("effectiveness ratio out of range")),
            serde_json::Value::String(s) if s == "indeterminate" => {
                Ok(Effectiveness::Indeterminate)
            }
            other => Err(D::Error::custom(format!(
                "expected number or \"indeterminate\", got {}",
                other
            ))),
        }
    }
}

/// Derived statistics for a finished scrape
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ScrapeStatistics {
    /// Post count the profile claimed at scrape time (None if never seen)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_posts_in_profile: Option<u64>,

    /// Posts actually captured; always equals the result's posts length
    pub posts_scraped: usize,

    /// Posts the driver reported loading through scrolling
    pub posts_loaded_by_scroll: u64,

    /// Capture effectiveness
    #[schema(value_type = Object)]
    pub effectiveness: Effectiveness,
}

/// Metadata about the driver that performed the scrape
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct DriverInfo {
    /// Driver engine label (e.g. the browser automation stack in use)
    pub engine: String,

    /// Whether the scrape ran with an authenticated tier
    pub authenticated: bool,

    /// Countermeasures the driver reports applying
    pub countermeasures: Vec<String>,
}

/// Immutable final result of a scrape job
///
/// Created exactly once, at the terminal transition. A failed job has the
/// same shape as a successful one: only `success` and `reason` differ, and
/// partial data captured before the fault is preserved.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ScrapeResult {
    /// Owning job
    pub job_id: JobId,

    /// Whether the scrape completed without a fault
    pub success: bool,

    /// Classified failure reason (None on success)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<FaultKind>,

    /// Method label describing how the capture was performed
    pub method: String,

    /// The captured profile (single-profile mode)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<Profile>,

    /// Discovered profiles in discovery order (hashtag-discovery mode)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub profiles: Vec<Profile>,

    /// Captured posts in discovery order
    #[serde(default)]
    pub posts: Vec<Post>,

    /// Derived statistics
    pub statistics: ScrapeStatistics,

    /// Driver metadata
    pub driver_info: DriverInfo,
}
