//! Result assembly
//!
//! Pure functions that fold everything a job accumulated into the
//! immutable [`ScrapeResult`]. Runs exactly once per job, at the terminal
//! transition; success and failure paths share the same shape so partial
//! captures survive a fault.

use tracing::warn;

use crate::driver::EngineInfo;
use crate::types::{
    AuthTier, DriverInfo, Effectiveness, FaultKind, JobId, Post, Profile, ScrapeMode,
    ScrapeResult, ScrapeStatistics,
};

/// Everything the job task accumulated from driver notices
#[derive(Debug, Default)]
pub(crate) struct Accumulated {
    /// Captured profile (single-profile mode)
    pub profile: Option<Profile>,
    /// Discovered profiles in discovery order (hashtag-discovery mode)
    pub profiles: Vec<Profile>,
    /// Captured posts, deduplicated by shortcode in discovery order
    pub posts: Vec<Post>,
    /// Latest cumulative scroll-load count the driver reported
    pub scroll_loaded: u64,
}

/// Assemble the final result from the accumulated state
pub(crate) fn assemble(
    job_id: JobId,
    mode: ScrapeMode,
    engine: EngineInfo,
    tier: AuthTier,
    accumulated: Accumulated,
    reason: Option<FaultKind>,
) -> ScrapeResult {
    let statistics = statistics(job_id, mode, &accumulated);
    ScrapeResult {
        job_id,
        success: reason.is_none(),
        reason,
        method: method_label(mode),
        profile: accumulated.profile,
        profiles: accumulated.profiles,
        posts: accumulated.posts,
        statistics,
        driver_info: DriverInfo {
            engine: engine.label,
            authenticated: tier.is_authenticated(),
            countermeasures: engine.countermeasures,
        },
    }
}

/// Derive statistics from the accumulated state
///
/// `total_posts_in_profile` is the scrape-time figure from the captured
/// profile; hashtag discovery has no single total, so its effectiveness is
/// indeterminate. The ratio is clamped to [0,1] and never divides by zero.
fn statistics(job_id: JobId, mode: ScrapeMode, accumulated: &Accumulated) -> ScrapeStatistics {
    let total = match mode {
        ScrapeMode::SingleProfile => accumulated.profile.as_ref().map(|p| p.posts_count),
        ScrapeMode::HashtagDiscovery => None,
    };

    let posts_scraped = accumulated.posts.len();

    let effectiveness = match total {
        Some(total) => {
            if posts_scraped as u64 > total {
                warn!(
                    job_id = %job_id,
                    posts_scraped,
                    total_posts_in_profile = total,
                    "captured more posts than the profile claims to have"
                );
            }
            let ratio = posts_scraped as f64 / total.max(1) as f64;
            Effectiveness::Ratio(ratio.clamp(0.0, 1.0))
        }
        None => Effectiveness::Indeterminate,
    };

    ScrapeStatistics {
        total_posts_in_profile: total,
        posts_scraped,
        posts_loaded_by_scroll: accumulated.scroll_loaded,
        effectiveness,
    }
}

fn method_label(mode: ScrapeMode) -> String {
    match mode {
        ScrapeMode::SingleProfile => "browser_profile_capture".to_string(),
        ScrapeMode::HashtagDiscovery => "browser_hashtag_discovery".to_string(),
    }
}
