//! Shared test fixtures for orchestrator tests

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use tokio_util::sync::CancellationToken;

use crate::auth::{LivenessProbe, ProbeOutcome};
use crate::config::Config;
use crate::credentials::Credential;
use crate::driver::{DriverNotice, DriverRequest, EngineInfo, NoticeStream, ScrapeDriver};
use crate::error::ProbeError;
use crate::types::{MediaType, Post, Profile, ScrapeMode, ScrapeRequest};

use super::Orchestrator;

/// Driver that replays pre-scripted notice sequences
///
/// Each `run` pops the next script; once the scripts run out, runs yield
/// nothing (an empty successful scrape). An optional per-notice delay lets
/// tests open a window for cancellation or queueing assertions.
pub(crate) struct ScriptedDriver {
    scripts: Mutex<VecDeque<Vec<DriverNotice>>>,
    step_delay: Duration,
}

impl ScriptedDriver {
    pub(crate) fn new(scripts: Vec<Vec<DriverNotice>>) -> Self {
        Self {
            scripts: Mutex::new(scripts.into()),
            step_delay: Duration::ZERO,
        }
    }

    pub(crate) fn with_step_delay(mut self, delay: Duration) -> Self {
        self.step_delay = delay;
        self
    }
}

#[async_trait]
impl ScrapeDriver for ScriptedDriver {
    fn engine_info(&self) -> EngineInfo {
        EngineInfo {
            label: "scripted-stub".to_string(),
            countermeasures: vec!["none".to_string()],
        }
    }

    async fn run(&self, _request: DriverRequest, _cancel: CancellationToken) -> NoticeStream {
        let script = self
            .scripts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front()
            .unwrap_or_default();
        let delay = self.step_delay;
        stream::iter(script)
            .then(move |notice| async move {
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                notice
            })
            .boxed()
    }
}

/// Probe stub with a fixed outcome
pub(crate) struct FixedProbe(pub(crate) ProbeOutcome);

#[async_trait]
impl LivenessProbe for FixedProbe {
    async fn probe(
        &self,
        _credential: Option<&Credential>,
    ) -> Result<ProbeOutcome, ProbeError> {
        Ok(self.0.clone())
    }
}

pub(crate) fn orchestrator_with(driver: ScriptedDriver, config: Config) -> Orchestrator {
    Orchestrator::new(
        config,
        Arc::new(driver),
        Arc::new(FixedProbe(ProbeOutcome::Unauthenticated)),
    )
}

pub(crate) fn profile_request(username: &str) -> ScrapeRequest {
    ScrapeRequest {
        username: Some(username.to_string()),
        hashtag: None,
        mode: ScrapeMode::SingleProfile,
        cookies: None,
        streaming: true,
    }
}

pub(crate) fn hashtag_request(hashtag: &str) -> ScrapeRequest {
    ScrapeRequest {
        username: None,
        hashtag: Some(hashtag.to_string()),
        mode: ScrapeMode::HashtagDiscovery,
        cookies: None,
        streaming: true,
    }
}

pub(crate) fn profile(username: &str, posts_count: u64) -> Profile {
    Profile {
        username: username.to_string(),
        full_name: username.to_string(),
        posts_count,
        ..Profile::default()
    }
}

pub(crate) fn post(shortcode: &str) -> Post {
    Post {
        shortcode: shortcode.to_string(),
        url: format!("https://cdn.example/{shortcode}.jpg"),
        media_type: MediaType::Image,
        post_url: format!("https://social.example/p/{shortcode}/"),
    }
}

pub(crate) fn posts(n: usize) -> Vec<DriverNotice> {
    (0..n)
        .map(|i| DriverNotice::Post(post(&format!("sc{i}"))))
        .collect()
}

/// A successful single-profile script: profile, posts, scroll count
pub(crate) fn happy_script(username: &str, total: u64, captured: usize) -> Vec<DriverNotice> {
    let mut script = vec![
        DriverNotice::Profile(profile(username, total)),
        DriverNotice::Info("scrolling feed".to_string()),
    ];
    script.extend(posts(captured));
    script.push(DriverNotice::ScrollCount(captured as u64));
    script
}
