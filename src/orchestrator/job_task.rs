//! The per-job task
//!
//! Spawned by `start`, one task per job. Acquires a driver slot and the
//! target lock, snapshots tier and credential, consumes the driver's
//! notice stream with a cancellation checkpoint between notices, and runs
//! the terminal flush: `success`/`statistics`/`complete` on the happy
//! path, a single `error` event otherwise.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use futures::StreamExt;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::credentials::Credential;
use crate::driver::{DriverFault, DriverNotice, DriverRequest};
use crate::types::{
    AuthTier, EventKind, FaultKind, JobId, JobState, ScrapeRequest, ScrapeResult, ScrapeTarget,
};

use super::aggregate::{self, Accumulated};
use super::progress::JobLog;
use super::Orchestrator;

type ResultSender = watch::Sender<Option<Arc<ScrapeResult>>>;

#[allow(clippy::too_many_arguments)]
pub(crate) async fn run(
    orchestrator: Orchestrator,
    id: JobId,
    request: ScrapeRequest,
    target: ScrapeTarget,
    credential_override: Option<Credential>,
    cancel: CancellationToken,
    log: Arc<JobLog>,
    result_tx: ResultSender,
) {
    let engine = orchestrator.driver.engine_info();

    // Wait for a driver slot; a job cancelled while queued still settles
    // with a terminal event so subscribers and result waiters unblock
    let _permit = tokio::select! {
        _ = cancel.cancelled() => {
            settle_before_start(&orchestrator, id, &target, &log, result_tx, engine, &request).await;
            return;
        }
        permit = orchestrator.scheduler.driver_slots.clone().acquire_owned() => {
            match permit {
                Ok(permit) => permit,
                Err(_) => {
                    // Semaphore closed mid-shutdown
                    settle_before_start(&orchestrator, id, &target, &log, result_tx, engine, &request)
                        .await;
                    return;
                }
            }
        }
    };

    // Same-target jobs serialize here instead of doubling load on the target
    let target_mutex = orchestrator.target_lock(&target.key()).await;
    let _target_guard = tokio::select! {
        _ = cancel.cancelled() => {
            settle_before_start(&orchestrator, id, &target, &log, result_tx, engine, &request).await;
            return;
        }
        guard = target_mutex.lock() => guard,
    };

    set_state(&orchestrator, id, JobState::Running).await;

    // Tier and credential are snapshotted once; replacing the stored
    // credential mid-run does not affect this job. A per-request override
    // skips the probe entirely and runs at basic tier.
    let (tier, credential) = match credential_override {
        Some(credential) => (AuthTier::BasicAuthenticated, Some(credential)),
        None => {
            let tier = orchestrator.auth.current_tier().await;
            let credential = orchestrator.auth.store().snapshot().await;
            match credential {
                Some(credential) => (tier, Some(credential)),
                None => (AuthTier::Anonymous, None),
            }
        }
    };

    log.append(
        EventKind::Start,
        Some(format!("Starting {} scrape for {}", request.mode, target)),
        Some(serde_json::json!({
            "target": target.to_string(),
            "mode": request.mode,
            "tier": tier,
        })),
    );

    match tier {
        AuthTier::Anonymous => {
            log.append(
                EventKind::Info,
                Some("No credential available; capture may be limited".to_string()),
                Some(serde_json::json!({ "reason": "auth_required" })),
            );
        }
        AuthTier::BasicAuthenticated => {
            log.append(
                EventKind::Info,
                Some("Credential unconfirmed; running at basic tier".to_string()),
                Some(serde_json::json!({ "reason": "auth_degraded" })),
            );
        }
        AuthTier::FullAuthenticated => {}
    }

    info!(job_id = %id, target = %target, tier = %tier, "driving scrape");

    let driver_request = DriverRequest {
        target: target.clone(),
        mode: request.mode,
        tier,
        credential,
    };
    let mut notices = orchestrator
        .driver
        .run(driver_request, cancel.child_token())
        .await;

    let mut accumulated = Accumulated::default();
    let mut seen_shortcodes: HashSet<String> = HashSet::new();
    let mut seen_usernames: HashSet<String> = HashSet::new();

    // Cancellation is checked between notices; drivers get the child token
    // for their own earlier exit
    let fault: Option<DriverFault> = loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                break Some(DriverFault::new(
                    FaultKind::Cancelled,
                    "job cancelled by caller",
                ));
            }
            notice = notices.next() => match notice {
                None => break None,
                Some(DriverNotice::Profile(profile)) => {
                    let payload = serde_json::to_value(&profile).ok();
                    match request.mode {
                        crate::types::ScrapeMode::SingleProfile => {
                            accumulated.profile = Some(profile.clone());
                            log.append(
                                EventKind::Profile,
                                Some(format!("Captured profile @{}", profile.username)),
                                payload,
                            );
                        }
                        crate::types::ScrapeMode::HashtagDiscovery => {
                            // Discovery dedupes by username in discovery order
                            if seen_usernames.insert(profile.username.clone()) {
                                accumulated.profiles.push(profile.clone());
                                log.append(
                                    EventKind::Profile,
                                    Some(format!("Discovered profile @{}", profile.username)),
                                    payload,
                                );
                            } else {
                                debug!(job_id = %id, username = %profile.username, "duplicate profile dropped");
                            }
                        }
                    }
                }
                Some(DriverNotice::Post(post)) => {
                    if seen_shortcodes.insert(post.shortcode.clone()) {
                        let payload = serde_json::to_value(&post).ok();
                        log.append(
                            EventKind::Posts,
                            Some(format!("Captured post {}", post.shortcode)),
                            payload,
                        );
                        accumulated.posts.push(post);
                    } else {
                        debug!(job_id = %id, shortcode = %post.shortcode, "duplicate post dropped");
                    }
                }
                Some(DriverNotice::Info(message)) => {
                    log.append(EventKind::Info, Some(message), None);
                }
                Some(DriverNotice::ScrollCount(loaded)) => {
                    accumulated.scroll_loaded = loaded;
                    log.append(
                        EventKind::Info,
                        Some(format!("{loaded} posts loaded by scrolling")),
                        Some(serde_json::json!({ "posts_loaded_by_scroll": loaded })),
                    );
                }
                Some(DriverNotice::Fatal(fault)) => break Some(fault),
            }
        }
    };
    drop(notices);

    match fault {
        None => {
            log.append(
                EventKind::Success,
                Some("Scrape completed without faults".to_string()),
                None,
            );
            let result =
                aggregate::assemble(id, request.mode, engine, tier, accumulated, None);
            log.append(
                EventKind::Statistics,
                None,
                serde_json::to_value(&result.statistics).ok(),
            );
            log.append(
                EventKind::Complete,
                Some(format!(
                    "Captured {} posts from {}",
                    result.posts.len(),
                    target
                )),
                serde_json::to_value(&result).ok(),
            );
            info!(
                job_id = %id,
                posts = result.posts.len(),
                "job completed"
            );
            settle(&orchestrator, id, &target, JobState::Completed, result, result_tx).await;
        }
        Some(fault) => {
            let state = if fault.kind == FaultKind::Cancelled {
                JobState::Cancelled
            } else {
                JobState::Failed
            };
            log.append(
                EventKind::Error,
                Some(fault.message.clone()),
                Some(serde_json::json!({ "reason": fault.kind })),
            );
            let result = aggregate::assemble(
                id,
                request.mode,
                engine,
                tier,
                accumulated,
                Some(fault.kind),
            );
            if state == JobState::Cancelled {
                info!(job_id = %id, "job cancelled");
            } else {
                error!(job_id = %id, reason = %fault.kind, message = %fault.message, "job failed");
            }
            settle(&orchestrator, id, &target, state, result, result_tx).await;
        }
    }
}

/// Terminal transition for a job cancelled before the driver ever ran
async fn settle_before_start(
    orchestrator: &Orchestrator,
    id: JobId,
    target: &ScrapeTarget,
    log: &JobLog,
    result_tx: ResultSender,
    engine: crate::driver::EngineInfo,
    request: &ScrapeRequest,
) {
    log.append(
        EventKind::Error,
        Some("job cancelled before starting".to_string()),
        Some(serde_json::json!({ "reason": FaultKind::Cancelled })),
    );
    let result = aggregate::assemble(
        id,
        request.mode,
        engine,
        AuthTier::Anonymous,
        Accumulated::default(),
        Some(FaultKind::Cancelled),
    );
    info!(job_id = %id, "job cancelled while queued");
    settle(orchestrator, id, target, JobState::Cancelled, result, result_tx).await;
}

/// Record the terminal state, publish the result and schedule retention GC
async fn settle(
    orchestrator: &Orchestrator,
    id: JobId,
    target: &ScrapeTarget,
    state: JobState,
    result: ScrapeResult,
    result_tx: ResultSender,
) {
    {
        let mut jobs = orchestrator.scheduler.jobs.lock().await;
        if let Some(entry) = jobs.get_mut(&id) {
            entry.state = state;
            entry.terminal_at = Some(Utc::now());
        }
    }

    if result_tx.send(Some(Arc::new(result))).is_err() {
        // Entry already GC'd; nobody can wait on this result anymore
        warn!(job_id = %id, "result published with no remaining receivers");
    }

    let orchestrator = orchestrator.clone();
    let target_key = target.key();
    let retention = orchestrator.config.orchestrator.job_retention();
    tokio::spawn(async move {
        tokio::time::sleep(retention).await;
        {
            let mut jobs = orchestrator.scheduler.jobs.lock().await;
            jobs.remove(&id);
        }
        let mut locks = orchestrator.scheduler.target_locks.lock().await;
        // Only drop the lock entry once no task holds a reference
        if locks
            .get(&target_key)
            .map(|lock| Arc::strong_count(lock) == 1)
            .unwrap_or(false)
        {
            locks.remove(&target_key);
        }
        debug!(job_id = %id, "job entry retired");
    });
}

async fn set_state(orchestrator: &Orchestrator, id: JobId, state: JobState) {
    let mut jobs = orchestrator.scheduler.jobs.lock().await;
    if let Some(entry) = jobs.get_mut(&id) {
        entry.state = state;
    }
}
