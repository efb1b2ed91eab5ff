//! Scrape-job orchestration
//!
//! The [`Orchestrator`] is the long-lived core of the library: it owns the
//! job registry, bounds driver concurrency, serializes same-target jobs,
//! and hands out progress subscriptions. All public operations live in
//! `control`; the per-job task in `job_task` does the actual driving.

mod aggregate;
pub(crate) mod control;
mod job_task;
pub(crate) mod progress;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use progress::{EventStream, SubscriptionLag};

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{watch, Mutex, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::auth::{AuthManager, LivenessProbe};
use crate::config::Config;
use crate::credentials::CredentialStore;
use crate::driver::ScrapeDriver;
use crate::error::Result;
use crate::types::{JobId, JobSnapshot, JobState, ScrapeRequest, ScrapeResult};

use progress::JobLog;

/// Registry entry for one job
#[derive(Debug)]
pub(crate) struct JobEntry {
    pub(crate) request: ScrapeRequest,
    pub(crate) state: JobState,
    pub(crate) created_at: DateTime<Utc>,
    pub(crate) terminal_at: Option<DateTime<Utc>>,
    pub(crate) log: Arc<JobLog>,
    pub(crate) cancel: CancellationToken,
    pub(crate) result_rx: watch::Receiver<Option<Arc<ScrapeResult>>>,
}

impl JobEntry {
    pub(crate) fn snapshot(&self, id: JobId) -> JobSnapshot {
        JobSnapshot {
            id,
            state: self.state,
            request: self.request.redacted(),
            created_at: self.created_at,
            terminal_at: self.terminal_at,
        }
    }
}

/// Scheduling state shared by all clones of the orchestrator
#[derive(Debug)]
pub(crate) struct SchedulerState {
    /// Job registry; terminal entries are GC'd after the retention window
    pub(crate) jobs: Mutex<HashMap<JobId, JobEntry>>,
    /// Bounds concurrent driver runs
    pub(crate) driver_slots: Arc<Semaphore>,
    /// One mutex per in-flight target key; same-target jobs serialize here
    pub(crate) target_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
    /// Next job id
    pub(crate) next_job_id: AtomicI64,
    /// Cleared during shutdown; `start` refuses new jobs once false
    pub(crate) accepting_new: AtomicBool,
}

/// Orchestrates scrape jobs over an injected driver
///
/// Cheap to clone; clones share all state. Construction wires the
/// credential store, auth manager and scheduler together — nothing runs
/// until [`start`](Orchestrator::start) is called.
#[derive(Clone)]
pub struct Orchestrator {
    pub(crate) config: Arc<Config>,
    pub(crate) driver: Arc<dyn ScrapeDriver>,
    pub(crate) auth: AuthManager,
    pub(crate) scheduler: Arc<SchedulerState>,
}

impl Orchestrator {
    /// Create an orchestrator from config, a driver and a liveness probe
    pub fn new(
        config: Config,
        driver: Arc<dyn ScrapeDriver>,
        probe: Arc<dyn LivenessProbe>,
    ) -> Self {
        let store = Arc::new(CredentialStore::new());
        let auth = AuthManager::new(store, probe);
        let driver_slots = Arc::new(Semaphore::new(config.orchestrator.max_concurrent_jobs.max(1)));

        Self {
            config: Arc::new(config),
            driver,
            auth,
            scheduler: Arc::new(SchedulerState {
                jobs: Mutex::new(HashMap::new()),
                driver_slots,
                target_locks: Mutex::new(HashMap::new()),
                next_job_id: AtomicI64::new(1),
                accepting_new: AtomicBool::new(true),
            }),
        }
    }

    /// The auth manager, for tier queries and credential setup
    pub fn auth(&self) -> &AuthManager {
        &self.auth
    }

    /// The active configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Spawn the REST API server for this orchestrator
    ///
    /// Returns the task handle; the server runs until the process exits or
    /// the handle is aborted.
    pub fn spawn_api_server(&self) -> tokio::task::JoinHandle<Result<()>> {
        let orchestrator = self.clone();
        tokio::spawn(async move { crate::api::start_api_server(orchestrator).await })
    }

    /// Stop accepting jobs and cancel everything in flight
    ///
    /// Each cancelled job still runs its terminal transition, so
    /// subscribers and `get_result` waiters unblock with a cancelled
    /// result rather than hanging.
    pub async fn shutdown(&self) {
        self.scheduler.accepting_new.store(false, Ordering::SeqCst);
        info!("shutdown requested; cancelling in-flight jobs");

        let waiters: Vec<(JobId, watch::Receiver<Option<Arc<ScrapeResult>>>)> = {
            let jobs = self.scheduler.jobs.lock().await;
            jobs.iter()
                .filter(|(_, entry)| !entry.state.is_terminal())
                .map(|(id, entry)| {
                    entry.cancel.cancel();
                    (*id, entry.result_rx.clone())
                })
                .collect()
        };

        for (id, mut rx) in waiters {
            let settled = tokio::time::timeout(std::time::Duration::from_secs(10), async {
                while rx.borrow().is_none() {
                    if rx.changed().await.is_err() {
                        break;
                    }
                }
            })
            .await;
            if settled.is_err() {
                warn!(job_id = %id, "job did not settle within the shutdown window");
            }
        }
        info!("shutdown complete");
    }

    /// Allocate the next job id
    pub(crate) fn next_id(&self) -> JobId {
        JobId::new(self.scheduler.next_job_id.fetch_add(1, Ordering::SeqCst))
    }

    /// Mutex guarding the given target key, created on first use
    pub(crate) async fn target_lock(&self, key: &str) -> Arc<Mutex<()>> {
        let mut locks = self.scheduler.target_locks.lock().await;
        locks
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}
