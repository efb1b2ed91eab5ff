//! Job control operations
//!
//! Public surface of the [`Orchestrator`]: starting, cancelling, querying
//! and waiting on jobs. Everything here is registry bookkeeping; the heavy
//! lifting happens in the spawned job task.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::credentials::Credential;
use crate::error::{Error, Result};
use crate::types::{JobId, JobSnapshot, JobState, ScrapeRequest, ScrapeResult};

use super::progress::{EventStream, JobLog};
use super::{job_task, JobEntry, Orchestrator};

impl Orchestrator {
    /// Accept a scrape request and spawn its job
    ///
    /// Validates synchronously (`InvalidRequest` / `InvalidCredential`) so
    /// a rejected request never creates a job. The returned snapshot is in
    /// the `queued` state; the job transitions to `running` once a driver
    /// slot and the target lock are acquired.
    pub async fn start(&self, request: ScrapeRequest) -> Result<JobSnapshot> {
        if !self.scheduler.accepting_new.load(Ordering::SeqCst) {
            return Err(Error::ShuttingDown);
        }

        let target = request.validate()?;
        // A malformed per-request credential is a caller mistake, caught now
        let credential_override = match request.cookies.as_deref() {
            Some(raw) => Some(Credential::parse(raw)?),
            None => None,
        };

        let id = self.next_id();
        let cancel = CancellationToken::new();
        let log = Arc::new(JobLog::new(id, self.config.orchestrator.event_buffer_size));
        let (result_tx, result_rx) = watch::channel(None);

        let entry = JobEntry {
            request: request.clone(),
            state: JobState::Queued,
            created_at: Utc::now(),
            terminal_at: None,
            log: log.clone(),
            cancel: cancel.clone(),
            result_rx,
        };
        let snapshot = entry.snapshot(id);

        {
            let mut jobs = self.scheduler.jobs.lock().await;
            jobs.insert(id, entry);
        }
        info!(job_id = %id, target = %target, mode = %request.mode, "job accepted");

        let orchestrator = self.clone();
        tokio::spawn(job_task::run(
            orchestrator,
            id,
            request,
            target,
            credential_override,
            cancel,
            log,
            result_tx,
        ));

        Ok(snapshot)
    }

    /// Request cooperative cancellation of a job
    ///
    /// Idempotent and unconditionally successful: cancelling a terminal or
    /// unknown job is a no-op, and repeated calls change nothing.
    pub async fn cancel(&self, id: JobId) {
        let jobs = self.scheduler.jobs.lock().await;
        match jobs.get(&id) {
            Some(entry) if !entry.state.is_terminal() => {
                debug!(job_id = %id, "cancellation requested");
                entry.cancel.cancel();
            }
            Some(_) => debug!(job_id = %id, "cancel ignored; job already terminal"),
            None => debug!(job_id = %id, "cancel ignored; job unknown"),
        }
    }

    /// Snapshot of one job
    pub async fn job(&self, id: JobId) -> Result<JobSnapshot> {
        let jobs = self.scheduler.jobs.lock().await;
        jobs.get(&id)
            .map(|entry| entry.snapshot(id))
            .ok_or(Error::JobNotFound { id: id.get() })
    }

    /// Snapshots of all known jobs, oldest first
    pub async fn jobs(&self) -> Vec<JobSnapshot> {
        let jobs = self.scheduler.jobs.lock().await;
        let mut snapshots: Vec<JobSnapshot> =
            jobs.iter().map(|(id, entry)| entry.snapshot(*id)).collect();
        snapshots.sort_by_key(|s| s.id);
        snapshots
    }

    /// Subscribe to a job's progress events
    ///
    /// Replays the recorded sequence from 0, then follows live events; the
    /// stream ends after the terminal event. Works identically before,
    /// during and after the run.
    pub async fn subscribe(&self, id: JobId) -> Result<EventStream> {
        let jobs = self.scheduler.jobs.lock().await;
        jobs.get(&id)
            .map(|entry| entry.log.subscribe())
            .ok_or(Error::JobNotFound { id: id.get() })
    }

    /// Wait for a job's result
    ///
    /// Returns immediately if the result exists, otherwise blocks up to
    /// `timeout` (config default when `None`). `ResultPending` on timeout;
    /// the job keeps running regardless. The result is returned whether
    /// the job succeeded or failed — callers check `success`.
    pub async fn get_result(
        &self,
        id: JobId,
        timeout: Option<Duration>,
    ) -> Result<Arc<ScrapeResult>> {
        let mut rx = {
            let jobs = self.scheduler.jobs.lock().await;
            jobs.get(&id)
                .map(|entry| entry.result_rx.clone())
                .ok_or(Error::JobNotFound { id: id.get() })?
        };

        if let Some(result) = rx.borrow().clone() {
            return Ok(result);
        }

        let timeout = timeout.unwrap_or_else(|| self.config.orchestrator.result_timeout());
        let waited = tokio::time::timeout(timeout, async {
            loop {
                if rx.changed().await.is_err() {
                    // Task dropped its sender without publishing; should not
                    // happen, but do not hang the caller
                    return None;
                }
                let current = rx.borrow().clone();
                if current.is_some() {
                    return current;
                }
            }
        })
        .await;

        match waited {
            Ok(Some(result)) => Ok(result),
            Ok(None) => Err(Error::Other(format!(
                "job {id} ended without publishing a result"
            ))),
            Err(_) => Err(Error::ResultPending { id: id.get() }),
        }
    }
}
