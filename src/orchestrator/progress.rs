//! Per-job progress log
//!
//! Each job owns a [`JobLog`]: an append-only replay log paired with a
//! bounded broadcast channel for live delivery. Appending assigns the next
//! sequence number and fans the event out; subscribing replays the recorded
//! prefix and then switches to live events, deduplicated by sequence
//! number, so a subscriber attaching at any point sees the exact recorded
//! sequence with no gap and no duplicate.

use std::sync::Mutex;

use futures::stream::{self, BoxStream, StreamExt};
use tokio::sync::broadcast;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tracing::trace;

use crate::types::{EventKind, JobId, ProgressEvent};

/// A subscriber fell behind the bounded live buffer
///
/// The subscription ends after yielding this; the job itself is
/// unaffected, and resubscribing replays the full recorded sequence.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SubscriptionLag {
    /// Number of events the subscriber missed
    pub skipped: u64,
}

/// Stream of progress events handed to subscribers
pub type EventStream = BoxStream<'static, Result<ProgressEvent, SubscriptionLag>>;

/// Sequence-numbered replay log plus live fan-out for one job
#[derive(Debug)]
pub(crate) struct JobLog {
    job_id: JobId,
    events: Mutex<Vec<ProgressEvent>>,
    live: broadcast::Sender<ProgressEvent>,
}

impl JobLog {
    /// Create a log with the given live-buffer capacity
    pub(crate) fn new(job_id: JobId, buffer: usize) -> Self {
        let (live, _) = broadcast::channel(buffer.max(1));
        Self {
            job_id,
            events: Mutex::new(Vec::new()),
            live,
        }
    }

    /// Append the next event, assigning its sequence number
    ///
    /// The event is recorded and fanned out atomically with respect to
    /// `subscribe`, so no subscriber can miss it or see it twice.
    pub(crate) fn append(
        &self,
        kind: EventKind,
        message: Option<String>,
        data: Option<serde_json::Value>,
    ) -> ProgressEvent {
        let mut events = self.events.lock().unwrap_or_else(|e| e.into_inner());
        debug_assert!(
            events.last().map(|e| !e.kind.is_terminal()).unwrap_or(true),
            "append after terminal event"
        );
        let event = ProgressEvent {
            job_id: self.job_id,
            seq: events.len() as u64,
            kind,
            message,
            data,
        };
        events.push(event.clone());
        trace!(job_id = %self.job_id, seq = event.seq, kind = kind.as_str(), "event appended");
        // No receivers is fine; the replay log keeps the event
        let _ = self.live.send(event.clone());
        event
    }

    /// Clone of the recorded sequence so far
    pub(crate) fn snapshot(&self) -> Vec<ProgressEvent> {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Whether a terminal event has been recorded
    pub(crate) fn is_terminal(&self) -> bool {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .last()
            .map(|e| e.kind.is_terminal())
            .unwrap_or(false)
    }

    /// Subscribe: replay the recorded prefix, then follow live events
    ///
    /// The stream ends after the terminal event, or after a single
    /// [`SubscriptionLag`] error if the subscriber fell behind the live
    /// buffer.
    pub(crate) fn subscribe(&self) -> EventStream {
        // Snapshot and receiver are taken under the same lock that append
        // holds, so every event is either in the snapshot or delivered live
        let (replay, terminal, rx) = {
            let events = self.events.lock().unwrap_or_else(|e| e.into_inner());
            let terminal = events.last().map(|e| e.kind.is_terminal()).unwrap_or(false);
            (events.clone(), terminal, self.live.subscribe())
        };

        let replay_len = replay.len() as u64;
        let replay_stream = stream::iter(replay.into_iter().map(Ok));

        if terminal {
            // Nothing more will ever arrive; drop the receiver
            drop(rx);
            return replay_stream.boxed();
        }

        let live_stream = BroadcastStream::new(rx).filter_map(move |item| {
            let mapped = match item {
                // Events at seq < replay_len were already replayed
                Ok(event) if event.seq >= replay_len => Some(Ok(event)),
                Ok(_) => None,
                Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                    Some(Err(SubscriptionLag { skipped }))
                }
            };
            futures::future::ready(mapped)
        });

        // Termination is decided while yielding: once a terminal event (or a
        // lag error) has been handed out, the next poll returns None without
        // touching the broadcast receiver again, which would otherwise stay
        // pending for as long as the log is alive.
        let combined = replay_stream.chain(live_stream).boxed();
        stream::unfold((combined, false), |(mut inner, done)| async move {
            if done {
                return None;
            }
            let item = inner.next().await?;
            let ends_stream = match &item {
                Ok(event) => event.kind.is_terminal(),
                Err(_) => true,
            };
            Some((item, (inner, ends_stream)))
        })
        .boxed()
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn log() -> JobLog {
        JobLog::new(JobId(1), 16)
    }

    #[test]
    fn append_assigns_contiguous_sequence_numbers() {
        let log = log();
        for expected in 0..5 {
            let event = log.append(EventKind::Info, Some(format!("step {expected}")), None);
            assert_eq!(event.seq, expected);
        }
        let snapshot = log.snapshot();
        let seqs: Vec<u64> = snapshot.iter().map(|e| e.seq).collect();
        assert_eq!(seqs, vec![0, 1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn late_subscriber_replays_the_full_recorded_sequence() {
        let log = log();
        log.append(EventKind::Start, Some("starting".into()), None);
        log.append(EventKind::Info, None, None);
        log.append(EventKind::Complete, Some("done".into()), None);

        let events: Vec<_> = log.subscribe().collect().await;
        assert_eq!(events.len(), 3);
        for (i, item) in events.iter().enumerate() {
            let event = item.as_ref().unwrap();
            assert_eq!(event.seq, i as u64);
        }
        assert_eq!(events[2].as_ref().unwrap().kind, EventKind::Complete);
    }

    #[tokio::test]
    async fn subscriber_sees_replay_then_live_without_duplicates() {
        let log = std::sync::Arc::new(log());
        log.append(EventKind::Start, None, None);
        log.append(EventKind::Info, None, None);

        let mut stream = log.subscribe();

        // Replayed prefix
        assert_eq!(stream.next().await.unwrap().unwrap().seq, 0);
        assert_eq!(stream.next().await.unwrap().unwrap().seq, 1);

        // Live tail
        log.append(EventKind::Posts, None, None);
        log.append(EventKind::Complete, None, None);
        assert_eq!(stream.next().await.unwrap().unwrap().seq, 2);
        let last = stream.next().await.unwrap().unwrap();
        assert_eq!(last.seq, 3);
        assert_eq!(last.kind, EventKind::Complete);

        // Stream ends after the terminal event
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn live_stream_closes_after_terminal_while_log_is_alive() {
        let log = log();
        let mut stream = log.subscribe();

        log.append(EventKind::Start, None, None);
        log.append(EventKind::Complete, None, None);
        assert_eq!(stream.next().await.unwrap().unwrap().seq, 0);
        assert!(stream.next().await.unwrap().unwrap().kind.is_terminal());

        // The log and its broadcast sender are still alive; the stream must
        // end here instead of parking on the live receiver
        let end = tokio::time::timeout(std::time::Duration::from_secs(1), stream.next()).await;
        assert!(
            end.expect("stream still open after the terminal event").is_none()
        );
    }

    #[tokio::test]
    async fn replay_after_completion_is_identical_to_live_view() {
        let log = std::sync::Arc::new(log());
        let live = log.subscribe();

        log.append(EventKind::Start, Some("starting".into()), None);
        log.append(EventKind::Posts, None, Some(serde_json::json!({"shortcode": "x"})));
        log.append(EventKind::Complete, None, None);

        let live_events: Vec<_> = live.map(|r| r.unwrap()).collect().await;
        let replayed: Vec<_> = log.subscribe().map(|r| r.unwrap()).collect().await;
        assert_eq!(live_events, replayed);
    }

    #[tokio::test]
    async fn lagged_subscriber_gets_a_single_error_and_ends() {
        let log = JobLog::new(JobId(2), 4);
        // Subscribe first so all appends go through the live buffer
        let mut stream = log.subscribe();

        // Overflow the 4-slot buffer without polling
        for _ in 0..10 {
            log.append(EventKind::Info, None, None);
        }

        let mut saw_lag = false;
        while let Some(item) = stream.next().await {
            match item {
                Ok(_) => assert!(!saw_lag, "no events after the lag error"),
                Err(lag) => {
                    assert!(lag.skipped > 0);
                    saw_lag = true;
                }
            }
        }
        assert!(saw_lag, "overflowing the buffer must surface SubscriptionLag");

        // The job is unaffected: a fresh subscription replays everything
        log.append(EventKind::Complete, None, None);
        let replayed: Vec<_> = log.subscribe().map(|r| r.unwrap()).collect().await;
        assert_eq!(replayed.len(), 11);
        let seqs: Vec<u64> = replayed.iter().map(|e| e.seq).collect();
        assert_eq!(seqs, (0..11).collect::<Vec<u64>>());
    }

    #[test]
    fn terminal_flag_tracks_last_event() {
        let log = log();
        assert!(!log.is_terminal());
        log.append(EventKind::Start, None, None);
        assert!(!log.is_terminal());
        log.append(EventKind::Error, Some("target not found".into()), None);
        assert!(log.is_terminal());
    }
}
