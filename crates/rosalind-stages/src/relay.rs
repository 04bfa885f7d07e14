// SPDX-FileCopyrightText: 2026 Rosalind Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Event stream relay.
//!
//! Replays a job's stored events from the start, then polls the event log
//! for anything newer than the last delivered sequence number. Events leave
//! in strictly increasing `seq` order and none is delivered twice.
//!
//! Under [`Termination::JobState`] a terminal job row whose terminal event
//! has not been stored yet yields a synthesized event at the next `seq`. It
//! has the same name and data the worker stores, so it stands in for that
//! event and a later reconnect sees the stored copy at the same `seq`.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use futures::Stream;
use futures::stream;
use rosalind_config::model::StreamConfig;
use rosalind_core::{JobStatus, StageJob, StorageAdapter, StreamEvent};
use serde_json::json;
use tokio::time::Instant;
use tracing::{debug, warn};
use uuid::Uuid;

/// How the relay decides a stream is finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// Only a stored terminal event ends the stream.
    DoneMarker,
    /// A stored terminal event, or the job row reaching a terminal state.
    JobState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelaySettings {
    pub poll_interval: Duration,
    /// Hard cap on one stream's lifetime, independent of activity.
    pub max_duration: Duration,
}

impl RelaySettings {
    pub fn from_config(config: &StreamConfig) -> Self {
        Self {
            poll_interval: Duration::from_millis(config.poll_interval_ms),
            max_duration: Duration::from_secs(config.max_duration_secs),
        }
    }
}

/// One item of a relayed stream.
#[derive(Debug, Clone, PartialEq)]
pub enum RelayItem {
    Event(StreamEvent),
    /// A poll found nothing new.
    Heartbeat,
    /// The wall-clock cap elapsed before a terminal event. Always last.
    Timeout,
    /// The event store could not be read. Always last.
    Error(String),
}

struct RelayState {
    storage: Arc<dyn StorageAdapter>,
    job_id: Uuid,
    termination: Termination,
    settings: RelaySettings,
    deadline: Instant,
    last_seq: Option<i64>,
    pending: VecDeque<StreamEvent>,
    polled: bool,
    done: bool,
}

/// Relay the events of `job_id` as a stream.
pub fn relay(
    storage: Arc<dyn StorageAdapter>,
    job_id: Uuid,
    termination: Termination,
    settings: RelaySettings,
) -> impl Stream<Item = RelayItem> + Send + 'static {
    let state = RelayState {
        storage,
        job_id,
        termination,
        settings,
        deadline: Instant::now() + settings.max_duration,
        last_seq: None,
        pending: VecDeque::new(),
        polled: false,
        done: false,
    };
    stream::unfold(state, |mut state| async move {
        let item = state.next_item().await?;
        Some((item, state))
    })
}

impl RelayState {
    async fn next_item(&mut self) -> Option<RelayItem> {
        if self.done {
            return None;
        }
        loop {
            if let Some(event) = self.pending.pop_front() {
                self.last_seq = Some(event.seq);
                if event.is_terminal() {
                    debug!(job_id = %self.job_id, seq = event.seq, "terminal event relayed");
                    self.done = true;
                }
                return Some(RelayItem::Event(event));
            }

            let now = Instant::now();
            if now >= self.deadline {
                debug!(job_id = %self.job_id, "stream reached its time limit");
                self.done = true;
                return Some(RelayItem::Timeout);
            }

            // Replay immediately; every later poll waits one interval.
            if self.polled {
                let wait = self.settings.poll_interval.min(self.deadline - now);
                tokio::time::sleep(wait).await;
                if Instant::now() >= self.deadline {
                    continue;
                }
            }
            self.polled = true;

            let events = match self.storage.events_after(self.job_id, self.last_seq).await {
                Ok(events) => events,
                Err(e) => return Some(self.fail(e.to_string())),
            };
            // The store orders by seq; the guard keeps delivery monotonic anyway.
            let floor = self.last_seq.unwrap_or(-1);
            self.pending
                .extend(events.into_iter().filter(|e| e.seq > floor));
            if !self.pending.is_empty() {
                continue;
            }

            if self.termination == Termination::JobState {
                match self.storage.get_job(self.job_id).await {
                    Ok(Some(job)) if job.status.is_terminal() => {
                        self.done = true;
                        return Some(RelayItem::Event(self.synthetic_terminal(&job)));
                    }
                    Ok(_) => {}
                    Err(e) => return Some(self.fail(e.to_string())),
                }
            }
            return Some(RelayItem::Heartbeat);
        }
    }

    fn fail(&mut self, message: String) -> RelayItem {
        warn!(job_id = %self.job_id, error = %message, "event relay stopped");
        self.done = true;
        RelayItem::Error(message)
    }

    fn synthetic_terminal(&self, job: &StageJob) -> StreamEvent {
        let seq = self.last_seq.map_or(0, |s| s + 1);
        match job.status {
            JobStatus::Failed => StreamEvent {
                seq,
                event: "failed".to_string(),
                data: json!({ "reason": job.failure_reason }),
            },
            _ => StreamEvent {
                seq,
                event: "completed".to_string(),
                data: json!({ "result": job.result }),
            },
        }
    }
}
