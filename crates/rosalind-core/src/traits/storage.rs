// SPDX-FileCopyrightText: 2026 Rosalind Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Storage adapter trait for the durable stage job queue and event log.

use std::time::Duration;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::RosalindError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{JobStatus, NewStageJob, StageJob, StreamEvent};

/// Adapter for storage and persistence backends.
///
/// The storage backend is the only state shared between the API process and
/// the stage workers, so every job transition goes through this trait.
#[async_trait]
pub trait StorageAdapter: PluginAdapter {
    /// Initializes the storage backend (migrations, connection, etc.).
    async fn initialize(&self) -> Result<(), RosalindError>;

    /// Closes the storage backend, flushing pending writes.
    async fn close(&self) -> Result<(), RosalindError>;

    // --- Stage jobs ---

    /// Persist a new job in `queued` state and return it.
    ///
    /// The row and its seq-0 `queued` event are written atomically; either
    /// both exist afterwards or neither does.
    async fn enqueue_job(&self, job: NewStageJob) -> Result<StageJob, RosalindError>;

    /// Fetch a job by id.
    async fn get_job(&self, job_id: Uuid) -> Result<Option<StageJob>, RosalindError>;

    /// Atomically claim the next runnable job, marking it `active` under a lease.
    ///
    /// Runnable means `queued` with its backoff elapsed, or `active` with an
    /// expired lease (a worker died mid-job).
    async fn claim_next_job(&self, lease: Duration) -> Result<Option<StageJob>, RosalindError>;

    /// Mark a job `completed` with its result.
    async fn complete_job(
        &self,
        job_id: Uuid,
        result: serde_json::Value,
    ) -> Result<(), RosalindError>;

    /// Record a failed attempt.
    ///
    /// Re-queues the job after `backoff` when `retryable` and attempts remain;
    /// otherwise marks it `failed`. Returns the resulting status.
    async fn fail_job(
        &self,
        job_id: Uuid,
        reason: &str,
        retryable: bool,
        backoff: Duration,
    ) -> Result<JobStatus, RosalindError>;

    /// Update the progress percentage (0-100) of an active job.
    async fn set_job_progress(&self, job_id: Uuid, progress: u8) -> Result<(), RosalindError>;

    /// Delete finished jobs (and their events) beyond the newest `keep_*` of each kind.
    async fn prune_finished_jobs(
        &self,
        keep_completed: u32,
        keep_failed: u32,
    ) -> Result<u64, RosalindError>;

    // --- Event log ---

    /// Append an event to a job's log, returning its sequence number.
    async fn append_event(
        &self,
        job_id: Uuid,
        event: &str,
        data: serde_json::Value,
    ) -> Result<i64, RosalindError>;

    /// Events with `seq` strictly greater than `after_seq` (all when `None`), in order.
    async fn events_after(
        &self,
        job_id: Uuid,
        after_seq: Option<i64>,
    ) -> Result<Vec<StreamEvent>, RosalindError>;
}
