// SPDX-FileCopyrightText: 2026 Rosalind Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Stage worker pool.
//!
//! Runs `concurrency` claim loops against the durable queue. Each loop claims
//! one job at a time under a lease, executes it, and records the outcome. A
//! crashed worker's lease expires and the job is claimed again, so execution
//! is at-least-once.

use std::sync::Arc;
use std::time::Duration;

use rosalind_config::model::QueueConfig;
use rosalind_core::{JobStatus, RosalindError, StageJob, StorageAdapter};
use serde_json::json;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::executor::{ProgressReporter, StageExecutor};

/// Worker pool tuning.
#[derive(Debug, Clone)]
pub struct WorkerSettings {
    pub concurrency: usize,
    pub lease: Duration,
    pub poll_interval: Duration,
    pub keep_completed: u32,
    pub keep_failed: u32,
    queue: QueueConfig,
}

impl WorkerSettings {
    pub fn from_config(queue: &QueueConfig) -> Self {
        Self {
            concurrency: queue.concurrency.max(1),
            lease: Duration::from_secs(queue.lease_secs),
            poll_interval: Duration::from_millis(queue.poll_interval_ms),
            keep_completed: queue.keep_completed,
            keep_failed: queue.keep_failed,
            queue: queue.clone(),
        }
    }

    /// Delay before the next attempt after `attempts` failed ones.
    pub fn backoff(&self, attempts: u32) -> Duration {
        self.queue.backoff(attempts)
    }
}

/// What happened to a claimed job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobOutcome {
    Completed,
    Retrying,
    Failed,
}

impl JobOutcome {
    fn label(self) -> &'static str {
        match self {
            JobOutcome::Completed => "completed",
            JobOutcome::Retrying => "retried",
            JobOutcome::Failed => "failed",
        }
    }
}

/// Claims and executes stage jobs.
#[derive(Clone)]
pub struct StageWorker {
    storage: Arc<dyn StorageAdapter>,
    executor: Arc<dyn StageExecutor>,
    settings: WorkerSettings,
}

impl StageWorker {
    pub fn new(
        storage: Arc<dyn StorageAdapter>,
        executor: Arc<dyn StageExecutor>,
        settings: WorkerSettings,
    ) -> Self {
        Self {
            storage,
            executor,
            settings,
        }
    }

    /// Run the claim loops until `cancel` fires. In-flight jobs finish first.
    pub async fn run(&self, cancel: CancellationToken) -> Result<(), RosalindError> {
        info!(concurrency = self.settings.concurrency, "stage worker starting");
        let mut loops = JoinSet::new();
        for slot in 0..self.settings.concurrency {
            let worker = self.clone();
            let cancel = cancel.clone();
            loops.spawn(async move { worker.claim_loop(slot, cancel).await });
        }
        while let Some(joined) = loops.join_next().await {
            if let Err(e) = joined {
                error!(error = %e, "worker loop panicked");
            }
        }
        info!("stage worker stopped");
        Ok(())
    }

    async fn claim_loop(&self, slot: usize, cancel: CancellationToken) {
        debug!(slot, "claim loop started");
        while !cancel.is_cancelled() {
            let idle = match self.run_once().await {
                Ok(Some(_)) => false,
                Ok(None) => true,
                Err(e) => {
                    warn!(slot, error = %e, "claim failed");
                    true
                }
            };
            if idle {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(self.settings.poll_interval) => {}
                }
            }
        }
        debug!(slot, "claim loop stopped");
    }

    /// Claim and process at most one job. Returns `None` when nothing was runnable.
    pub async fn run_once(&self) -> Result<Option<JobOutcome>, RosalindError> {
        let Some(job) = self.storage.claim_next_job(self.settings.lease).await? else {
            return Ok(None);
        };
        self.process(job).await.map(Some)
    }

    async fn process(&self, job: StageJob) -> Result<JobOutcome, RosalindError> {
        info!(job_id = %job.job_id, stage = job.stage, attempt = job.attempts, "stage job started");
        self.append(&job, "started", json!({ "attempt": job.attempts })).await;

        let reporter = ProgressReporter::new(Arc::clone(&self.storage), job.job_id);
        let outcome = match self.executor.execute(&job, &reporter).await {
            Ok(result) => {
                self.storage.complete_job(job.job_id, result.clone()).await?;
                self.append(&job, "completed", json!({ "result": result })).await;
                info!(job_id = %job.job_id, "stage job completed");
                JobOutcome::Completed
            }
            Err(failure) => {
                let backoff = self.settings.backoff(job.attempts);
                let status = self
                    .storage
                    .fail_job(job.job_id, &failure.reason, failure.retryable, backoff)
                    .await?;
                if status == JobStatus::Queued {
                    self.append(
                        &job,
                        "retrying",
                        json!({
                            "attempt": job.attempts,
                            "reason": failure.reason,
                            "retry_in_ms": u64::try_from(backoff.as_millis()).unwrap_or(u64::MAX),
                        }),
                    )
                    .await;
                    warn!(job_id = %job.job_id, attempt = job.attempts, "stage job will retry");
                    JobOutcome::Retrying
                } else {
                    self.append(&job, "failed", json!({ "reason": failure.reason })).await;
                    warn!(job_id = %job.job_id, attempt = job.attempts, "stage job failed");
                    JobOutcome::Failed
                }
            }
        };
        self.finish(outcome).await;
        Ok(outcome)
    }

    async fn finish(&self, outcome: JobOutcome) {
        rosalind_prometheus::record_stage_job(outcome.label());
        if outcome == JobOutcome::Retrying {
            return;
        }
        match self
            .storage
            .prune_finished_jobs(self.settings.keep_completed, self.settings.keep_failed)
            .await
        {
            Ok(0) => {}
            Ok(pruned) => debug!(pruned, "pruned finished stage jobs"),
            Err(e) => warn!(error = %e, "pruning finished stage jobs failed"),
        }
    }

    /// Event appends are best-effort; the job row is the source of truth.
    async fn append(&self, job: &StageJob, event: &str, data: serde_json::Value) {
        if let Err(e) = self.storage.append_event(job.job_id, event, data).await {
            warn!(job_id = %job.job_id, event, error = %e, "event append failed");
        }
    }
}
