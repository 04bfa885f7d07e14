// SPDX-FileCopyrightText: 2026 Rosalind Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Stage job queue facade used by the API process.
//!
//! The API side only enqueues and reads status; execution belongs to the
//! worker process consuming the same durable store.

use std::sync::Arc;

use rosalind_config::model::{GovernanceConfig, QueueConfig};
use rosalind_core::{GovernanceMode, NewStageJob, RosalindError, StageJob, StorageAdapter};
use rosalind_security::PhiGate;
use serde_json::Value;
use tracing::info;
use uuid::Uuid;

/// Enqueue and status access to stage jobs.
#[derive(Clone)]
pub struct StageQueue {
    storage: Arc<dyn StorageAdapter>,
    gate: PhiGate,
    mode: GovernanceMode,
    max_attempts: u32,
}

impl std::fmt::Debug for StageQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StageQueue")
            .field("mode", &self.mode)
            .field("max_attempts", &self.max_attempts)
            .finish_non_exhaustive()
    }
}

impl StageQueue {
    pub fn new(
        storage: Arc<dyn StorageAdapter>,
        queue: &QueueConfig,
        governance: &GovernanceConfig,
    ) -> Self {
        Self {
            storage,
            gate: PhiGate::new(governance.live_block_threshold),
            mode: governance.mode(),
            max_attempts: queue.max_attempts.max(1),
        }
    }

    pub fn storage(&self) -> &Arc<dyn StorageAdapter> {
        &self.storage
    }

    /// The configured governance mode.
    pub fn mode(&self) -> GovernanceMode {
        self.mode
    }

    /// Persist one new job for `stage`.
    ///
    /// `inputs` must be a JSON object. They are PHI-checked under the stricter
    /// of the configured mode and `mode` before anything is written; a blocked
    /// submission creates no job. The `queued` event is stored with the row.
    pub async fn enqueue(
        &self,
        stage: u32,
        workflow_id: Uuid,
        inputs: Value,
        mode: Option<GovernanceMode>,
    ) -> Result<StageJob, RosalindError> {
        if !inputs.is_object() {
            return Err(RosalindError::Validation(
                "inputs must be a JSON object".to_string(),
            ));
        }

        let effective = mode.map_or(self.mode, |m| self.mode.stricter(m));
        let decision = self.gate.check_json(&inputs, effective);
        if !decision.allowed {
            return Err(RosalindError::Security(decision.reason));
        }

        let job = self
            .storage
            .enqueue_job(NewStageJob {
                stage,
                workflow_id,
                inputs,
                max_attempts: self.max_attempts,
            })
            .await?;

        info!(job_id = %job.job_id, stage, mode = %effective, "stage job enqueued");
        Ok(job)
    }

    pub async fn get_status(&self, job_id: Uuid) -> Result<StageJob, RosalindError> {
        self.storage
            .get_job(job_id)
            .await?
            .ok_or_else(|| RosalindError::NotFound {
                kind: "stage job",
                id: job_id.to_string(),
            })
    }
}
