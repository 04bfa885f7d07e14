// SPDX-FileCopyrightText: 2026 Rosalind Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock stage executor with scripted outcomes.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rosalind_core::StageJob;
use rosalind_stages::{ProgressReporter, StageExecutor, StageFailure};
use serde_json::{Value, json};
use tokio::sync::Mutex;
use uuid::Uuid;

/// Executes stage jobs by playing back scripted outcomes.
///
/// Reports 50% progress on every job. When the script is empty, jobs
/// complete with `{"ok": true}`.
#[derive(Clone, Default)]
pub struct MockExecutor {
    outcomes: Arc<Mutex<VecDeque<Result<Value, StageFailure>>>>,
    executed: Arc<Mutex<Vec<Uuid>>>,
    delay: Duration,
}

impl MockExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_outcomes(outcomes: Vec<Result<Value, StageFailure>>) -> Self {
        Self {
            outcomes: Arc::new(Mutex::new(outcomes.into())),
            ..Self::default()
        }
    }

    /// Sleep this long inside every execution.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Ids of every job executed, in order, including retries.
    pub async fn executed(&self) -> Vec<Uuid> {
        self.executed.lock().await.clone()
    }
}

#[async_trait]
impl StageExecutor for MockExecutor {
    async fn execute(
        &self,
        job: &StageJob,
        progress: &ProgressReporter,
    ) -> Result<Value, StageFailure> {
        self.executed.lock().await.push(job.job_id);
        progress
            .report(50)
            .await
            .map_err(|e| StageFailure::retryable(e.to_string()))?;
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.outcomes
            .lock()
            .await
            .pop_front()
            .unwrap_or_else(|| Ok(json!({"ok": true})))
    }
}
