// SPDX-FileCopyrightText: 2026 Rosalind Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Stage execution.
//!
//! A [`StageExecutor`] runs one claimed job. [`AgentExecutor`] forwards the
//! job to the agent registered for its stage.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use rosalind_agent_client::AgentClient;
use rosalind_config::model::RosalindConfig;
use rosalind_core::{RosalindError, StageJob, StorageAdapter};
use serde_json::{Value, json};
use tracing::{debug, warn};
use uuid::Uuid;

/// Why an execution attempt failed, and whether another attempt may help.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageFailure {
    pub reason: String,
    pub retryable: bool,
}

impl StageFailure {
    pub fn retryable(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
            retryable: true,
        }
    }

    pub fn permanent(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
            retryable: false,
        }
    }
}

/// Handle an executor uses to report progress on its job.
#[derive(Clone)]
pub struct ProgressReporter {
    storage: Arc<dyn StorageAdapter>,
    job_id: Uuid,
}

impl ProgressReporter {
    pub fn new(storage: Arc<dyn StorageAdapter>, job_id: Uuid) -> Self {
        Self { storage, job_id }
    }

    /// Record `progress` (clamped to 100) on the job row and the event log.
    pub async fn report(&self, progress: u8) -> Result<(), RosalindError> {
        let progress = progress.min(100);
        self.storage.set_job_progress(self.job_id, progress).await?;
        self.storage
            .append_event(self.job_id, "progress", json!({ "progress": progress }))
            .await?;
        debug!(job_id = %self.job_id, progress, "stage progress");
        Ok(())
    }
}

#[async_trait]
pub trait StageExecutor: Send + Sync + 'static {
    /// Run `job` once, returning its result document.
    async fn execute(
        &self,
        job: &StageJob,
        progress: &ProgressReporter,
    ) -> Result<Value, StageFailure>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct StageTarget {
    base_url: String,
    path: String,
}

/// Executes stages by POSTing them to their registered agents.
#[derive(Debug)]
pub struct AgentExecutor {
    client: Arc<AgentClient>,
    routes: BTreeMap<u32, StageTarget>,
}

impl AgentExecutor {
    /// Resolve every `[stages]` entry to its agent base URL.
    pub fn from_config(config: &RosalindConfig, client: Arc<AgentClient>) -> Self {
        let routes = config
            .stages
            .iter()
            .filter_map(|(stage, route)| {
                let stage = stage.parse::<u32>().ok()?;
                let base_url = config.agent_url(&route.agent)?.to_string();
                Some((
                    stage,
                    StageTarget {
                        base_url,
                        path: route.path.clone(),
                    },
                ))
            })
            .collect();
        Self { client, routes }
    }

    /// Stages this executor can run.
    pub fn stages(&self) -> Vec<u32> {
        self.routes.keys().copied().collect()
    }
}

#[async_trait]
impl StageExecutor for AgentExecutor {
    async fn execute(
        &self,
        job: &StageJob,
        progress: &ProgressReporter,
    ) -> Result<Value, StageFailure> {
        let Some(target) = self.routes.get(&job.stage) else {
            return Err(StageFailure::permanent(format!(
                "no agent route for stage {}",
                job.stage
            )));
        };

        let body = json!({
            "job_id": job.job_id,
            "workflow_id": job.workflow_id,
            "stage": job.stage,
            "inputs": job.inputs,
        });
        let response = self
            .client
            .post_sync(&target.base_url, &target.path, &body, None)
            .await;

        if response.success {
            if let Err(e) = progress.report(100).await {
                warn!(job_id = %job.job_id, error = %e, "progress update failed");
            }
            return Ok(response.data.unwrap_or(Value::Null));
        }

        let reason = response
            .error
            .clone()
            .unwrap_or_else(|| format!("HTTP {}", response.status_code));
        let reason = format!("agent returned {}: {reason}", response.status_code);
        if response.is_transient() {
            Err(StageFailure::retryable(reason))
        } else {
            Err(StageFailure::permanent(reason))
        }
    }
}
