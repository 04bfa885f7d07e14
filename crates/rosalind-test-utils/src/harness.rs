// SPDX-FileCopyrightText: 2026 Rosalind Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for integration testing.
//!
//! `TestHarness` assembles the durable side of the stack on a temp SQLite
//! database: storage adapter, usage ledger, and stage queue, plus helpers to
//! build workers against them.

use std::sync::Arc;

use rosalind_config::model::{RosalindConfig, StorageConfig};
use rosalind_core::{GovernanceMode, RosalindError, StorageAdapter};
use rosalind_cost::UsageLedger;
use rosalind_stages::{StageExecutor, StageQueue, StageWorker, WorkerSettings};
use rosalind_storage::{Database, SqliteStorage};

/// Builder for creating test environments with configurable options.
pub struct TestHarnessBuilder {
    config: RosalindConfig,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        Self {
            config: RosalindConfig::default(),
        }
    }

    /// Start from this configuration. The storage path is always replaced.
    pub fn with_config(mut self, config: RosalindConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_governance_mode(mut self, mode: GovernanceMode) -> Self {
        self.config.governance.mode = mode.to_string();
        self
    }

    /// Build the harness, creating and migrating a fresh database.
    pub async fn build(mut self) -> Result<TestHarness, RosalindError> {
        let temp_dir =
            tempfile::TempDir::new().map_err(|e| RosalindError::Storage { source: e.into() })?;
        let db_path = temp_dir.path().join("test.db");
        let storage_config = StorageConfig {
            database_path: db_path.to_string_lossy().into_owned(),
            wal_mode: true,
        };
        self.config.storage = storage_config.clone();

        let database = Database::open(&storage_config.database_path).await?;
        let storage: Arc<dyn StorageAdapter> = Arc::new(SqliteStorage::from_database(
            storage_config,
            database.clone(),
        ));
        let ledger = UsageLedger::new(database.clone());
        let queue = StageQueue::new(
            Arc::clone(&storage),
            &self.config.queue,
            &self.config.governance,
        );

        Ok(TestHarness {
            storage,
            database,
            ledger,
            queue,
            config: self.config,
            _temp_dir: temp_dir,
        })
    }
}

/// A test environment backed by a temp database, removed on drop.
pub struct TestHarness {
    /// SQLite storage adapter.
    pub storage: Arc<dyn StorageAdapter>,
    /// The shared database handle behind `storage` and `ledger`.
    pub database: Database,
    /// Usage ledger on the same database.
    pub ledger: UsageLedger,
    /// Stage queue wired to `storage` and the configured governance mode.
    pub queue: StageQueue,
    /// Effective configuration (storage path points into the temp dir).
    pub config: RosalindConfig,
    _temp_dir: tempfile::TempDir,
}

impl TestHarness {
    /// Create a new builder for configuring the test harness.
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    /// A harness with default configuration.
    pub async fn new() -> Result<Self, RosalindError> {
        Self::builder().build().await
    }

    /// A worker that runs jobs from this harness's queue through `executor`.
    pub fn worker(&self, executor: Arc<dyn StageExecutor>) -> StageWorker {
        StageWorker::new(
            Arc::clone(&self.storage),
            executor,
            WorkerSettings::from_config(&self.config.queue),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MockExecutor;
    use rosalind_core::JobStatus;
    use rosalind_stages::JobOutcome;
    use serde_json::json;

    #[tokio::test]
    async fn harness_runs_a_job_end_to_end() {
        let harness = TestHarness::new().await.unwrap();
        let job = harness
            .queue
            .enqueue(2, uuid::Uuid::new_v4(), json!({"query": "statins"}), None)
            .await
            .unwrap();

        let executor = MockExecutor::new();
        let worker = harness.worker(Arc::new(executor.clone()));
        assert_eq!(worker.run_once().await.unwrap(), Some(JobOutcome::Completed));
        assert_eq!(executor.executed().await, vec![job.job_id]);
        assert_eq!(
            harness.queue.get_status(job.job_id).await.unwrap().status,
            JobStatus::Completed
        );
        assert_eq!(harness.ledger.attempt_count().await.unwrap(), 0);
    }
}
