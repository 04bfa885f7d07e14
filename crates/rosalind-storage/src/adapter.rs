// SPDX-FileCopyrightText: 2026 Rosalind Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of the StorageAdapter trait.

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::OnceCell;
use tracing::debug;
use uuid::Uuid;

use rosalind_config::model::StorageConfig;
use rosalind_core::{
    AdapterType, HealthStatus, JobStatus, NewStageJob, PluginAdapter, RosalindError, StageJob,
    StorageAdapter, StreamEvent,
};

use crate::database::{Database, map_tr_err};
use crate::queries;

/// SQLite-backed storage adapter.
///
/// Wraps a [`Database`] handle and delegates all query operations to the
/// typed query modules. The database is lazily initialized on the first
/// call to [`StorageAdapter::initialize`].
pub struct SqliteStorage {
    config: StorageConfig,
    db: OnceCell<Database>,
}

impl SqliteStorage {
    /// Create a new SqliteStorage with the given configuration.
    ///
    /// The database connection is not opened until [`initialize`] is called.
    ///
    /// [`initialize`]: StorageAdapter::initialize
    pub fn new(config: StorageConfig) -> Self {
        Self {
            config,
            db: OnceCell::new(),
        }
    }

    /// Wrap an already-open database (shared with the usage ledger).
    pub fn from_database(config: StorageConfig, db: Database) -> Self {
        Self {
            config,
            db: OnceCell::new_with(Some(db)),
        }
    }

    /// Returns the underlying Database, or an error if not initialized.
    pub fn database(&self) -> Result<&Database, RosalindError> {
        self.db
            .get()
            .ok_or_else(|| RosalindError::storage("storage not initialized -- call initialize() first"))
    }
}

#[async_trait]
impl PluginAdapter for SqliteStorage {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Storage
    }

    async fn health_check(&self) -> Result<HealthStatus, RosalindError> {
        let db = self.database()?;
        db.connection()
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("SELECT 1;")?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)?;
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), RosalindError> {
        if let Some(db) = self.db.get() {
            db.close().await?;
            debug!("shutdown: WAL checkpoint complete");
        }
        Ok(())
    }
}

#[async_trait]
impl StorageAdapter for SqliteStorage {
    async fn initialize(&self) -> Result<(), RosalindError> {
        if self.db.initialized() {
            return Ok(());
        }
        let db = Database::open_with(&self.config.database_path, self.config.wal_mode).await?;
        self.db
            .set(db)
            .map_err(|_| RosalindError::storage("storage already initialized"))?;
        debug!(path = %self.config.database_path, "SQLite storage initialized");
        Ok(())
    }

    async fn close(&self) -> Result<(), RosalindError> {
        self.database()?.close().await
    }

    async fn enqueue_job(&self, job: NewStageJob) -> Result<StageJob, RosalindError> {
        queries::jobs::insert_job(self.database()?, &job).await
    }

    async fn get_job(&self, job_id: Uuid) -> Result<Option<StageJob>, RosalindError> {
        queries::jobs::get_job(self.database()?, job_id).await
    }

    async fn claim_next_job(&self, lease: Duration) -> Result<Option<StageJob>, RosalindError> {
        queries::jobs::claim_next(self.database()?, lease).await
    }

    async fn complete_job(
        &self,
        job_id: Uuid,
        result: serde_json::Value,
    ) -> Result<(), RosalindError> {
        queries::jobs::complete(self.database()?, job_id, result).await
    }

    async fn fail_job(
        &self,
        job_id: Uuid,
        reason: &str,
        retryable: bool,
        backoff: Duration,
    ) -> Result<JobStatus, RosalindError> {
        queries::jobs::fail(self.database()?, job_id, reason, retryable, backoff).await
    }

    async fn set_job_progress(&self, job_id: Uuid, progress: u8) -> Result<(), RosalindError> {
        queries::jobs::set_progress(self.database()?, job_id, progress).await
    }

    async fn prune_finished_jobs(
        &self,
        keep_completed: u32,
        keep_failed: u32,
    ) -> Result<u64, RosalindError> {
        queries::jobs::prune_finished(self.database()?, keep_completed, keep_failed).await
    }

    async fn append_event(
        &self,
        job_id: Uuid,
        event: &str,
        data: serde_json::Value,
    ) -> Result<i64, RosalindError> {
        queries::events::append_event(self.database()?, job_id, event, data).await
    }

    async fn events_after(
        &self,
        job_id: Uuid,
        after_seq: Option<i64>,
    ) -> Result<Vec<StreamEvent>, RosalindError> {
        queries::events::events_after(self.database()?, job_id, after_seq).await
    }
}
