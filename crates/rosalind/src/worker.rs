// SPDX-FileCopyrightText: 2026 Rosalind Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `rosalind worker` command implementation.

use std::sync::Arc;

use rosalind_config::RosalindConfig;
use rosalind_core::{RosalindError, StorageAdapter};
use rosalind_stages::{AgentExecutor, StageWorker, WorkerSettings};
use tracing::info;

use crate::serve::{init_tracing, open_storage, shared_client};
use crate::shutdown;

/// Runs the stage worker pool until a shutdown signal arrives.
///
/// In-flight jobs finish before the pool exits; a job interrupted harder
/// than that is reclaimed once its lease expires.
pub async fn run_worker(config: RosalindConfig) -> Result<(), RosalindError> {
    init_tracing(&config.server.log_level);

    let storage = open_storage(&config).await?;
    let executor = AgentExecutor::from_config(&config, shared_client(&config)?);
    if executor.stages().is_empty() {
        return Err(RosalindError::Config(
            "no stage has an agent route; nothing to execute".to_string(),
        ));
    }

    let settings = WorkerSettings::from_config(&config.queue);
    info!(
        stages = ?executor.stages(),
        concurrency = settings.concurrency,
        "starting rosalind worker"
    );

    let worker = StageWorker::new(
        Arc::clone(&storage) as Arc<dyn StorageAdapter>,
        Arc::new(executor),
        settings,
    );
    let result = worker.run(shutdown::install_signal_handler()).await;

    storage.close().await?;
    info!("rosalind worker stopped");
    result
}
