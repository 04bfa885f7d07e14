// SPDX-FileCopyrightText: 2026 Rosalind Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `rosalind serve` command implementation.
//!
//! Opens storage, builds the shared agent client and the model router over
//! the configured tier endpoints, then serves the HTTP API until a shutdown
//! signal arrives.

use std::sync::Arc;

use rosalind_agent_client::{AgentClient, ClientFactory, ClientOptions};
use rosalind_config::RosalindConfig;
use rosalind_core::{RosalindError, StorageAdapter};
use rosalind_cost::UsageLedger;
use rosalind_gateway::{GatewayState, ServerConfig, start_server};
use rosalind_prometheus::PrometheusAdapter;
use rosalind_router::{ModelRouter, ProviderRegistry};
use rosalind_storage::SqliteStorage;
use tracing::{info, warn};

use crate::shutdown;

type MetricsRender = Arc<dyn Fn() -> String + Send + Sync>;

/// Runs the `rosalind serve` command.
pub async fn run_serve(config: RosalindConfig) -> Result<(), RosalindError> {
    init_tracing(&config.server.log_level);
    info!(mode = %config.governance.mode(), "starting rosalind serve");

    // Install the recorder before anything records.
    let prometheus = if config.prometheus.enabled {
        match PrometheusAdapter::new() {
            Ok(adapter) => {
                info!("prometheus metrics enabled");
                Some(Arc::new(adapter))
            }
            Err(e) => {
                warn!(error = %e, "prometheus initialization failed, continuing without metrics");
                None
            }
        }
    } else {
        None
    };

    let storage = open_storage(&config).await?;
    let client = shared_client(&config)?;

    let providers = ProviderRegistry::from_config(&config.routing, client);
    if providers.tiers().is_empty() {
        warn!("no routing tier has an endpoint; /v1/route will report PROVIDER_UNAVAILABLE");
    } else {
        info!(tiers = ?providers.tiers(), "model tiers available");
    }

    let ledger = UsageLedger::new(storage.database()?.clone());
    let mut router = ModelRouter::from_config(&config.routing, providers).with_sink(Arc::new(ledger));
    let mut render: Option<MetricsRender> = None;
    if let Some(adapter) = prometheus {
        router = router.with_sink(adapter.clone());
        render = Some(Arc::new(move || adapter.render()));
    }

    let state = GatewayState::new(
        &config,
        Arc::clone(&storage) as Arc<dyn StorageAdapter>,
        Arc::new(router),
        render,
    );

    let token = shutdown::install_signal_handler();
    let served = start_server(&ServerConfig::from(&config.server), state, token).await;

    storage.close().await?;
    info!("rosalind serve stopped");
    served
}

/// Open and migrate the SQLite store.
pub(crate) async fn open_storage(config: &RosalindConfig) -> Result<Arc<SqliteStorage>, RosalindError> {
    let storage = SqliteStorage::new(config.storage.clone());
    storage.initialize().await?;
    info!(path = %config.storage.database_path, "storage ready");
    Ok(Arc::new(storage))
}

/// The process-wide agent client.
pub(crate) fn shared_client(config: &RosalindConfig) -> Result<Arc<AgentClient>, RosalindError> {
    ClientFactory::new(ClientOptions::from_config(config)).shared()
}

/// Install the global tracing subscriber.
///
/// `RUST_LOG` wins; otherwise `rosalind` crates log at `log_level` and
/// everything else at `warn`.
pub(crate) fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("rosalind={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn storage_opens_in_a_fresh_directory() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = RosalindConfig::default();
        config.storage.database_path = dir.path().join("serve.db").to_string_lossy().into_owned();

        let storage = open_storage(&config).await.unwrap();
        assert!(storage.database().is_ok());
        storage.close().await.unwrap();
    }
}
