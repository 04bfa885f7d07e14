// SPDX-FileCopyrightText: 2026 Rosalind Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Gateway HTTP server built on axum.
//!
//! Sets up routes, middleware, and shared state for the gateway.

use std::collections::BTreeSet;
use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};
use rosalind_config::RosalindConfig;
use rosalind_core::{GovernanceMode, RosalindError, StorageAdapter};
use rosalind_router::{DispatchTable, ModelRouter};
use rosalind_security::PhiGate;
use rosalind_stages::{RelaySettings, StageQueue};
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::sse;

/// Health state for the unauthenticated health/metrics endpoints.
#[derive(Clone)]
pub struct HealthState {
    /// Process start time for uptime calculation.
    pub start_time: std::time::Instant,
    /// Optional Prometheus metrics render function.
    pub prometheus_render: Option<Arc<dyn Fn() -> String + Send + Sync>>,
}

/// Shared state for axum request handlers.
#[derive(Clone)]
pub struct GatewayState {
    /// Boot-validated task type lookup for `/v1/dispatch`.
    pub dispatch: Arc<DispatchTable>,
    /// Model router for `/v1/route`.
    pub router: Arc<ModelRouter>,
    /// Stage job enqueue and status.
    pub queue: StageQueue,
    /// PHI admission for dispatch and routing payloads.
    pub gate: PhiGate,
    /// Configured governance mode. Requests may only tighten it.
    pub mode: GovernanceMode,
    /// Stage numbers that have an agent route.
    pub stages: Arc<BTreeSet<u32>>,
    /// Event stream polling and duration cap.
    pub relay: RelaySettings,
    pub health: HealthState,
}

impl GatewayState {
    /// Wire the handler state from validated configuration.
    pub fn new(
        config: &RosalindConfig,
        storage: Arc<dyn StorageAdapter>,
        router: Arc<ModelRouter>,
        prometheus_render: Option<Arc<dyn Fn() -> String + Send + Sync>>,
    ) -> Self {
        let stages = config
            .stages
            .keys()
            .filter_map(|stage| stage.parse::<u32>().ok())
            .collect();
        Self {
            dispatch: Arc::new(DispatchTable::from_config(config)),
            router,
            queue: StageQueue::new(storage, &config.queue, &config.governance),
            gate: PhiGate::new(config.governance.live_block_threshold),
            mode: config.governance.mode(),
            stages: Arc::new(stages),
            relay: RelaySettings::from_config(&config.stream),
            health: HealthState {
                start_time: std::time::Instant::now(),
                prometheus_render,
            },
        }
    }

    /// The mode a request runs under: the stricter of configured and requested.
    pub fn effective_mode(&self, requested: Option<GovernanceMode>) -> GovernanceMode {
        requested.map_or(self.mode, |mode| self.mode.stricter(mode))
    }

    pub fn storage(&self) -> &Arc<dyn StorageAdapter> {
        self.queue.storage()
    }
}

/// Gateway server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Host address to bind.
    pub host: String,
    /// Port to bind.
    pub port: u16,
}

impl From<&rosalind_config::model::ServerConfig> for ServerConfig {
    fn from(config: &rosalind_config::model::ServerConfig) -> Self {
        Self {
            host: config.host.clone(),
            port: config.port,
        }
    }
}

/// Build the gateway's route table.
///
/// - GET /health, GET /metrics
/// - POST /v1/dispatch, POST /v1/route
/// - POST /stages/{stage}/jobs
/// - GET /stages/{stage}/jobs/{job_id}/status
/// - GET /stages/{stage}/jobs/{job_id}/stream (SSE)
pub fn build_router(state: GatewayState) -> Router {
    let public_routes = Router::new()
        .route("/health", get(handlers::get_health))
        .route("/metrics", get(handlers::get_metrics));

    let api_routes = Router::new()
        .route("/v1/dispatch", post(handlers::post_dispatch))
        .route("/v1/route", post(handlers::post_route))
        .route("/stages/{stage}/jobs", post(handlers::post_stage_job))
        .route(
            "/stages/{stage}/jobs/{job_id}/status",
            get(handlers::get_stage_job_status),
        )
        .route(
            "/stages/{stage}/jobs/{job_id}/stream",
            get(sse::stream_stage_job),
        );

    Router::new()
        .merge(public_routes)
        .merge(api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Bind and serve until `shutdown` is cancelled.
pub async fn start_server(
    config: &ServerConfig,
    state: GatewayState,
    shutdown: CancellationToken,
) -> Result<(), RosalindError> {
    let app = build_router(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| RosalindError::Internal(format!("failed to bind gateway to {addr}: {e}")))?;

    tracing::info!("gateway listening on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .map_err(|e| RosalindError::Internal(format!("gateway server error: {e}")))?;

    tracing::info!("gateway stopped");
    Ok(())
}
