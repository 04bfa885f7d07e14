// SPDX-FileCopyrightText: 2026 Rosalind Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Prometheus metrics adapter for Rosalind.
//!
//! Uses the metrics-rs facade with the Prometheus exporter.
//! Metrics are rendered as Prometheus text format via the `render()` method,
//! which is exposed through the gateway's /metrics endpoint.

pub mod recording;

use async_trait::async_trait;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use rosalind_core::RosalindError;
use rosalind_core::traits::adapter::PluginAdapter;
use rosalind_core::traits::observability::ObservabilityAdapter;
use rosalind_core::types::{AdapterType, HealthStatus, UsageTrace};

pub use recording::{
    record_agent_request, record_circuit_open, record_route_attempt, record_stage_job,
    record_tokens, register_metrics,
};

/// Prometheus metrics adapter.
///
/// Installs the Prometheus recorder and exposes a handle for rendering
/// metrics in Prometheus text format.
pub struct PrometheusAdapter {
    handle: PrometheusHandle,
}

impl PrometheusAdapter {
    /// Installs the Prometheus recorder globally.
    ///
    /// Only one recorder can be installed per process; a second call errors.
    pub fn new() -> Result<Self, RosalindError> {
        let handle = PrometheusBuilder::new().install_recorder().map_err(|e| {
            RosalindError::Internal(format!("failed to install Prometheus recorder: {e}"))
        })?;

        recording::register_metrics();

        tracing::info!("prometheus metrics recorder installed");

        Ok(Self { handle })
    }

    /// Wrap an existing handle (e.g. one built from a non-global recorder).
    pub fn from_handle(handle: PrometheusHandle) -> Self {
        Self { handle }
    }

    pub fn handle(&self) -> &PrometheusHandle {
        &self.handle
    }

    /// Render all collected metrics in Prometheus text format.
    pub fn render(&self) -> String {
        self.handle.render()
    }
}

#[async_trait]
impl PluginAdapter for PrometheusAdapter {
    fn name(&self) -> &str {
        "prometheus"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Observability
    }

    async fn health_check(&self) -> Result<HealthStatus, RosalindError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), RosalindError> {
        Ok(())
    }
}

/// Usage traces become token counters; attempt counters are recorded by the router.
#[async_trait]
impl ObservabilityAdapter for PrometheusAdapter {
    async fn record(&self, trace: UsageTrace) -> Result<(), RosalindError> {
        record_tokens(
            &trace.tier.to_string(),
            trace.input_tokens,
            trace.output_tokens,
        );
        Ok(())
    }
}
