// SPDX-FileCopyrightText: 2026 Rosalind Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Observability adapter trait for routing usage traces.

use async_trait::async_trait;

use crate::error::RosalindError;
use crate::traits::adapter::PluginAdapter;
use crate::types::UsageTrace;

/// Adapter for recording per-attempt usage traces (tokens, cost, latency).
///
/// Callers treat recording as best-effort: a failing sink is logged, never
/// propagated into the request path.
#[async_trait]
pub trait ObservabilityAdapter: PluginAdapter {
    /// Records a usage trace.
    async fn record(&self, trace: UsageTrace) -> Result<(), RosalindError>;
}
