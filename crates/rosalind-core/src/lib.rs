// SPDX-FileCopyrightText: 2026 Rosalind Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Rosalind dispatch backend.
//!
//! Provides the error taxonomy, the shared domain types (tiers, routing
//! requests and results, stage jobs, stream events), and the adapter traits
//! that the provider, storage, and observability implementations plug into.

pub mod error;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::RosalindError;
pub use types::{
    AdapterType, AttemptOutcome, GovernanceMode, HealthStatus, JobStatus, NewStageJob,
    ProviderRequest, ProviderResponse, QualityCheck, QualityGateSummary, RoutingInfo,
    RoutingRequest, RoutingResult, StageJob, StreamEvent, TERMINAL_EVENTS, TaskType, Tier,
    TokenUsage, UsageInfo, UsageTrace,
};

pub use traits::{ObservabilityAdapter, PluginAdapter, ProviderAdapter, StorageAdapter};
