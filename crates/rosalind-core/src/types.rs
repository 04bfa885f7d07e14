// SPDX-FileCopyrightText: 2026 Rosalind Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common types used across adapter traits and the Rosalind crates.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};
use uuid::Uuid;

/// Health status reported by adapter health checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Adapter is fully operational.
    Healthy,
    /// Adapter is operational but experiencing issues.
    Degraded(String),
    /// Adapter is not operational.
    Unhealthy(String),
}

/// Identifies the type of adapter.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum AdapterType {
    Provider,
    Storage,
    Observability,
}

// --- Routing ---

/// Execution tiers ordered from cheapest to most capable.
///
/// The derived `Ord` is the escalation order: `Local < Nano < Mini < Frontier < Mercury`.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Display,
    EnumString,
    EnumIter,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Tier {
    Local,
    Nano,
    Mini,
    Frontier,
    Mercury,
}

impl Tier {
    /// All tiers in escalation order.
    pub const ALL: [Tier; 5] = [
        Tier::Local,
        Tier::Nano,
        Tier::Mini,
        Tier::Frontier,
        Tier::Mercury,
    ];

    /// The next tier up the ladder, or `None` at the top.
    pub fn next(self) -> Option<Tier> {
        let idx = Tier::ALL.iter().position(|t| *t == self)?;
        Tier::ALL.get(idx + 1).copied()
    }
}

/// Task types the model router understands.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Display,
    EnumString,
    EnumIter,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskType {
    Classify,
    Extract,
    Summarize,
    PhiRedaction,
    LiteratureSynthesis,
    StatisticalReasoning,
    ProtocolDraft,
    ManuscriptDraft,
}

impl TaskType {
    /// Task types whose output must be a JSON document.
    pub fn expects_json(self) -> bool {
        matches!(self, TaskType::Classify | TaskType::Extract)
    }
}

/// Governance mode for PHI handling.
///
/// DEMO never admits PHI; LIVE admits real data under confidence-gated controls.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GovernanceMode {
    Demo,
    Live,
}

impl GovernanceMode {
    /// The stricter of two modes. DEMO is stricter than LIVE.
    pub fn stricter(self, other: GovernanceMode) -> GovernanceMode {
        if self == GovernanceMode::Demo || other == GovernanceMode::Demo {
            GovernanceMode::Demo
        } else {
            GovernanceMode::Live
        }
    }
}

/// A request to route a task through the tier ladder.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingRequest {
    pub task_type: TaskType,
    pub prompt: String,
    #[serde(default)]
    pub system_prompt: Option<String>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    #[serde(default)]
    pub force_tier: Option<Tier>,
    #[serde(default)]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

impl RoutingRequest {
    /// Create a request with no overrides.
    pub fn new(task_type: TaskType, prompt: impl Into<String>) -> Self {
        Self {
            task_type,
            prompt: prompt.into(),
            system_prompt: None,
            max_tokens: None,
            force_tier: None,
            metadata: BTreeMap::new(),
        }
    }

    /// Pin the request to a single tier (disables escalation).
    pub fn with_force_tier(mut self, tier: Tier) -> Self {
        self.force_tier = Some(tier);
        self
    }
}

/// Token counts reported by a provider.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

/// One structural/content check performed by the quality gate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityCheck {
    pub name: String,
    pub passed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Quality gate summary attached to a routing result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityGateSummary {
    pub passed: bool,
    pub score: f64,
    pub checks: Vec<QualityCheck>,
    #[serde(default)]
    pub recommendations: Vec<String>,
}

/// Where a routing result came from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingInfo {
    pub provider: String,
    pub model: String,
    pub tier: Tier,
    pub task_type: TaskType,
    pub latency_ms: u64,
}

/// Token and cost accounting for a routing result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageInfo {
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub total_tokens: u32,
    pub estimated_cost_usd: f64,
}

/// Outcome of a completed routing attempt chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingResult {
    pub content: String,
    pub routing: RoutingInfo,
    pub usage: UsageInfo,
    pub quality_gate: QualityGateSummary,
    /// Tiers tried, in order, including the one that produced `content`.
    pub tiers_tried: Vec<Tier>,
}

/// A completion request sent to a provider adapter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderRequest {
    pub model: String,
    pub prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
    pub max_tokens: u32,
}

/// A completion response from a provider adapter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderResponse {
    pub content: String,
    pub model: String,
    pub usage: TokenUsage,
}

/// Outcome of a single routing attempt, recorded in usage traces.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AttemptOutcome {
    Passed,
    QualityFailed,
    ProviderError,
}

/// Per-attempt usage record emitted by the router for observability.
///
/// Carries counts and identifiers only, never prompt or response text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageTrace {
    pub id: String,
    pub task_type: TaskType,
    pub tier: Tier,
    pub provider: String,
    pub model: String,
    pub attempt: u32,
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub cost_usd: f64,
    pub latency_ms: u64,
    pub outcome: AttemptOutcome,
}

// --- Stage jobs ---

/// Lifecycle of a stage job: `queued -> active -> (completed | failed)`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Active,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

/// A submission for the stage job queue.
#[derive(Debug, Clone)]
pub struct NewStageJob {
    pub stage: u32,
    pub workflow_id: Uuid,
    pub inputs: serde_json::Value,
    pub max_attempts: u32,
}

/// One unit of long-running workflow-stage execution work.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageJob {
    pub job_id: Uuid,
    pub stage: u32,
    pub workflow_id: Uuid,
    pub inputs: serde_json::Value,
    pub status: JobStatus,
    pub attempts: u32,
    pub max_attempts: u32,
    pub progress: u8,
    pub created_at: String,
    pub processed_at: Option<String>,
    pub finished_at: Option<String>,
    pub result: Option<serde_json::Value>,
    pub failure_reason: Option<String>,
}

/// Event names that end an event stream.
pub const TERMINAL_EVENTS: &[&str] = &["done", "completed", "failed"];

/// An append-only event recorded against a stage job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamEvent {
    pub seq: i64,
    pub event: String,
    pub data: serde_json::Value,
}

impl StreamEvent {
    pub fn is_terminal(&self) -> bool {
        TERMINAL_EVENTS.contains(&self.event.as_str())
    }
}
