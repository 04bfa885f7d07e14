// SPDX-FileCopyrightText: 2026 Rosalind Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Rosalind dispatch backend.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup. Tier, task-type, and governance-mode names are
//! kept as strings here and checked by [`crate::validation`]; the typed
//! accessors below assume a validated config.

use std::collections::BTreeMap;
use std::str::FromStr;
use std::time::Duration;

use rosalind_core::{GovernanceMode, TaskType, Tier};
use serde::{Deserialize, Serialize};

/// Top-level Rosalind configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable overrides.
/// All sections are optional and default to sensible values.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RosalindConfig {
    /// HTTP listener settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Storage backend settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Outbound network security settings.
    #[serde(default)]
    pub security: SecurityConfig,

    /// PHI governance settings.
    #[serde(default)]
    pub governance: GovernanceConfig,

    /// Logical agent name to base URL registry.
    #[serde(default = "default_agents")]
    pub agents: BTreeMap<String, String>,

    /// Inbound dispatch table settings.
    #[serde(default)]
    pub dispatch: DispatchConfig,

    /// Stage number (as a string key) to agent route.
    #[serde(default = "default_stages")]
    pub stages: BTreeMap<String, StageRouteConfig>,

    /// Agent client timeout and circuit breaker settings.
    #[serde(default)]
    pub client: ClientConfig,

    /// Model router settings.
    #[serde(default)]
    pub routing: RoutingConfig,

    /// Stage job queue settings.
    #[serde(default)]
    pub queue: QueueConfig,

    /// Event stream relay settings.
    #[serde(default)]
    pub stream: StreamConfig,

    /// Prometheus exporter settings.
    #[serde(default)]
    pub prometheus: PrometheusConfig,
}

impl Default for RosalindConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            storage: StorageConfig::default(),
            security: SecurityConfig::default(),
            governance: GovernanceConfig::default(),
            agents: default_agents(),
            dispatch: DispatchConfig::default(),
            stages: default_stages(),
            client: ClientConfig::default(),
            routing: RoutingConfig::default(),
            queue: QueueConfig::default(),
            stream: StreamConfig::default(),
            prometheus: PrometheusConfig::default(),
        }
    }
}

impl RosalindConfig {
    /// Base URL of a registered agent.
    pub fn agent_url(&self, name: &str) -> Option<&str> {
        self.agents.get(name).map(String::as_str)
    }

    /// Route for a workflow stage.
    pub fn stage_route(&self, stage: u32) -> Option<&StageRouteConfig> {
        self.stages.get(&stage.to_string())
    }
}

/// HTTP listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            log_level: default_log_level(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Storage backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL (Write-Ahead Logging) mode for SQLite.
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: default_wal_mode(),
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("rosalind").join("rosalind.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("rosalind.db"))
        .to_string_lossy()
        .into_owned()
}

fn default_wal_mode() -> bool {
    true
}

/// Outbound network security configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SecurityConfig {
    /// Private IP addresses allowed as outbound targets (e.g., local services).
    #[serde(default)]
    pub allowed_private_ips: Vec<String>,

    /// Hostnames exempt from resolver filtering. Registered agent hosts are
    /// always trusted in addition to these.
    #[serde(default)]
    pub trusted_hosts: Vec<String>,

    /// Filter DNS results for private addresses before connecting.
    #[serde(default = "default_true")]
    pub resolve_guard: bool,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            allowed_private_ips: Vec::new(),
            trusted_hosts: Vec::new(),
            resolve_guard: true,
        }
    }
}

fn default_true() -> bool {
    true
}

/// PHI governance configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct GovernanceConfig {
    /// `DEMO` (no real patient data) or `LIVE`.
    #[serde(default = "default_mode")]
    pub mode: String,

    /// PHI confidence at or above which LIVE mode blocks.
    #[serde(default = "default_live_block_threshold")]
    pub live_block_threshold: f64,
}

impl Default for GovernanceConfig {
    fn default() -> Self {
        Self {
            mode: default_mode(),
            live_block_threshold: default_live_block_threshold(),
        }
    }
}

impl GovernanceConfig {
    /// Configured mode; an unparseable value falls back to DEMO.
    pub fn mode(&self) -> GovernanceMode {
        GovernanceMode::from_str(&self.mode).unwrap_or(GovernanceMode::Demo)
    }
}

fn default_mode() -> String {
    "DEMO".to_string()
}

fn default_live_block_threshold() -> f64 {
    0.7
}

fn default_agents() -> BTreeMap<String, String> {
    [
        ("agent-stage2-lit", "http://agent-stage2-lit:8010"),
        ("agent-stage2-screen", "http://agent-stage2-screen:8011"),
        ("agent-stage2-extract", "http://agent-stage2-extract:8012"),
        ("agent-stage3-synthesis", "http://agent-stage3-synthesis:8013"),
        ("agent-stage4-manuscript", "http://agent-stage4-manuscript:8014"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

/// Inbound dispatch table configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DispatchConfig {
    /// Agent task type to logical agent name.
    #[serde(default = "default_agent_routes")]
    pub agent_routes: BTreeMap<String, String>,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            agent_routes: default_agent_routes(),
        }
    }
}

fn default_agent_routes() -> BTreeMap<String, String> {
    [
        ("STAGE_2_LITERATURE_REVIEW", "agent-stage2-lit"),
        ("STAGE_2_SCREENING", "agent-stage2-screen"),
        ("STAGE_2_EXTRACTION", "agent-stage2-extract"),
        ("STAGE_3_SYNTHESIS", "agent-stage3-synthesis"),
        ("STAGE_4_MANUSCRIPT_DRAFT", "agent-stage4-manuscript"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

/// Where a workflow stage's jobs are executed.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StageRouteConfig {
    /// Registered agent name.
    pub agent: String,

    /// Request path on the agent.
    #[serde(default = "default_stage_path")]
    pub path: String,
}

fn default_stage_path() -> String {
    "/run".to_string()
}

fn default_stages() -> BTreeMap<String, StageRouteConfig> {
    [
        ("2", "agent-stage2-lit"),
        ("3", "agent-stage3-synthesis"),
        ("4", "agent-stage4-manuscript"),
    ]
    .into_iter()
    .map(|(stage, agent)| {
        (
            stage.to_string(),
            StageRouteConfig {
                agent: agent.to_string(),
                path: default_stage_path(),
            },
        )
    })
    .collect()
}

/// Agent client timeout and circuit breaker configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ClientConfig {
    /// Default per-request timeout.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Consecutive failures that open a target's breaker.
    #[serde(default = "default_breaker_threshold")]
    pub breaker_threshold: u32,

    /// How long an open breaker waits before allowing a trial call.
    #[serde(default = "default_breaker_reset_timeout_ms")]
    pub breaker_reset_timeout_ms: u64,

    /// Trial calls allowed in flight while half-open.
    #[serde(default = "default_half_open_max_trials")]
    pub half_open_max_trials: u32,

    /// Consecutive half-open successes that close the breaker.
    #[serde(default = "default_half_open_success_threshold")]
    pub half_open_success_threshold: u32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout_ms(),
            breaker_threshold: default_breaker_threshold(),
            breaker_reset_timeout_ms: default_breaker_reset_timeout_ms(),
            half_open_max_trials: default_half_open_max_trials(),
            half_open_success_threshold: default_half_open_success_threshold(),
        }
    }
}

impl ClientConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn breaker_reset_timeout(&self) -> Duration {
        Duration::from_millis(self.breaker_reset_timeout_ms)
    }
}

fn default_timeout_ms() -> u64 {
    30_000
}

fn default_breaker_threshold() -> u32 {
    5
}

fn default_breaker_reset_timeout_ms() -> u64 {
    30_000
}

fn default_half_open_max_trials() -> u32 {
    1
}

fn default_half_open_success_threshold() -> u32 {
    2
}

/// Per-tier provider binding and pricing.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TierConfig {
    /// Provider label reported in routing results.
    pub provider: String,

    /// Model identifier sent to the endpoint.
    pub model: String,

    /// Completion endpoint. A tier without one is unavailable.
    #[serde(default)]
    pub endpoint: Option<String>,

    /// Default output token cap.
    #[serde(default = "default_tier_max_tokens")]
    pub max_tokens: u32,

    /// USD per million input tokens.
    #[serde(default)]
    pub input_price_per_mtok: f64,

    /// USD per million output tokens.
    #[serde(default)]
    pub output_price_per_mtok: f64,
}

fn default_tier_max_tokens() -> u32 {
    2048
}

/// Model router configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RoutingConfig {
    /// Maximum number of tier moves in one routing call.
    #[serde(default = "default_max_escalations")]
    pub max_escalations: u32,

    /// Retries at the same tier after a transient provider error.
    #[serde(default = "default_same_tier_retries")]
    pub same_tier_retries: u32,

    /// Pause before a same-tier retry.
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    /// Starting tier for task types without an explicit default.
    #[serde(default = "default_tier_name")]
    pub default_tier: String,

    /// Task types never routed to the LOCAL tier.
    #[serde(default = "default_local_denied_tasks")]
    pub local_denied_tasks: Vec<String>,

    /// Task type to starting tier.
    #[serde(default = "default_task_defaults")]
    pub task_defaults: BTreeMap<String, String>,

    /// Tier name to provider binding.
    #[serde(default = "default_tiers")]
    pub tiers: BTreeMap<String, TierConfig>,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            max_escalations: default_max_escalations(),
            same_tier_retries: default_same_tier_retries(),
            retry_backoff_ms: default_retry_backoff_ms(),
            default_tier: default_tier_name(),
            local_denied_tasks: default_local_denied_tasks(),
            task_defaults: default_task_defaults(),
            tiers: default_tiers(),
        }
    }
}

impl RoutingConfig {
    /// Binding for a tier, matching the configured key case-insensitively.
    pub fn tier(&self, tier: Tier) -> Option<&TierConfig> {
        self.tiers
            .iter()
            .find(|(name, _)| Tier::from_str(name).ok() == Some(tier))
            .map(|(_, cfg)| cfg)
    }

    /// Starting tier for a task type.
    pub fn start_tier(&self, task: TaskType) -> Tier {
        self.task_defaults
            .iter()
            .find(|(name, _)| TaskType::from_str(name).ok() == Some(task))
            .and_then(|(_, tier)| Tier::from_str(tier).ok())
            .or_else(|| Tier::from_str(&self.default_tier).ok())
            .unwrap_or(Tier::Mini)
    }

    /// Task types barred from the LOCAL tier.
    pub fn local_denied(&self) -> Vec<TaskType> {
        self.local_denied_tasks
            .iter()
            .filter_map(|name| TaskType::from_str(name).ok())
            .collect()
    }
}

fn default_max_escalations() -> u32 {
    2
}

fn default_same_tier_retries() -> u32 {
    1
}

fn default_retry_backoff_ms() -> u64 {
    250
}

fn default_tier_name() -> String {
    "MINI".to_string()
}

fn default_local_denied_tasks() -> Vec<String> {
    [
        "PHI_REDACTION",
        "STATISTICAL_REASONING",
        "PROTOCOL_DRAFT",
        "MANUSCRIPT_DRAFT",
    ]
    .into_iter()
    .map(str::to_string)
    .collect()
}

fn default_task_defaults() -> BTreeMap<String, String> {
    [
        ("CLASSIFY", "NANO"),
        ("EXTRACT", "NANO"),
        ("SUMMARIZE", "MINI"),
        ("PHI_REDACTION", "MINI"),
        ("LITERATURE_SYNTHESIS", "FRONTIER"),
        ("STATISTICAL_REASONING", "FRONTIER"),
        ("PROTOCOL_DRAFT", "FRONTIER"),
        ("MANUSCRIPT_DRAFT", "FRONTIER"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

fn default_tiers() -> BTreeMap<String, TierConfig> {
    let tier = |provider: &str, model: &str, input: f64, output: f64| TierConfig {
        provider: provider.to_string(),
        model: model.to_string(),
        endpoint: None,
        max_tokens: default_tier_max_tokens(),
        input_price_per_mtok: input,
        output_price_per_mtok: output,
    };
    BTreeMap::from([
        ("LOCAL".to_string(), tier("ollama", "llama3.1:8b", 0.0, 0.0)),
        ("NANO".to_string(), tier("openai", "gpt-4.1-nano", 0.10, 0.40)),
        ("MINI".to_string(), tier("anthropic", "claude-haiku-4-5", 1.0, 5.0)),
        ("FRONTIER".to_string(), tier("anthropic", "claude-sonnet-4-5", 3.0, 15.0)),
        ("MERCURY".to_string(), tier("anthropic", "claude-opus-4-1", 15.0, 75.0)),
    ])
}

/// Stage job queue configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct QueueConfig {
    /// Attempts before a job is marked failed.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// First retry delay; doubles per attempt.
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,

    /// Retry delay cap.
    #[serde(default = "default_backoff_max_ms")]
    pub backoff_max_ms: u64,

    /// How long a claimed job is leased before another worker may reclaim it.
    #[serde(default = "default_lease_secs")]
    pub lease_secs: u64,

    /// Idle claim loop sleep.
    #[serde(default = "default_queue_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Concurrent claim loops per worker process.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Completed jobs retained.
    #[serde(default = "default_keep_completed")]
    pub keep_completed: u32,

    /// Failed jobs retained.
    #[serde(default = "default_keep_failed")]
    pub keep_failed: u32,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            backoff_base_ms: default_backoff_base_ms(),
            backoff_max_ms: default_backoff_max_ms(),
            lease_secs: default_lease_secs(),
            poll_interval_ms: default_queue_poll_interval_ms(),
            concurrency: default_concurrency(),
            keep_completed: default_keep_completed(),
            keep_failed: default_keep_failed(),
        }
    }
}

impl QueueConfig {
    /// Exponential backoff before attempt `attempt + 1`, after `attempt` failures.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(32);
        let delay = self
            .backoff_base_ms
            .saturating_mul(1u64 << exponent)
            .min(self.backoff_max_ms);
        Duration::from_millis(delay)
    }
}

fn default_max_attempts() -> u32 {
    3
}

fn default_backoff_base_ms() -> u64 {
    1_000
}

fn default_backoff_max_ms() -> u64 {
    60_000
}

fn default_lease_secs() -> u64 {
    300
}

fn default_queue_poll_interval_ms() -> u64 {
    500
}

fn default_concurrency() -> usize {
    4
}

fn default_keep_completed() -> u32 {
    1_000
}

fn default_keep_failed() -> u32 {
    5_000
}

/// Event stream relay configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StreamConfig {
    #[serde(default = "default_stream_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Hard wall-clock cap per stream connection.
    #[serde(default = "default_max_duration_secs")]
    pub max_duration_secs: u64,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_stream_poll_interval_ms(),
            max_duration_secs: default_max_duration_secs(),
        }
    }
}

fn default_stream_poll_interval_ms() -> u64 {
    1_000
}

fn default_max_duration_secs() -> u64 {
    600
}

/// Prometheus metrics exporter configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PrometheusConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for PrometheusConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_routes_reference_default_agents() {
        let config = RosalindConfig::default();
        for agent in config.dispatch.agent_routes.values() {
            assert!(config.agent_url(agent).is_some(), "{agent}");
        }
        assert_eq!(
            config.agent_url("agent-stage2-lit"),
            Some("http://agent-stage2-lit:8010")
        );
        assert_eq!(config.stage_route(2).map(|r| r.path.as_str()), Some("/run"));
        assert!(config.stage_route(9).is_none());
    }

    #[test]
    fn typed_routing_accessors() {
        let routing = RoutingConfig::default();
        assert_eq!(routing.start_tier(TaskType::Classify), Tier::Nano);
        assert_eq!(routing.start_tier(TaskType::ManuscriptDraft), Tier::Frontier);
        assert!(routing.local_denied().contains(&TaskType::PhiRedaction));
        assert_eq!(routing.tier(Tier::Mini).map(|t| t.provider.as_str()), Some("anthropic"));
        assert!(routing.tier(Tier::Local).is_some_and(|t| t.endpoint.is_none()));
    }

    #[test]
    fn start_tier_falls_back_to_default_tier() {
        let routing = RoutingConfig {
            task_defaults: BTreeMap::new(),
            default_tier: "FRONTIER".to_string(),
            ..RoutingConfig::default()
        };
        assert_eq!(routing.start_tier(TaskType::Summarize), Tier::Frontier);
    }

    #[test]
    fn queue_backoff_doubles_and_caps() {
        let queue = QueueConfig {
            backoff_base_ms: 100,
            backoff_max_ms: 350,
            ..QueueConfig::default()
        };
        assert_eq!(queue.backoff(1), Duration::from_millis(100));
        assert_eq!(queue.backoff(2), Duration::from_millis(200));
        assert_eq!(queue.backoff(3), Duration::from_millis(350));
        assert_eq!(queue.backoff(60), Duration::from_millis(350));
    }

    #[test]
    fn governance_mode_falls_back_to_demo() {
        let mut governance = GovernanceConfig::default();
        assert_eq!(governance.mode(), GovernanceMode::Demo);
        governance.mode = "live".to_string();
        assert_eq!(governance.mode(), GovernanceMode::Live);
        governance.mode = "staging".to_string();
        assert_eq!(governance.mode(), GovernanceMode::Demo);
    }
}
