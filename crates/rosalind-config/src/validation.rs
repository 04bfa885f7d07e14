// SPDX-FileCopyrightText: 2026 Rosalind Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates constraints serde cannot express: agent URLs pass the SSRF
//! policy, every routing table entry references something registered, enum
//! names parse, and numeric bounds hold. All errors are collected.

use std::str::FromStr;

use rosalind_core::{GovernanceMode, TaskType, Tier};
use rosalind_security::SsrfPolicy;

use crate::diagnostic::ConfigError;
use crate::model::RosalindConfig;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Validate a deserialized configuration for semantic correctness.
///
/// Returns `Ok(())` if all validations pass, or `Err(Vec<ConfigError>)` with
/// all collected validation errors (does not fail fast).
pub fn validate_config(config: &RosalindConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    validate_server(config, &mut errors);
    validate_governance(config, &mut errors);
    validate_agents(config, &mut errors);
    validate_client(config, &mut errors);
    validate_routing(config, &mut errors);
    validate_queue_and_stream(config, &mut errors);

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_server(config: &RosalindConfig, errors: &mut Vec<ConfigError>) {
    if config.server.host.trim().is_empty() {
        errors.push(ConfigError::validation("server.host must not be empty"));
    }
    if !LOG_LEVELS.contains(&config.server.log_level.as_str()) {
        errors.push(ConfigError::validation(format!(
            "server.log_level `{}` must be one of {}",
            config.server.log_level,
            LOG_LEVELS.join(", ")
        )));
    }
    if config.storage.database_path.trim().is_empty() {
        errors.push(ConfigError::validation(
            "storage.database_path must not be empty",
        ));
    }
}

fn validate_governance(config: &RosalindConfig, errors: &mut Vec<ConfigError>) {
    if GovernanceMode::from_str(&config.governance.mode).is_err() {
        errors.push(ConfigError::validation(format!(
            "governance.mode `{}` must be DEMO or LIVE",
            config.governance.mode
        )));
    }
    let threshold = config.governance.live_block_threshold;
    if !(0.0..=1.0).contains(&threshold) {
        errors.push(ConfigError::validation(format!(
            "governance.live_block_threshold must be within [0, 1], got {threshold}"
        )));
    }
}

fn validate_agents(config: &RosalindConfig, errors: &mut Vec<ConfigError>) {
    let policy = SsrfPolicy::new(&config.security.allowed_private_ips, &[]);
    let agent_names = || config.agents.keys().map(String::as_str);

    for (name, url) in &config.agents {
        if name.trim().is_empty() {
            errors.push(ConfigError::validation("agent names must not be empty"));
        }
        if let Err(e) = policy.validate(url) {
            errors.push(ConfigError::validation(format!("agents.{name}: {e}")));
        }
    }

    for (task_type, agent) in &config.dispatch.agent_routes {
        if task_type.trim().is_empty() {
            errors.push(ConfigError::validation(
                "dispatch.agent_routes keys must not be empty",
            ));
        }
        if !config.agents.contains_key(agent) {
            errors.push(ConfigError::unknown_reference(
                format!("dispatch route `{task_type}`"),
                "agent",
                agent,
                agent_names(),
            ));
        }
    }

    for (stage, route) in &config.stages {
        match stage.parse::<u32>() {
            Ok(n) if n >= 1 => {}
            _ => errors.push(ConfigError::validation(format!(
                "stages key `{stage}` must be a positive stage number"
            ))),
        }
        if !config.agents.contains_key(&route.agent) {
            errors.push(ConfigError::unknown_reference(
                format!("stage {stage}"),
                "agent",
                &route.agent,
                agent_names(),
            ));
        }
        if !route.path.starts_with('/') {
            errors.push(ConfigError::validation(format!(
                "stages.{stage}.path `{}` must start with `/`",
                route.path
            )));
        }
    }
}

fn validate_client(config: &RosalindConfig, errors: &mut Vec<ConfigError>) {
    let client = &config.client;
    if client.timeout_ms == 0 {
        errors.push(ConfigError::validation("client.timeout_ms must be positive"));
    }
    if client.breaker_threshold < 1 {
        errors.push(ConfigError::validation(
            "client.breaker_threshold must be at least 1",
        ));
    }
    if client.breaker_reset_timeout_ms == 0 {
        errors.push(ConfigError::validation(
            "client.breaker_reset_timeout_ms must be positive",
        ));
    }
    if client.half_open_max_trials < 1 {
        errors.push(ConfigError::validation(
            "client.half_open_max_trials must be at least 1",
        ));
    }
    if client.half_open_success_threshold < 1 {
        errors.push(ConfigError::validation(
            "client.half_open_success_threshold must be at least 1",
        ));
    }
}

fn validate_routing(config: &RosalindConfig, errors: &mut Vec<ConfigError>) {
    let routing = &config.routing;
    let policy = SsrfPolicy::new(&config.security.allowed_private_ips, &[]);
    let tier_names: Vec<String> = Tier::ALL.iter().map(|t| t.to_string()).collect();
    let configured = |tier: Tier| routing.tier(tier).is_some();

    for (name, tier) in &routing.tiers {
        if Tier::from_str(name).is_err() {
            errors.push(ConfigError::unknown_reference(
                "routing.tiers",
                "tier",
                name,
                tier_names.iter().map(String::as_str),
            ));
        }
        if tier.max_tokens == 0 {
            errors.push(ConfigError::validation(format!(
                "routing.tiers.{name}.max_tokens must be positive"
            )));
        }
        if tier.input_price_per_mtok < 0.0 || tier.output_price_per_mtok < 0.0 {
            errors.push(ConfigError::validation(format!(
                "routing.tiers.{name} prices must be non-negative"
            )));
        }
        if let Some(endpoint) = &tier.endpoint {
            if let Err(e) = policy.validate(endpoint) {
                errors.push(ConfigError::validation(format!(
                    "routing.tiers.{name}.endpoint: {e}"
                )));
            }
        }
    }

    match Tier::from_str(&routing.default_tier) {
        Ok(tier) if configured(tier) => {}
        Ok(_) => errors.push(ConfigError::validation(format!(
            "routing.default_tier `{}` has no [routing.tiers] entry",
            routing.default_tier
        ))),
        Err(_) => errors.push(ConfigError::unknown_reference(
            "routing.default_tier",
            "tier",
            &routing.default_tier,
            tier_names.iter().map(String::as_str),
        )),
    }

    let task_names: Vec<String> = [
        TaskType::Classify,
        TaskType::Extract,
        TaskType::Summarize,
        TaskType::PhiRedaction,
        TaskType::LiteratureSynthesis,
        TaskType::StatisticalReasoning,
        TaskType::ProtocolDraft,
        TaskType::ManuscriptDraft,
    ]
    .iter()
    .map(|t| t.to_string())
    .collect();

    for (task, tier) in &routing.task_defaults {
        if TaskType::from_str(task).is_err() {
            errors.push(ConfigError::unknown_reference(
                "routing.task_defaults",
                "task type",
                task,
                task_names.iter().map(String::as_str),
            ));
        }
        match Tier::from_str(tier) {
            Ok(t) if configured(t) => {}
            Ok(_) => errors.push(ConfigError::validation(format!(
                "routing.task_defaults.{task} names tier `{tier}` which has no [routing.tiers] entry"
            ))),
            Err(_) => errors.push(ConfigError::unknown_reference(
                format!("routing.task_defaults.{task}"),
                "tier",
                tier,
                tier_names.iter().map(String::as_str),
            )),
        }
    }

    for task in &routing.local_denied_tasks {
        if TaskType::from_str(task).is_err() {
            errors.push(ConfigError::unknown_reference(
                "routing.local_denied_tasks",
                "task type",
                task,
                task_names.iter().map(String::as_str),
            ));
        }
    }
}

fn validate_queue_and_stream(config: &RosalindConfig, errors: &mut Vec<ConfigError>) {
    let queue = &config.queue;
    if queue.max_attempts < 1 {
        errors.push(ConfigError::validation("queue.max_attempts must be at least 1"));
    }
    if queue.backoff_base_ms == 0 {
        errors.push(ConfigError::validation("queue.backoff_base_ms must be positive"));
    }
    if queue.backoff_max_ms < queue.backoff_base_ms {
        errors.push(ConfigError::validation(
            "queue.backoff_max_ms must be at least queue.backoff_base_ms",
        ));
    }
    if queue.lease_secs == 0 {
        errors.push(ConfigError::validation("queue.lease_secs must be positive"));
    }
    if queue.poll_interval_ms == 0 {
        errors.push(ConfigError::validation("queue.poll_interval_ms must be positive"));
    }
    if queue.concurrency < 1 {
        errors.push(ConfigError::validation("queue.concurrency must be at least 1"));
    }
    if config.stream.poll_interval_ms == 0 {
        errors.push(ConfigError::validation("stream.poll_interval_ms must be positive"));
    }
    if config.stream.max_duration_secs == 0 {
        errors.push(ConfigError::validation("stream.max_duration_secs must be positive"));
    }
}
