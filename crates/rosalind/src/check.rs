// SPDX-FileCopyrightText: 2026 Rosalind Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `rosalind check-config` output.

use rosalind_config::RosalindConfig;
use rosalind_core::Tier;

/// Human-readable summary of a validated configuration.
pub fn summary(config: &RosalindConfig) -> Vec<String> {
    let mut lines = vec![
        "configuration ok".to_string(),
        format!("governance mode: {}", config.governance.mode()),
        format!("database: {}", config.storage.database_path),
    ];

    lines.push("agents:".to_string());
    for (name, url) in &config.agents {
        lines.push(format!("  {name} -> {url}"));
    }

    lines.push("dispatch routes:".to_string());
    for (task, agent) in &config.dispatch.agent_routes {
        lines.push(format!("  {task} -> {agent}"));
    }

    lines.push("stages:".to_string());
    for (stage, route) in &config.stages {
        lines.push(format!("  {stage} -> {}{}", route.agent, route.path));
    }

    lines.push("model tiers:".to_string());
    for tier in Tier::ALL {
        let line = match config.routing.tier(tier) {
            Some(binding) => format!(
                "  {tier}: {}/{} {}",
                binding.provider,
                binding.model,
                binding.endpoint.as_deref().unwrap_or("(no endpoint)")
            ),
            None => format!("  {tier}: (not configured)"),
        };
        lines.push(line);
    }

    lines
}
