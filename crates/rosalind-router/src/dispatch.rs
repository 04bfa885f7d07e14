// SPDX-FileCopyrightText: 2026 Rosalind Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Inbound dispatch table.
//!
//! Built once at boot from configuration and never mutated. Agent task types
//! resolve to a registered agent base URL; router task types resolve to the
//! tier they would start on.

use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use rosalind_config::model::RosalindConfig;
use rosalind_core::{TaskType, Tier};
use serde::Serialize;
use thiserror::Error;

use crate::policy::TierPolicy;

/// Shape of an agent-executed task type, e.g. `STAGE_2_LITERATURE_REVIEW`.
static AGENT_TASK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^STAGE_\d+_[A-Z][A-Z0-9_]*$").expect("agent task pattern must compile")
});

/// Where a dispatched task goes.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "dispatch_type", rename_all = "lowercase")]
pub enum DispatchTarget {
    Agent {
        agent_name: String,
        agent_url: String,
    },
    Model {
        tier: Tier,
        provider: String,
        model: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    #[error("{0}")]
    Validation(String),

    #[error("unsupported task type: {0}")]
    UnsupportedTaskType(String),

    #[error("no agent configured for task type {0}")]
    AgentNotConfigured(String),

    #[error("no model tier configured for task type {0}")]
    TierNotConfigured(String),
}

#[derive(Debug, Clone, PartialEq)]
struct AgentRoute {
    agent_name: String,
    agent_url: Option<String>,
}

/// Task type to target lookup.
#[derive(Debug, Clone)]
pub struct DispatchTable {
    agents: BTreeMap<String, AgentRoute>,
    policy: TierPolicy,
}

impl DispatchTable {
    pub fn from_config(config: &RosalindConfig) -> Self {
        let agents = config
            .dispatch
            .agent_routes
            .iter()
            .map(|(task, agent)| {
                (
                    task.to_ascii_uppercase(),
                    AgentRoute {
                        agent_name: agent.clone(),
                        agent_url: config.agent_url(agent).map(str::to_string),
                    },
                )
            })
            .collect();
        Self {
            agents,
            policy: TierPolicy::new(config.routing.clone()),
        }
    }

    /// Whether `task_type` names an agent-executed task, mapped or not.
    pub fn is_agent_task(task_type: &str) -> bool {
        AGENT_TASK.is_match(task_type)
    }

    pub fn resolve(&self, task_type: &str) -> Result<DispatchTarget, DispatchError> {
        let task_type = task_type.trim();
        if task_type.is_empty() {
            return Err(DispatchError::Validation("task_type is required".to_string()));
        }

        if let Some(route) = self.agents.get(task_type) {
            return match &route.agent_url {
                Some(url) => Ok(DispatchTarget::Agent {
                    agent_name: route.agent_name.clone(),
                    agent_url: url.clone(),
                }),
                None => Err(DispatchError::AgentNotConfigured(task_type.to_string())),
            };
        }
        if Self::is_agent_task(task_type) {
            return Err(DispatchError::AgentNotConfigured(task_type.to_string()));
        }

        let task = TaskType::from_str(task_type)
            .map_err(|_| DispatchError::UnsupportedTaskType(task_type.to_string()))?;
        self.model_target(task)
            .ok_or_else(|| DispatchError::TierNotConfigured(task_type.to_string()))
    }

    /// The lowest configured tier at or above the task's safe start tier.
    fn model_target(&self, task: TaskType) -> Option<DispatchTarget> {
        let start = self.policy.start_tier(task);
        let routing = self.policy.config();
        Tier::ALL
            .into_iter()
            .filter(|t| *t >= start)
            .find_map(|tier| {
                routing.tier(tier).map(|cfg| DispatchTarget::Model {
                    tier,
                    provider: cfg.provider.clone(),
                    model: cfg.model.clone(),
                })
            })
    }

    /// Agent task types with a route, sorted.
    pub fn agent_task_types(&self) -> Vec<&str> {
        self.agents.keys().map(String::as_str).collect()
    }
}
