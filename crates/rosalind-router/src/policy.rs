// SPDX-FileCopyrightText: 2026 Rosalind Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Tier selection policy.
//!
//! Decides where a task starts on the ladder. The LOCAL deny-list is applied
//! here, before any tier is chosen, so it also overrides a forced LOCAL.

use std::collections::BTreeSet;

use rosalind_config::model::RoutingConfig;
use rosalind_core::{TaskType, Tier};
use tracing::debug;

#[derive(Debug, Clone)]
pub struct TierPolicy {
    config: RoutingConfig,
    local_denied: BTreeSet<TaskType>,
}

impl TierPolicy {
    pub fn new(config: RoutingConfig) -> Self {
        let local_denied = config.local_denied().into_iter().collect();
        Self {
            config,
            local_denied,
        }
    }

    /// Whether `task` may run on the LOCAL tier.
    pub fn local_allowed(&self, task: TaskType) -> bool {
        !self.local_denied.contains(&task)
    }

    /// Replace a LOCAL choice with the next tier when the task is denied.
    pub fn safe_tier(&self, task: TaskType, tier: Tier) -> Tier {
        if tier == Tier::Local && !self.local_allowed(task) {
            let bumped = Tier::Local.next().unwrap_or(Tier::Nano);
            debug!(task_type = %task, tier = %bumped, "task denied on LOCAL tier");
            bumped
        } else {
            tier
        }
    }

    /// Starting tier for an unforced request.
    pub fn start_tier(&self, task: TaskType) -> Tier {
        self.safe_tier(task, self.config.start_tier(task))
    }

    /// The tier a request runs on first: the safe forced tier, or the task's start tier.
    pub fn initial_tier(&self, task: TaskType, force: Option<Tier>) -> Tier {
        match force {
            Some(tier) => self.safe_tier(task, tier),
            None => self.start_tier(task),
        }
    }

    pub fn config(&self) -> &RoutingConfig {
        &self.config
    }
}
