// SPDX-FileCopyrightText: 2026 Rosalind Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Tier pricing tables and cost calculation.
//!
//! Prices are configured per tier in USD per million tokens; the local tier
//! is normally free.

use std::collections::BTreeMap;
use std::str::FromStr;

use rosalind_config::model::{RoutingConfig, TierConfig};
use rosalind_core::{Tier, TokenUsage};
use serde::Serialize;

/// Per-tier pricing in USD per million tokens.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct TierPricing {
    /// Cost per million input tokens.
    pub input_per_mtok: f64,
    /// Cost per million output tokens.
    pub output_per_mtok: f64,
}

impl From<&TierConfig> for TierPricing {
    fn from(tier: &TierConfig) -> Self {
        Self {
            input_per_mtok: tier.input_price_per_mtok,
            output_per_mtok: tier.output_price_per_mtok,
        }
    }
}

/// Calculate cost in USD for a given token usage and pricing.
///
/// Formula: (tokens / 1_000_000) * price_per_million for input and output.
pub fn calculate_cost(usage: &TokenUsage, pricing: &TierPricing) -> f64 {
    let input = (f64::from(usage.input_tokens) / 1_000_000.0) * pricing.input_per_mtok;
    let output = (f64::from(usage.output_tokens) / 1_000_000.0) * pricing.output_per_mtok;
    input + output
}

/// Pricing for every configured tier.
#[derive(Debug, Clone, Default)]
pub struct PricingTable {
    tiers: BTreeMap<Tier, TierPricing>,
}

impl PricingTable {
    pub fn from_routing(config: &RoutingConfig) -> Self {
        let tiers = config
            .tiers
            .iter()
            .filter_map(|(name, tier)| {
                Tier::from_str(name)
                    .ok()
                    .map(|parsed| (parsed, TierPricing::from(tier)))
            })
            .collect();
        Self { tiers }
    }

    /// Pricing for `tier`; unconfigured tiers cost nothing.
    pub fn pricing(&self, tier: Tier) -> TierPricing {
        self.tiers.get(&tier).copied().unwrap_or_default()
    }

    pub fn cost(&self, tier: Tier, usage: &TokenUsage) -> f64 {
        calculate_cost(usage, &self.pricing(tier))
    }
}
