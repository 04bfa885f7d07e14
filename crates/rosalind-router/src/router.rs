// SPDX-FileCopyrightText: 2026 Rosalind Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Model routing with quality-gated escalation.
//!
//! Orchestrates one routing call: safe start tier > provider call (with
//! same-tier retry on transient errors) > quality gate > escalate or return.
//! Tiers are tried strictly one after another, lowest first.

use std::sync::Arc;
use std::time::{Duration, Instant};

use rosalind_config::model::RoutingConfig;
use rosalind_core::traits::adapter::PluginAdapter;
use rosalind_core::traits::observability::ObservabilityAdapter;
use rosalind_core::{
    AttemptOutcome, ProviderRequest, RosalindError, RoutingInfo, RoutingRequest, RoutingResult,
    Tier, UsageInfo, UsageTrace,
};
use rosalind_cost::PricingTable;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::policy::TierPolicy;
use crate::provider::{ProviderRegistry, TierProvider};
use crate::quality::QualityGate;

/// Raised only when no result can be built at all.
#[derive(Debug, Error)]
pub enum RoutingError {
    /// A forced tier has no provider bound to it.
    #[error("tier {tier} is not available")]
    TierUnavailable { tier: Tier },

    /// No provider is bound at or above the start tier, or a forced tier's
    /// provider failed. Unforced provider failures end in `AllTiersExhausted`.
    #[error("provider unavailable at tier {tier}: {message}")]
    ProviderUnavailable { tier: Tier, message: String },

    /// Every tier on the escalation path failed with a provider error.
    #[error("all tiers exhausted ({}): {last_error}", tier_list(.tiers_tried))]
    AllTiersExhausted {
        tiers_tried: Vec<Tier>,
        last_error: String,
    },
}

fn tier_list(tiers: &[Tier]) -> String {
    tiers
        .iter()
        .map(|t| t.to_string())
        .collect::<Vec<_>>()
        .join(" -> ")
}

/// Escalation and retry bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouterSettings {
    /// Maximum tier moves in one routing call.
    pub max_escalations: u32,
    /// Extra attempts at the same tier after a transient provider error.
    pub same_tier_retries: u32,
    /// Pause before the n-th same-tier retry is `n * retry_backoff`.
    pub retry_backoff: Duration,
}

impl RouterSettings {
    pub fn from_config(config: &RoutingConfig) -> Self {
        Self {
            max_escalations: config.max_escalations,
            same_tier_retries: config.same_tier_retries,
            retry_backoff: Duration::from_millis(config.retry_backoff_ms),
        }
    }
}

impl Default for RouterSettings {
    fn default() -> Self {
        Self::from_config(&RoutingConfig::default())
    }
}

/// Routes tasks through the tier ladder.
pub struct ModelRouter {
    policy: TierPolicy,
    providers: ProviderRegistry,
    gate: QualityGate,
    pricing: PricingTable,
    settings: RouterSettings,
    sinks: Vec<Arc<dyn ObservabilityAdapter>>,
}

impl std::fmt::Debug for ModelRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelRouter")
            .field("providers", &self.providers.tiers())
            .field("settings", &self.settings)
            .field("sinks", &self.sinks.len())
            .finish_non_exhaustive()
    }
}

impl ModelRouter {
    /// Create a router whose policy, bounds, and pricing all come from `config`.
    pub fn from_config(config: &RoutingConfig, providers: ProviderRegistry) -> Self {
        Self {
            policy: TierPolicy::new(config.clone()),
            providers,
            gate: QualityGate::new(),
            pricing: PricingTable::from_routing(config),
            settings: RouterSettings::from_config(config),
            sinks: Vec::new(),
        }
    }

    pub fn with_settings(mut self, settings: RouterSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Add a sink that receives one usage trace per attempt.
    pub fn with_sink(mut self, sink: Arc<dyn ObservabilityAdapter>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn policy(&self) -> &TierPolicy {
        &self.policy
    }

    pub fn providers(&self) -> &ProviderRegistry {
        &self.providers
    }

    pub fn settings(&self) -> RouterSettings {
        self.settings
    }

    /// Route a request.
    ///
    /// A forced tier is used exclusively. Otherwise the task's start tier is
    /// tried first and each quality or provider failure moves one available
    /// tier up, at most `max_escalations` times. When the chain ends without
    /// a passing answer, the last answer that was produced is returned with
    /// `quality_gate.passed == false`; an error is raised only when no tier
    /// produced any answer.
    pub async fn route(&self, request: &RoutingRequest) -> Result<RoutingResult, RoutingError> {
        let started = Instant::now();
        let task = request.task_type;
        let forced = request.force_tier.is_some();
        let first = self.policy.initial_tier(task, request.force_tier);

        let mut tier = if forced {
            if !self.providers.is_available(first) {
                return Err(RoutingError::TierUnavailable { tier: first });
            }
            first
        } else {
            self.available_from(first)
                .ok_or_else(|| RoutingError::ProviderUnavailable {
                    tier: first,
                    message: "no provider configured at or above this tier".to_string(),
                })?
        };

        let mut tiers_tried = Vec::new();
        let mut escalations = 0;
        let mut attempt = 0;
        let mut last_answer: Option<RoutingResult> = None;
        let mut last_error = String::new();

        loop {
            tiers_tried.push(tier);
            match self.run_tier(request, tier, &mut attempt).await {
                Ok(mut result) if result.quality_gate.passed => {
                    result.tiers_tried = tiers_tried;
                    result.routing.latency_ms = elapsed_ms(started);
                    info!(
                        task_type = %task,
                        tier = %tier,
                        attempts = attempt,
                        latency_ms = result.routing.latency_ms,
                        "routing complete"
                    );
                    return Ok(result);
                }
                Ok(result) => {
                    debug!(
                        tier = %tier,
                        score = result.quality_gate.score,
                        "quality gate failed"
                    );
                    last_answer = Some(result);
                }
                Err(e) => {
                    last_error = e.to_string();
                }
            }

            if forced || escalations >= self.settings.max_escalations {
                break;
            }
            let Some(next) = tier.next().and_then(|t| self.available_from(t)) else {
                break;
            };
            escalations += 1;
            info!(task_type = %task, from = %tier, to = %next, "escalating");
            tier = next;
        }

        if let Some(mut result) = last_answer {
            warn!(
                task_type = %task,
                tiers = %tier_list(&tiers_tried),
                "no tier passed the quality gate"
            );
            result.tiers_tried = tiers_tried;
            result.routing.latency_ms = elapsed_ms(started);
            return Ok(result);
        }

        if forced {
            Err(RoutingError::ProviderUnavailable {
                tier,
                message: last_error,
            })
        } else {
            Err(RoutingError::AllTiersExhausted {
                tiers_tried,
                last_error,
            })
        }
    }

    /// The lowest available tier at or above `from`.
    fn available_from(&self, from: Tier) -> Option<Tier> {
        Tier::ALL
            .into_iter()
            .filter(|t| *t >= from)
            .find(|t| self.providers.is_available(*t))
    }

    /// Call one tier, retrying transient errors in place.
    async fn run_tier(
        &self,
        request: &RoutingRequest,
        tier: Tier,
        attempt: &mut u32,
    ) -> Result<RoutingResult, RosalindError> {
        let Some(provider) = self.providers.get(tier) else {
            return Err(RosalindError::Internal(format!("tier {tier} has no provider")));
        };

        let mut retry = 0;
        loop {
            *attempt += 1;
            match self.call_once(request, tier, provider, *attempt).await {
                Ok(result) => return Ok(result),
                Err(e) if e.is_retryable() && retry < self.settings.same_tier_retries => {
                    retry += 1;
                    warn!(tier = %tier, retry, error = %e, "transient provider error, retrying");
                    tokio::time::sleep(self.settings.retry_backoff * retry).await;
                }
                Err(e) => {
                    warn!(tier = %tier, error = %e, "provider failed");
                    return Err(e);
                }
            }
        }
    }

    async fn call_once(
        &self,
        request: &RoutingRequest,
        tier: Tier,
        provider: &TierProvider,
        attempt: u32,
    ) -> Result<RoutingResult, RosalindError> {
        let started = Instant::now();
        let provider_request = ProviderRequest {
            model: provider.model.clone(),
            prompt: request.prompt.clone(),
            system_prompt: request.system_prompt.clone(),
            max_tokens: request.max_tokens.unwrap_or(provider.max_tokens),
        };

        let mut trace = UsageTrace {
            id: uuid::Uuid::new_v4().to_string(),
            task_type: request.task_type,
            tier,
            provider: provider.provider.clone(),
            model: provider.model.clone(),
            attempt,
            input_tokens: 0,
            output_tokens: 0,
            cost_usd: 0.0,
            latency_ms: 0,
            outcome: AttemptOutcome::ProviderError,
        };

        let response = match provider.adapter.complete(provider_request).await {
            Ok(response) => response,
            Err(e) => {
                trace.latency_ms = elapsed_ms(started);
                self.emit(trace);
                return Err(e);
            }
        };

        let quality = self.gate.evaluate(request.task_type, &response.content);
        let cost = self.pricing.cost(tier, &response.usage);
        trace.model = response.model.clone();
        trace.input_tokens = response.usage.input_tokens;
        trace.output_tokens = response.usage.output_tokens;
        trace.cost_usd = cost;
        trace.latency_ms = elapsed_ms(started);
        trace.outcome = if quality.passed {
            AttemptOutcome::Passed
        } else {
            AttemptOutcome::QualityFailed
        };
        self.emit(trace);

        Ok(RoutingResult {
            content: response.content,
            routing: RoutingInfo {
                provider: provider.provider.clone(),
                model: response.model,
                tier,
                task_type: request.task_type,
                latency_ms: elapsed_ms(started),
            },
            usage: UsageInfo {
                input_tokens: response.usage.input_tokens,
                output_tokens: response.usage.output_tokens,
                total_tokens: response
                    .usage
                    .input_tokens
                    .saturating_add(response.usage.output_tokens),
                estimated_cost_usd: cost,
            },
            quality_gate: quality,
            tiers_tried: Vec::new(),
        })
    }

    /// Hand a trace to metrics and every sink without waiting on them.
    fn emit(&self, trace: UsageTrace) {
        let tier = trace.tier.to_string();
        // Token counters come from the Prometheus sink.
        rosalind_prometheus::record_route_attempt(&tier, &trace.outcome.to_string());

        for sink in &self.sinks {
            let sink = Arc::clone(sink);
            let trace = trace.clone();
            tokio::spawn(async move {
                if let Err(e) = sink.record(trace).await {
                    warn!(sink = sink.name(), error = %e, "usage trace dropped");
                }
            });
        }
    }
}

fn elapsed_ms(since: Instant) -> u64 {
    u64::try_from(since.elapsed().as_millis()).unwrap_or(u64::MAX)
}
