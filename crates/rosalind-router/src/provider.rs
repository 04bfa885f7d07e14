// SPDX-FileCopyrightText: 2026 Rosalind Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Provider adapters bound to router tiers.
//!
//! [`EndpointProvider`] reaches a completion endpoint through the shared
//! [`AgentClient`], so model calls get the same SSRF validation and per-target
//! circuit breaking as agent calls.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use rosalind_agent_client::{AgentClient, AgentResponse};
use rosalind_config::model::RoutingConfig;
use rosalind_core::traits::adapter::PluginAdapter;
use rosalind_core::traits::provider::ProviderAdapter;
use rosalind_core::{
    AdapterType, HealthStatus, ProviderRequest, ProviderResponse, RosalindError, Tier, TokenUsage,
};
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

/// Error text the agent client uses for short-circuited calls.
const CIRCUIT_OPEN_MESSAGE: &str = "circuit open";

#[derive(Debug, Deserialize)]
struct CompletionBody {
    content: String,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    usage: CompletionUsage,
}

#[derive(Debug, Default, Deserialize)]
struct CompletionUsage {
    #[serde(default)]
    input_tokens: u32,
    #[serde(default)]
    output_tokens: u32,
}

/// A tier's completion endpoint, called with a neutral JSON body.
pub struct EndpointProvider {
    name: String,
    endpoint: String,
    client: Arc<AgentClient>,
}

impl EndpointProvider {
    pub fn new(name: impl Into<String>, endpoint: impl Into<String>, client: Arc<AgentClient>) -> Self {
        Self {
            name: name.into(),
            endpoint: endpoint.into(),
            client,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl std::fmt::Debug for EndpointProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EndpointProvider")
            .field("name", &self.name)
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

/// Translate a failed agent response into the router's error taxonomy.
fn response_error(response: &AgentResponse, target: &str) -> RosalindError {
    let message = response
        .error
        .clone()
        .unwrap_or_else(|| format!("HTTP {}", response.status_code));
    if response.status_code == 503 && message == CIRCUIT_OPEN_MESSAGE {
        return RosalindError::CircuitOpen {
            target: target.to_string(),
        };
    }
    match response.status_code {
        400 if message.starts_with("SSRF blocked") => RosalindError::Security(message),
        _ if response.is_transient() => RosalindError::Transient { message },
        status => RosalindError::Provider {
            message: format!("endpoint returned {status}: {message}"),
            source: None,
        },
    }
}

#[async_trait]
impl PluginAdapter for EndpointProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Provider
    }

    async fn health_check(&self) -> Result<HealthStatus, RosalindError> {
        // Probing would spend tokens; report the breaker view instead.
        let open = rosalind_agent_client::target_key(&self.endpoint)
            .map(|target| {
                self.client.breaker_state(&target) == rosalind_resilience::CircuitState::Open
            })
            .unwrap_or(false);
        if open {
            Ok(HealthStatus::Degraded("circuit open".to_string()))
        } else {
            Ok(HealthStatus::Healthy)
        }
    }

    async fn shutdown(&self) -> Result<(), RosalindError> {
        debug!(provider = %self.name, "endpoint provider shutting down");
        Ok(())
    }
}

#[async_trait]
impl ProviderAdapter for EndpointProvider {
    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, RosalindError> {
        let body = json!({
            "model": request.model,
            "prompt": request.prompt,
            "system_prompt": request.system_prompt,
            "max_tokens": request.max_tokens,
        });
        let response = self.client.post_sync(&self.endpoint, "", &body, None).await;
        if !response.success {
            let target = rosalind_agent_client::target_key(&self.endpoint).unwrap_or_default();
            return Err(response_error(&response, &target));
        }

        let data = response.data.unwrap_or_default();
        let parsed: CompletionBody =
            serde_json::from_value(data).map_err(|e| RosalindError::Provider {
                message: "endpoint returned an unreadable completion".to_string(),
                source: Some(Box::new(e)),
            })?;

        Ok(ProviderResponse {
            content: parsed.content,
            model: parsed.model.unwrap_or(request.model),
            usage: TokenUsage {
                input_tokens: parsed.usage.input_tokens,
                output_tokens: parsed.usage.output_tokens,
            },
        })
    }
}

/// A provider bound to one tier, with the tier's model and token budget.
#[derive(Clone)]
pub struct TierProvider {
    pub provider: String,
    pub model: String,
    pub max_tokens: u32,
    pub adapter: Arc<dyn ProviderAdapter>,
}

impl std::fmt::Debug for TierProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TierProvider")
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("max_tokens", &self.max_tokens)
            .finish_non_exhaustive()
    }
}

/// Which tiers can be called, and through which adapter.
#[derive(Debug, Clone, Default)]
pub struct ProviderRegistry {
    tiers: BTreeMap<Tier, TierProvider>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind every configured tier that has an endpoint to an [`EndpointProvider`].
    pub fn from_config(config: &RoutingConfig, client: Arc<AgentClient>) -> Self {
        let mut registry = Self::new();
        for tier in Tier::ALL {
            let Some(cfg) = config.tier(tier) else {
                continue;
            };
            let Some(endpoint) = cfg.endpoint.as_deref() else {
                debug!(tier = %tier, "tier has no endpoint, unavailable");
                continue;
            };
            let adapter = EndpointProvider::new(cfg.provider.clone(), endpoint, Arc::clone(&client));
            registry.insert(
                tier,
                TierProvider {
                    provider: cfg.provider.clone(),
                    model: cfg.model.clone(),
                    max_tokens: cfg.max_tokens,
                    adapter: Arc::new(adapter),
                },
            );
        }
        registry
    }

    pub fn insert(&mut self, tier: Tier, provider: TierProvider) {
        self.tiers.insert(tier, provider);
    }

    pub fn with(mut self, tier: Tier, provider: TierProvider) -> Self {
        self.insert(tier, provider);
        self
    }

    pub fn get(&self, tier: Tier) -> Option<&TierProvider> {
        self.tiers.get(&tier)
    }

    pub fn is_available(&self, tier: Tier) -> bool {
        self.tiers.contains_key(&tier)
    }

    /// Available tiers in escalation order.
    pub fn tiers(&self) -> Vec<Tier> {
        self.tiers.keys().copied().collect()
    }
}
