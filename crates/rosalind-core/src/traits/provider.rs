// SPDX-FileCopyrightText: 2026 Rosalind Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Provider adapter trait for model tier integrations.

use async_trait::async_trait;

use crate::error::RosalindError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{ProviderRequest, ProviderResponse};

/// Adapter for a single execution tier's model provider.
///
/// Implementations report timeouts and 5xx responses as
/// [`RosalindError::Transient`] so the router can retry at the same tier
/// before escalating.
#[async_trait]
pub trait ProviderAdapter: PluginAdapter {
    /// Sends a completion request and returns the full response.
    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, RosalindError>;
}
