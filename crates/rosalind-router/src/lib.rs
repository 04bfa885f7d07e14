// SPDX-FileCopyrightText: 2026 Rosalind Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Tier selection, quality-gated escalation, and inbound dispatch.
//!
//! This crate provides:
//! - [`TierPolicy`]: start tier per task type and the LOCAL deny-list
//! - [`QualityGate`]: deterministic, task-typed checks on model output
//! - [`ModelRouter`]: sequential escalation through the tier ladder
//! - [`EndpointProvider`]: a provider adapter that calls a configured HTTP
//!   endpoint through the agent client
//! - [`DispatchTable`]: the boot-validated task type to target lookup

pub mod dispatch;
pub mod policy;
pub mod provider;
pub mod quality;
pub mod router;

pub use dispatch::{DispatchError, DispatchTable, DispatchTarget};
pub use policy::TierPolicy;
pub use provider::{EndpointProvider, ProviderRegistry, TierProvider};
pub use quality::QualityGate;
pub use router::{ModelRouter, RouterSettings, RoutingError};
