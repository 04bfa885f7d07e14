// SPDX-FileCopyrightText: 2026 Rosalind Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Failure isolation for outbound calls.
//!
//! [`CircuitBreaker`] is the per-target state machine; [`BreakerRegistry`]
//! keys breakers by target authority and funnels every mutation for a key
//! through that key's lock, so concurrent calls to one target observe a
//! consistent state while unrelated targets never contend.

pub mod circuit_breaker;
pub mod registry;

pub use circuit_breaker::{BreakerConfig, BreakerSnapshot, CallKind, CircuitBreaker, CircuitState};
pub use registry::{BreakerPermit, BreakerRegistry, CircuitOpen};
