// SPDX-FileCopyrightText: 2026 Rosalind Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP gateway for the Rosalind dispatch backend.
//!
//! The API process only admits, resolves, routes, enqueues and observes.
//! Stage work is executed by the separate worker process consuming the same
//! durable store, so handlers never run a stage inline.

pub mod error;
pub mod handlers;
pub mod server;
pub mod sse;

pub use error::ApiError;
pub use server::{GatewayState, HealthState, ServerConfig, build_router, start_server};
