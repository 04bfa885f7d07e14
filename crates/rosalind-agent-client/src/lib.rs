// SPDX-FileCopyrightText: 2026 Rosalind Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Outbound HTTP client for agent services and model endpoints.
//!
//! [`AgentClient::post_sync`] never fails: SSRF rejections, open circuits,
//! timeouts, transport errors and non-2xx statuses all come back as an
//! [`AgentResponse`] with a status code the caller can act on. Request and
//! response bodies never reach a log sink; the audit trail carries path,
//! status, and latency only.

pub mod audit;
pub mod client;
pub mod factory;

pub use audit::{AuditEntry, AuditSink, TracingAuditSink};
pub use client::{
    AgentClient, AgentResponse, ClientOptions, DEFAULT_TIMEOUT, RequestOptions, is_transient_status,
    target_key,
};
pub use factory::ClientFactory;
