// SPDX-FileCopyrightText: 2026 Rosalind Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Audit trail for outbound calls.

use tracing::info;

/// The only facts about an outbound call that may be logged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditEntry {
    pub path: String,
    pub status_code: u16,
    pub latency_ms: u64,
}

/// Receives one entry per outbound call.
pub trait AuditSink: Send + Sync + 'static {
    fn record(&self, entry: &AuditEntry);
}

/// Default sink: one structured `tracing` event per call.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&self, entry: &AuditEntry) {
        info!(
            path = %entry.path,
            status_code = entry.status_code,
            latency_ms = entry.latency_ms,
            "agent call"
        );
    }
}
