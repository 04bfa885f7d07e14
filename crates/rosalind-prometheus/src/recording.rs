// SPDX-FileCopyrightText: 2026 Rosalind Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Metric registration and recording helpers.
//!
//! Uses the metrics-rs facade so any recorder (Prometheus, statsd, etc.)
//! can collect these metrics. Without an installed recorder every call is a
//! no-op, which is what unit tests rely on.

use metrics::{describe_counter, describe_histogram};

/// Register all Rosalind metric descriptions.
///
/// Called once at startup after the recorder is installed.
pub fn register_metrics() {
    describe_counter!(
        "rosalind_agent_requests_total",
        "Outbound agent calls by resulting status code"
    );
    describe_histogram!(
        "rosalind_agent_latency_seconds",
        "Outbound agent call latency in seconds"
    );
    describe_counter!(
        "rosalind_route_attempts_total",
        "Model router attempts by tier and outcome"
    );
    describe_counter!("rosalind_tokens_total", "Tokens consumed by tier");
    describe_counter!(
        "rosalind_stage_jobs_total",
        "Stage job terminal and retry transitions"
    );
    describe_counter!(
        "rosalind_circuit_open_total",
        "Circuit breaker transitions to OPEN"
    );
}

/// Record one outbound agent call.
pub fn record_agent_request(status: u16, latency_secs: f64) {
    metrics::counter!("rosalind_agent_requests_total", "status" => status.to_string())
        .increment(1);
    metrics::histogram!("rosalind_agent_latency_seconds").record(latency_secs);
}

/// Record a routing attempt.
pub fn record_route_attempt(tier: &str, outcome: &str) {
    metrics::counter!(
        "rosalind_route_attempts_total",
        "tier" => tier.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);
}

/// Record token consumption.
pub fn record_tokens(tier: &str, input: u32, output: u32) {
    metrics::counter!("rosalind_tokens_total", "tier" => tier.to_string(), "type" => "input")
        .increment(u64::from(input));
    metrics::counter!("rosalind_tokens_total", "tier" => tier.to_string(), "type" => "output")
        .increment(u64::from(output));
}

/// Record a stage job transition (`completed`, `failed`, `retried`).
pub fn record_stage_job(outcome: &'static str) {
    metrics::counter!("rosalind_stage_jobs_total", "outcome" => outcome).increment(1);
}

/// Record a breaker opening.
pub fn record_circuit_open() {
    metrics::counter!("rosalind_circuit_open_total").increment(1);
}
