// SPDX-FileCopyrightText: 2026 Rosalind Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP client for agent services.
//!
//! Every call runs the same pipeline: SSRF validation, circuit breaker
//! admission, a cancelling timeout, then status classification. The breaker
//! permit is consumed on exactly one branch, so an aborted call is counted
//! once.

use std::error::Error as _;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use rosalind_config::RosalindConfig;
use rosalind_core::RosalindError;
use rosalind_resilience::{BreakerConfig, BreakerRegistry, BreakerSnapshot, CircuitState};
use rosalind_security::{SsrfPolicy, build_secure_client, sanitize_error};
use serde::Serialize;
use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::audit::{AuditEntry, AuditSink, TracingAuditSink};

/// Default request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(30_000);

/// Uniform result of an outbound call. `status_code` is 0 for transport
/// failures that never produced an HTTP status.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgentResponse {
    pub success: bool,
    pub status_code: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub latency_ms: u64,
}

impl AgentResponse {
    fn failure(status_code: u16, error: impl Into<String>) -> Self {
        Self {
            success: false,
            status_code,
            data: None,
            error: Some(error.into()),
            latency_ms: 0,
        }
    }

    /// Whether the caller may retry: transport failure, timeout, rate limit,
    /// or a 5xx (including the synthetic circuit-open 503).
    pub fn is_transient(&self) -> bool {
        !self.success && is_transient_status(self.status_code)
    }
}

/// Status codes that describe a downstream condition rather than a bad request.
pub fn is_transient_status(status: u16) -> bool {
    matches!(status, 0 | 408 | 429) || status >= 500
}

/// Per-call overrides.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    pub timeout: Option<Duration>,
}

impl RequestOptions {
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout: Some(timeout),
        }
    }
}

/// Construction options for an [`AgentClient`].
#[derive(Clone)]
pub struct ClientOptions {
    pub timeout: Duration,
    pub breaker: BreakerConfig,
    pub policy: SsrfPolicy,
    pub resolve_guard: bool,
    pub audit: Arc<dyn AuditSink>,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            breaker: BreakerConfig::default(),
            policy: SsrfPolicy::default(),
            resolve_guard: true,
            audit: Arc::new(TracingAuditSink),
        }
    }
}

impl fmt::Debug for ClientOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientOptions")
            .field("timeout", &self.timeout)
            .field("breaker", &self.breaker)
            .field("policy", &self.policy)
            .field("resolve_guard", &self.resolve_guard)
            .finish_non_exhaustive()
    }
}

impl ClientOptions {
    /// Options from loaded configuration.
    ///
    /// Hostnames of registered agents and tier endpoints become trusted so
    /// that compose-network names resolving to private ranges stay reachable.
    pub fn from_config(config: &RosalindConfig) -> Self {
        let mut policy = SsrfPolicy::new(
            &config.security.allowed_private_ips,
            &config.security.trusted_hosts,
        );
        let endpoints = config
            .agents
            .values()
            .map(String::as_str)
            .chain(config.routing.tiers.values().filter_map(|t| t.endpoint.as_deref()));
        for raw in endpoints {
            if let Some(host) = Url::parse(raw).ok().and_then(|u| u.host_str().map(str::to_string)) {
                policy.trust_host(&host);
            }
        }

        Self {
            timeout: config.client.timeout(),
            breaker: BreakerConfig {
                failure_threshold: config.client.breaker_threshold,
                reset_timeout: config.client.breaker_reset_timeout(),
                half_open_max_trials: config.client.half_open_max_trials,
                half_open_success_threshold: config.client.half_open_success_threshold,
            },
            policy,
            resolve_guard: config.security.resolve_guard,
            audit: Arc::new(TracingAuditSink),
        }
    }
}

/// Breaker key for a base URL: `host:port` of its authority.
pub fn target_key(base_url: &str) -> Option<String> {
    Url::parse(base_url).ok().map(|u| authority(&u))
}

fn authority(url: &Url) -> String {
    let host = url.host_str().unwrap_or_default();
    match url.port_or_known_default() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    }
}

/// SSRF-guarded, circuit-broken HTTP client.
pub struct AgentClient {
    http: reqwest::Client,
    policy: SsrfPolicy,
    breakers: BreakerRegistry,
    default_timeout: Duration,
    audit: Arc<dyn AuditSink>,
}

impl fmt::Debug for AgentClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgentClient")
            .field("default_timeout", &self.default_timeout)
            .field("breakers", &self.breakers)
            .finish_non_exhaustive()
    }
}

enum Outcome {
    Received { status: u16, body: Value },
    Transport(String),
    TimedOut(Duration),
}

impl AgentClient {
    pub fn new(options: ClientOptions) -> Result<Self, RosalindError> {
        let http = build_secure_client(&options.policy, options.resolve_guard, options.timeout)?;
        Ok(Self {
            http,
            policy: options.policy,
            breakers: BreakerRegistry::new(options.breaker),
            default_timeout: options.timeout,
            audit: options.audit,
        })
    }

    /// POST `body` as JSON to `{base_url}{path}`.
    ///
    /// Never fails; every outcome is encoded in the returned response.
    pub async fn post_sync(
        &self,
        base_url: &str,
        path: &str,
        body: &Value,
        opts: Option<&RequestOptions>,
    ) -> AgentResponse {
        let started = Instant::now();
        let mut response = self.execute(base_url, path, body, opts).await;
        response.latency_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        let entry = AuditEntry {
            path: audit_path(path),
            status_code: response.status_code,
            latency_ms: response.latency_ms,
        };
        self.audit.record(&entry);
        rosalind_prometheus::record_agent_request(
            response.status_code,
            started.elapsed().as_secs_f64(),
        );
        response
    }

    async fn execute(
        &self,
        base_url: &str,
        path: &str,
        body: &Value,
        opts: Option<&RequestOptions>,
    ) -> AgentResponse {
        let base = match self.policy.validate(base_url) {
            Ok(url) => url,
            Err(e) => return AgentResponse::failure(400, e.to_string()),
        };
        let url = match join_url(base_url, path) {
            Ok(url) => url,
            Err(e) => return AgentResponse::failure(400, format!("Invalid URL: {e}")),
        };

        let target = authority(&base);
        let permit = match self.breakers.acquire(&target) {
            Ok(permit) => permit,
            Err(_) => {
                debug!(target = %target, "short-circuiting call");
                return AgentResponse::failure(503, "circuit open");
            }
        };

        let timeout = opts.and_then(|o| o.timeout).unwrap_or(self.default_timeout);
        match self.send(url, body, timeout).await {
            Outcome::TimedOut(after) => {
                permit.failure();
                AgentResponse::failure(408, format!("request timeout after {}ms", after.as_millis()))
            }
            Outcome::Transport(message) => {
                permit.failure();
                AgentResponse::failure(0, sanitize_error(&message, body))
            }
            Outcome::Received { status, body: data } => {
                if status >= 500 {
                    permit.failure();
                } else {
                    permit.success();
                }

                if (200..300).contains(&status) {
                    AgentResponse {
                        success: true,
                        status_code: status,
                        data: Some(data),
                        error: None,
                        latency_ms: 0,
                    }
                } else {
                    let message = extract_error(&data, status);
                    AgentResponse::failure(status, sanitize_error(&message, body))
                }
            }
        }
    }

    async fn send(&self, url: Url, body: &Value, timeout: Duration) -> Outcome {
        let call = async {
            let response = self.http.post(url).json(body).send().await?;
            let status = response.status().as_u16();
            let bytes = response.bytes().await?;
            Ok::<_, reqwest::Error>((status, bytes))
        };

        // Dropping the call future on expiry aborts the underlying connection.
        match tokio::time::timeout(timeout, call).await {
            Err(_) => Outcome::TimedOut(timeout),
            Ok(Err(e)) => Outcome::Transport(transport_message(e)),
            Ok(Ok((status, bytes))) => {
                let body = serde_json::from_slice(&bytes).unwrap_or_else(|_| {
                    Value::String(String::from_utf8_lossy(&bytes).into_owned())
                });
                Outcome::Received { status, body }
            }
        }
    }

    pub fn breaker_state(&self, target: &str) -> CircuitState {
        self.breakers.state(target)
    }

    pub fn breaker_snapshot(&self, target: &str) -> Option<BreakerSnapshot> {
        self.breakers.snapshot(target)
    }

    pub fn breaker_snapshots(&self) -> Vec<(String, BreakerSnapshot)> {
        self.breakers.snapshots()
    }

    pub fn force_open(&self, target: &str) {
        self.breakers.force_open(target);
    }

    pub fn force_close(&self, target: &str) {
        self.breakers.force_close(target);
    }

    pub fn reset_breakers(&self) {
        self.breakers.reset();
    }
}

fn join_url(base_url: &str, path: &str) -> Result<Url, url::ParseError> {
    let base = base_url.trim().trim_end_matches('/');
    if path.is_empty() {
        Url::parse(base)
    } else if path.starts_with('/') {
        Url::parse(&format!("{base}{path}"))
    } else {
        Url::parse(&format!("{base}/{path}"))
    }
}

fn audit_path(path: &str) -> String {
    let path = path.split(['?', '#']).next().unwrap_or_default();
    if path.is_empty() {
        "/".to_string()
    } else {
        path.to_string()
    }
}

fn transport_message(e: reqwest::Error) -> String {
    let e = e.without_url();
    let mut message = e.to_string();
    let mut source = e.source();
    while let Some(inner) = source {
        message.push_str(": ");
        message.push_str(&inner.to_string());
        source = inner.source();
    }
    message
}

/// Pull a human-readable error out of a non-2xx body: the JSON `error`
/// field (string, or object with `message`), else the raw text.
fn extract_error(body: &Value, status: u16) -> String {
    let message = match body {
        Value::Object(map) => match map.get("error") {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Object(inner)) => inner
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| Value::Object(inner.clone()).to_string()),
            Some(other) => other.to_string(),
            None => body.to_string(),
        },
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    };
    if message.trim().is_empty() {
        format!("HTTP {status}")
    } else {
        message
    }
}
