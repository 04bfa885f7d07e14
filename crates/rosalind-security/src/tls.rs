// SPDX-FileCopyrightText: 2026 Rosalind Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Hardened HTTP client construction for outbound connections.

use std::sync::Arc;
use std::time::Duration;

use rosalind_core::RosalindError;
use tracing::error;

use crate::ssrf::{SsrfPolicy, SsrfSafeResolver};

/// Build a reqwest::Client with security defaults.
///
/// - Minimum TLS 1.2 for all connections.
/// - With `resolve_guard`, an SSRF-safe DNS resolver that drops private
///   addresses for untrusted hostnames.
/// - Redirects disabled, so a public target cannot bounce the call inward.
pub fn build_secure_client(
    policy: &SsrfPolicy,
    resolve_guard: bool,
    connect_timeout: Duration,
) -> Result<reqwest::Client, RosalindError> {
    let mut builder = reqwest::Client::builder()
        .min_tls_version(reqwest::tls::Version::TLS_1_2)
        .redirect(reqwest::redirect::Policy::none())
        .connect_timeout(connect_timeout);

    if resolve_guard {
        builder = builder.dns_resolver(Arc::new(SsrfSafeResolver::new(policy.clone())));
    }

    builder.build().map_err(|e| {
        error!("failed to build secure HTTP client: {e}");
        RosalindError::Security(format!("failed to build secure HTTP client: {e}"))
    })
}

/// Check if an address refers to localhost.
pub fn is_localhost(addr: &str) -> bool {
    matches!(addr, "127.0.0.1" | "::1" | "localhost" | "[::1]") || addr.starts_with("127.")
}
