// SPDX-FileCopyrightText: 2026 Rosalind Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Rosalind dispatch backend.

use thiserror::Error;

/// The primary error type used across all Rosalind adapter traits and core operations.
///
/// Variants follow the failure taxonomy used throughout the system: caller
/// mistakes (`Validation`), policy rejections (`Security`), retryable network
/// trouble (`Transient`, `Timeout`), fail-fast capacity rejections
/// (`CircuitOpen`), and infrastructure failures.
#[derive(Debug, Error)]
pub enum RosalindError {
    /// Configuration errors (invalid TOML, missing registry entries, bad values).
    #[error("configuration error: {0}")]
    Config(String),

    /// Malformed input supplied by the caller. Never retried.
    #[error("validation error: {0}")]
    Validation(String),

    /// Security policy rejection (SSRF target, PHI block). Never retried.
    #[error("security policy violation: {0}")]
    Security(String),

    /// Timeout, connection refused, or 5xx from a downstream.
    #[error("transient network error: {message}")]
    Transient { message: String },

    /// The circuit breaker for a target is open; no network call was made.
    #[error("circuit open for {target}")]
    CircuitOpen { target: String },

    /// LLM provider errors (malformed response, non-retryable rejection).
    #[error("provider error: {message}")]
    Provider {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Storage backend errors (database connection, query failure, serialization).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// A referenced entity does not exist.
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl RosalindError {
    /// Whether retrying the same operation against the same target may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            RosalindError::Transient { .. } | RosalindError::Timeout { .. }
        )
    }

    /// Shorthand for a storage error built from any displayable message.
    pub fn storage(message: impl Into<String>) -> Self {
        RosalindError::Storage {
            source: message.into().into(),
        }
    }
}
