// SPDX-FileCopyrightText: 2026 Rosalind Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Security enforcement for the Rosalind dispatch backend.
//!
//! Provides SSRF prevention (static URL validation plus a DNS resolver
//! guard), the PHI gate used to admit or reject caller text, and redaction
//! of PHI and echoed payload content from error strings.

pub mod phi;
pub mod redact;
pub mod ssrf;
pub mod tls;

pub use phi::{GovernanceDecision, PhiCategory, PhiGate, PhiScanResult, scan};
pub use redact::{redact, sanitize_error, string_leaves};
pub use ssrf::{SsrfPolicy, SsrfSafeResolver, UrlValidationError, is_private_ip};
pub use tls::{build_secure_client, is_localhost};
