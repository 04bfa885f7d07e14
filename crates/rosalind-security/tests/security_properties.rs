// SPDX-FileCopyrightText: 2026 Rosalind Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Property tests for URL validation, PHI gating, and error sanitisation.

use proptest::prelude::*;
use rosalind_core::GovernanceMode;
use rosalind_security::{PhiGate, SsrfPolicy, UrlValidationError, sanitize_error, scan};

proptest! {
    #[test]
    fn rfc1918_class_a_literals_are_always_blocked(b in 0u8..=255, c in 0u8..=255, d in 0u8..=255, port in 1u16..=65535) {
        let url = format!("http://10.{b}.{c}.{d}:{port}/run");
        let err = SsrfPolicy::default().validate(&url).unwrap_err();
        prop_assert!(matches!(err, UrlValidationError::Blocked(_)));
    }

    #[test]
    fn loopback_literals_are_always_blocked(b in 0u8..=255, c in 0u8..=255, d in 0u8..=255) {
        let url = format!("https://127.{b}.{c}.{d}/");
        prop_assert!(SsrfPolicy::default().validate(&url).is_err());
    }

    #[test]
    fn dot_local_hosts_are_always_blocked(label in "[a-z][a-z0-9-]{0,20}") {
        let url = format!("http://{label}.local/");
        let err = SsrfPolicy::default().validate(&url).unwrap_err();
        prop_assert!(matches!(err, UrlValidationError::Blocked(_)));
    }

    #[test]
    fn generated_ssns_are_blocked_in_demo(a in 100u32..999, b in 10u32..99, c in 1000u32..9999) {
        let text = format!("participant identifier {a}-{b}-{c} withdrew consent");
        let result = scan(&text);
        prop_assert!(result.has_phi);
        prop_assert!(!PhiGate::default().decide(&result, GovernanceMode::Demo).allowed);
    }

    #[test]
    fn sanitized_errors_never_echo_the_payload(
        first in "[A-Z][a-z]{2,8}",
        last in "[A-Z][a-z]{2,8}",
        a in 100u32..999, b in 10u32..99, c in 1000u32..9999,
    ) {
        let name = format!("{first} {last}");
        let ssn = format!("{a}-{b}-{c}");
        let body = serde_json::json!({"inputs": {"patient": name, "ssn": ssn}});
        let echoed = format!("bad request: patient={name} ssn={ssn} raw={body}");

        let sanitized = sanitize_error(&echoed, &body);
        prop_assert!(!sanitized.contains(&name));
        prop_assert!(!sanitized.contains(&first));
        prop_assert!(!sanitized.contains(&last));
        prop_assert!(!sanitized.contains(&ssn));
        prop_assert!(sanitized.chars().count() <= 203);
    }
}
