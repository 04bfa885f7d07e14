// SPDX-FileCopyrightText: 2026 Rosalind Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Redaction for error strings that may echo caller payloads.
//!
//! Two complementary mechanisms:
//! 1. **Pattern-based**: credentials (API keys, Bearer tokens) and the PHI
//!    detector patterns.
//! 2. **Exact-match**: every string leaf of the submitted request body, so a
//!    downstream that echoes the payload back cannot leak it through us.

use std::sync::LazyLock;

use regex::Regex;

/// Credential patterns to redact from output.
static SECRET_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"sk-ant-[a-zA-Z0-9_\-]{20,}",
        r"sk-[a-zA-Z0-9]{20,}",
        r"Bearer\s+[a-zA-Z0-9._\-]{10,}",
    ]
    .into_iter()
    .map(|p| Regex::new(p).expect("secret pattern must compile"))
    .collect()
});

/// The redaction placeholder.
pub const REDACTED: &str = "[REDACTED]";

/// Longest error string returned to callers.
pub const MAX_ERROR_CHARS: usize = 200;

/// Shortest body leaf considered for exact-match redaction.
const MIN_LEAF_CHARS: usize = 3;

/// Redact secrets and PHI from a string, plus any of `exact_values`.
pub fn redact(input: &str, exact_values: &[String]) -> String {
    let mut result = input.to_string();

    // Exact values first (longest first to avoid partial matches), so a
    // pattern replacement cannot split an echoed value.
    let mut sorted_values: Vec<&String> = exact_values.iter().collect();
    sorted_values.sort_by_key(|v| std::cmp::Reverse(v.len()));
    for value in sorted_values {
        if !value.is_empty() {
            result = result.replace(value.as_str(), REDACTED);
        }
    }

    for pattern in SECRET_PATTERNS.iter().chain(crate::phi::patterns()) {
        result = pattern.replace_all(&result, REDACTED).into_owned();
    }

    result
}

/// Collect the string and number leaves of a JSON document.
///
/// Object keys are structure, not content, and are skipped.
pub fn string_leaves(value: &serde_json::Value) -> Vec<String> {
    fn walk(value: &serde_json::Value, out: &mut Vec<String>) {
        match value {
            serde_json::Value::String(s) => out.push(s.clone()),
            serde_json::Value::Number(n) => out.push(n.to_string()),
            serde_json::Value::Array(items) => items.iter().for_each(|v| walk(v, out)),
            serde_json::Value::Object(map) => map.values().for_each(|v| walk(v, out)),
            serde_json::Value::Bool(_) | serde_json::Value::Null => {}
        }
    }

    let mut out = Vec::new();
    walk(value, &mut out);
    out
}

/// Make a downstream error message safe to return and log.
///
/// Strips echoed request content and PHI-like patterns, then truncates.
pub fn sanitize_error(message: &str, request_body: &serde_json::Value) -> String {
    let leaves: Vec<String> = string_leaves(request_body)
        .into_iter()
        .flat_map(|leaf| {
            // Also catch individual words of multi-word values echoed piecemeal.
            let words: Vec<String> = leaf
                .split_whitespace()
                .filter(|w| w.chars().count() >= MIN_LEAF_CHARS)
                .map(str::to_string)
                .collect();
            std::iter::once(leaf).chain(words)
        })
        .filter(|leaf| leaf.trim().chars().count() >= MIN_LEAF_CHARS)
        .collect();

    truncate(&redact(message, &leaves), MAX_ERROR_CHARS)
}

fn truncate(input: &str, max_chars: usize) -> String {
    match input.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &input[..idx]),
        None => input.to_string(),
    }
}
