// SPDX-FileCopyrightText: 2026 Rosalind Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Quality gate for model output.
//!
//! Deterministic, task-typed structural checks. The full check list is
//! returned on pass as well as fail so every attempt leaves an audit trail.

use std::collections::HashSet;

use rosalind_core::{QualityCheck, QualityGateSummary, TaskType};
use rosalind_security::{PhiCategory, scan};

/// Phrases that mark a refusal or a model talking about itself instead of the task.
const REFUSAL_MARKERS: &[&str] = &[
    "as an ai",
    "as a language model",
    "i cannot help",
    "i can't help",
    "i'm unable to",
    "i am unable to",
    "i cannot comply",
];

/// Unfilled template text.
const PLACEHOLDER_MARKERS: &[&str] = &["lorem ipsum", "[insert", "<insert", "{{", "tbd:"];

/// Minimum non-whitespace characters an answer must have.
fn min_chars(task: TaskType) -> usize {
    match task {
        TaskType::Classify => 2,
        TaskType::Extract | TaskType::PhiRedaction => 2,
        TaskType::Summarize => 40,
        TaskType::LiteratureSynthesis | TaskType::StatisticalReasoning => 120,
        TaskType::ProtocolDraft | TaskType::ManuscriptDraft => 400,
    }
}

/// Strip a Markdown code fence, if the whole answer is wrapped in one.
fn unfenced(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let body = rest.split_once('\n').map(|(_, body)| body).unwrap_or("");
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

fn check(name: &str, passed: bool, detail: Option<String>) -> QualityCheck {
    QualityCheck {
        name: name.to_string(),
        passed,
        detail: if passed { None } else { detail },
    }
}

/// Evaluates responses against task-specific criteria.
#[derive(Debug, Clone, Default)]
pub struct QualityGate;

impl QualityGate {
    pub fn new() -> Self {
        Self
    }

    pub fn evaluate(&self, task: TaskType, content: &str) -> QualityGateSummary {
        let body = unfenced(content);
        let lower = body.to_lowercase();
        let mut checks = Vec::new();

        checks.push(check(
            "non_empty",
            !body.is_empty(),
            Some("response is empty".to_string()),
        ));

        let chars = body.chars().filter(|c| !c.is_whitespace()).count();
        let min = min_chars(task);
        checks.push(check(
            "min_length",
            chars >= min,
            Some(format!("{chars} characters, need at least {min}")),
        ));

        if task.expects_json() {
            let parsed = serde_json::from_str::<serde_json::Value>(body);
            let is_document = matches!(
                parsed,
                Ok(serde_json::Value::Object(_) | serde_json::Value::Array(_))
            );
            checks.push(check(
                "json_format",
                is_document,
                Some("response is not a JSON object or array".to_string()),
            ));
        }

        let refusal = REFUSAL_MARKERS.iter().find(|m| lower.contains(*m));
        checks.push(check(
            "no_refusal",
            refusal.is_none(),
            refusal.map(|m| format!("contains refusal marker \"{m}\"")),
        ));

        let placeholder = PLACEHOLDER_MARKERS.iter().find(|m| lower.contains(*m));
        checks.push(check(
            "no_placeholder",
            placeholder.is_none(),
            placeholder.map(|m| format!("contains placeholder \"{m}\"")),
        ));

        checks.push(coherence(body));

        if task == TaskType::PhiRedaction {
            // Bare calendar dates survive redaction; identifiers must not.
            let residual: Vec<String> = scan(body)
                .categories
                .into_iter()
                .filter(|c| *c != PhiCategory::Date)
                .map(|c| c.to_string())
                .collect();
            checks.push(check(
                "no_residual_phi",
                residual.is_empty(),
                Some(format!("residual identifiers: {}", residual.join(", "))),
            ));
        }

        let passed_count = checks.iter().filter(|c| c.passed).count();
        let score = passed_count as f64 / checks.len() as f64;
        let recommendations = checks
            .iter()
            .filter(|c| !c.passed)
            .map(|c| recommendation(&c.name).to_string())
            .collect();

        QualityGateSummary {
            passed: passed_count == checks.len(),
            score,
            checks,
            recommendations,
        }
    }
}

/// Long answers that mostly repeat the same lines are degenerate output.
fn coherence(body: &str) -> QualityCheck {
    let lines: Vec<&str> = body
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();
    if lines.len() < 4 {
        return check("coherence", true, None);
    }
    let distinct: HashSet<&str> = lines.iter().copied().collect();
    let ratio = distinct.len() as f64 / lines.len() as f64;
    check(
        "coherence",
        ratio >= 0.5,
        Some(format!("only {:.0}% of lines are distinct", ratio * 100.0)),
    )
}

fn recommendation(check: &str) -> &'static str {
    match check {
        "non_empty" | "min_length" => "escalate to a tier with a larger output budget",
        "json_format" => "require a JSON-only answer",
        "no_refusal" => "escalate; the model declined the task",
        "no_placeholder" => "escalate; the answer left template text unfilled",
        "coherence" => "escalate; the answer is repetitive",
        "no_residual_phi" => "escalate; identifiers remain after redaction",
        _ => "escalate",
    }
}
