// SPDX-FileCopyrightText: 2026 Rosalind Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! PHI gate: pattern-based detection of protected health information and the
//! admit/block/warn decision for a governance mode.
//!
//! Detection is deterministic and local. Each detector carries a weight; the
//! scan confidence combines the weights of every category that fired as
//! `1 - prod(1 - w)`, so independent weak signals reinforce each other.
//! Audit logs carry category names and the confidence, never the matched text.

use std::sync::LazyLock;

use regex::Regex;
use rosalind_core::GovernanceMode;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use tracing::{info, warn};

/// Categories of identifiers the scanner recognises.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PhiCategory {
    Ssn,
    MedicalRecordNumber,
    DateOfBirth,
    InsuranceId,
    PatientName,
    Phone,
    Email,
    StreetAddress,
    Date,
}

struct Detector {
    category: PhiCategory,
    weight: f64,
    pattern: Regex,
}

fn detector(category: PhiCategory, weight: f64, pattern: &str) -> Detector {
    Detector {
        category,
        weight,
        // Static patterns; a failure here is a programming error caught by tests.
        pattern: Regex::new(pattern).expect("PHI detector pattern must compile"),
    }
}

static DETECTORS: LazyLock<Vec<Detector>> = LazyLock::new(|| {
    vec![
        detector(PhiCategory::Ssn, 0.95, r"\b\d{3}-\d{2}-\d{4}\b"),
        detector(
            PhiCategory::MedicalRecordNumber,
            0.9,
            r"(?i)\b(?:MRN|medical\s+record(?:\s+(?:number|no\.?))?)\s*[:#]?\s*[A-Z0-9][A-Z0-9-]{4,}",
        ),
        detector(
            PhiCategory::DateOfBirth,
            0.85,
            r"(?i)\b(?:DOB|D\.O\.B\.|date\s+of\s+birth|born(?:\s+on)?)\s*[:]?\s*\d{1,4}[/.-]\d{1,2}[/.-]\d{2,4}",
        ),
        detector(
            PhiCategory::InsuranceId,
            0.7,
            r"(?i)\b(?:member|policy|insurance|subscriber|medicaid|medicare)\s*(?:id|no\.?|number|#)\s*[:#]?\s*[A-Z0-9]{6,}",
        ),
        detector(
            PhiCategory::PatientName,
            0.6,
            r"\b(?:[Pp]atient|[Pp]t\.|Mr\.|Mrs\.|Ms\.|Miss)\s+[A-Z][a-z]+(?:\s+[A-Z][a-z]+)?\b",
        ),
        detector(
            PhiCategory::PatientName,
            0.6,
            r"\b[A-Z][a-z]+\s+[A-Z][a-z]+,?\s+(?:was|is|has\s+been)\s+(?:admitted|diagnosed|prescribed|treated|discharged|seen)\b",
        ),
        detector(
            PhiCategory::Phone,
            0.5,
            r"(?:\(\d{3}\)\s*|\b\d{3}[-. ])\d{3}[-.]\d{4}\b",
        ),
        detector(
            PhiCategory::Email,
            0.5,
            r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b",
        ),
        detector(
            PhiCategory::StreetAddress,
            0.5,
            r"\b\d{1,5}\s+(?:[A-Z][a-z]+\s+){1,3}(?:Street|St|Avenue|Ave|Road|Rd|Boulevard|Blvd|Lane|Ln|Drive|Dr|Court|Ct)\b",
        ),
        detector(PhiCategory::Date, 0.3, r"\b\d{1,2}/\d{1,2}/\d{4}\b"),
    ]
});

/// Patterns used to mask PHI in free text (shared with redaction).
pub(crate) fn patterns() -> impl Iterator<Item = &'static Regex> {
    DETECTORS.iter().map(|d| &d.pattern)
}

/// Result of scanning a piece of text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhiScanResult {
    pub has_phi: bool,
    /// Distinct categories found, in detector order.
    pub categories: Vec<PhiCategory>,
    /// Combined confidence in `[0, 1]`; `0.0` when nothing matched.
    pub confidence: f64,
}

impl PhiScanResult {
    fn category_names(&self) -> String {
        self.categories
            .iter()
            .map(|c| c.to_string())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Admission decision for scanned text under a governance mode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GovernanceDecision {
    pub allowed: bool,
    pub reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

/// Scan text for PHI-like patterns.
pub fn scan(text: &str) -> PhiScanResult {
    let mut categories: Vec<PhiCategory> = Vec::new();
    let mut miss_probability = 1.0_f64;

    for detector in DETECTORS.iter() {
        if categories.contains(&detector.category) {
            continue;
        }
        if detector.pattern.is_match(text) {
            categories.push(detector.category);
            miss_probability *= 1.0 - detector.weight;
        }
    }

    let has_phi = !categories.is_empty();
    PhiScanResult {
        has_phi,
        categories,
        confidence: if has_phi { 1.0 - miss_probability } else { 0.0 },
    }
}

/// Governance policy over PHI scan results.
#[derive(Debug, Clone, Copy)]
pub struct PhiGate {
    live_block_threshold: f64,
}

impl Default for PhiGate {
    fn default() -> Self {
        Self::new(0.7)
    }
}

impl PhiGate {
    /// `live_block_threshold` is the confidence at or above which LIVE mode blocks.
    pub fn new(live_block_threshold: f64) -> Self {
        Self {
            live_block_threshold: live_block_threshold.clamp(0.0, 1.0),
        }
    }

    pub fn live_block_threshold(&self) -> f64 {
        self.live_block_threshold
    }

    /// Decide admissibility of a scan result.
    ///
    /// DEMO blocks any hit. LIVE blocks at or above the threshold and admits
    /// weaker hits with a warning.
    pub fn decide(&self, result: &PhiScanResult, mode: GovernanceMode) -> GovernanceDecision {
        if !result.has_phi {
            return GovernanceDecision {
                allowed: true,
                reason: "no PHI detected".to_string(),
                warning: None,
            };
        }

        let categories = result.category_names();
        match mode {
            GovernanceMode::Demo => GovernanceDecision {
                allowed: false,
                reason: format!("PHI detected in DEMO mode ({categories})"),
                warning: None,
            },
            GovernanceMode::Live if result.confidence >= self.live_block_threshold => {
                GovernanceDecision {
                    allowed: false,
                    reason: format!(
                        "PHI detected with confidence {:.2} ({categories})",
                        result.confidence
                    ),
                    warning: None,
                }
            }
            GovernanceMode::Live => GovernanceDecision {
                allowed: true,
                reason: "PHI confidence below LIVE block threshold".to_string(),
                warning: Some(format!(
                    "possible PHI detected ({categories}); confidence {:.2}",
                    result.confidence
                )),
            },
        }
    }

    /// Scan and decide in one step, emitting an audit log line.
    pub fn check(&self, text: &str, mode: GovernanceMode) -> GovernanceDecision {
        let result = scan(text);
        let decision = self.decide(&result, mode);
        if result.has_phi {
            let categories = result.category_names();
            if decision.allowed {
                info!(
                    mode = %mode,
                    categories = %categories,
                    confidence = result.confidence,
                    "PHI gate admitted input with warning"
                );
            } else {
                warn!(
                    mode = %mode,
                    categories = %categories,
                    confidence = result.confidence,
                    "PHI gate blocked input"
                );
            }
        }
        decision
    }

    /// Check every string leaf of a JSON document as one text.
    pub fn check_json(&self, value: &serde_json::Value, mode: GovernanceMode) -> GovernanceDecision {
        let text = crate::redact::string_leaves(value).join("\n");
        self.check(&text, mode)
    }
}
