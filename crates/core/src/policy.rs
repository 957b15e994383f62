//! Declarative gate policy and its evaluation.
//!
//! `evaluate` is a pure function of (merged findings, policy): no clock, no
//! randomness, no I/O. Two calls with identical input produce identical
//! `GateResult`s regardless of engine completion order earlier in the scan.

use crate::core::{Category, MergedFinding, Severity};
use crate::error::ScanError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Declarative gate configuration, loaded fresh for each evaluation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Policy {
    /// Minimum severity that counts as blocking.
    pub severity_threshold: Severity,

    /// Categories that block regardless of severity.
    #[serde(default)]
    pub blocked_categories: BTreeSet<Category>,

    /// Entity identities (`"{entity_type}:{entity_name}"`) exempt from
    /// blocking in every category.
    #[serde(default)]
    pub allowlist: BTreeSet<String>,

    /// Severity assigned to synthetic baseline-drift findings.
    #[serde(default = "default_drift_severity")]
    pub drift_severity: Severity,
}

fn default_drift_severity() -> Severity {
    Severity::High
}

impl Default for Policy {
    fn default() -> Self {
        Self {
            severity_threshold: Severity::High,
            blocked_categories: BTreeSet::new(),
            allowlist: BTreeSet::new(),
            drift_severity: Severity::High,
        }
    }
}

impl Policy {
    /// Parse a policy from JSON, failing the whole scan on malformed input.
    pub fn from_json(raw: &str) -> Result<Self, ScanError> {
        serde_json::from_str(raw).map_err(|e| ScanError::PolicyInvalid(e.to_string()))
    }

    fn entity_identity(finding: &MergedFinding) -> String {
        format!("{}:{}", finding.entity_type, finding.entity_name)
    }

    /// Whether one merged finding blocks the gate under this policy.
    pub fn blocks(&self, finding: &MergedFinding) -> bool {
        if self.allowlist.contains(&Self::entity_identity(finding)) {
            return false;
        }
        finding.severity >= self.severity_threshold
            || self.blocked_categories.contains(&finding.category)
    }
}

/// Per-severity finding counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeverityCount {
    pub critical: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
    pub informational: usize,
}

impl SeverityCount {
    pub fn record(&mut self, severity: Severity) {
        match severity {
            Severity::Critical => self.critical += 1,
            Severity::High => self.high += 1,
            Severity::Medium => self.medium += 1,
            Severity::Low => self.low += 1,
            Severity::Informational => self.informational += 1,
        }
    }
}

/// Pass/fail decision plus the findings that caused a failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateResult {
    pub passed: bool,
    pub total_findings: usize,
    pub blocking_findings: usize,
    pub severity_counts: SeverityCount,
    pub blocking: Vec<MergedFinding>,
}

/// Evaluate the final finding set against a policy.
pub fn evaluate(findings: &[MergedFinding], policy: &Policy) -> GateResult {
    let mut severity_counts = SeverityCount::default();
    let mut blocking = Vec::new();

    for finding in findings {
        severity_counts.record(finding.severity);
        if policy.blocks(finding) {
            blocking.push(finding.clone());
        }
    }

    GateResult {
        passed: blocking.is_empty(),
        total_findings: findings.len(),
        blocking_findings: blocking.len(),
        severity_counts,
        blocking,
    }
}
