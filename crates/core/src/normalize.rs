//! Normalization of raw engine results into canonical findings.
//!
//! Translation out of an engine's native schema belongs to its adapter; this
//! module applies the shared rules on top: severity canonicalization through
//! the adapter's mapping table (unknown values fall back to `Medium`) and
//! the per-scan uniqueness invariant on
//! `(source_engine, entity_type, entity_name, category)`. A malformed
//! payload yields zero findings and a logged normalization error, never an
//! aborted scan.

use crate::core::{Finding, ScanTarget, Severity};
use crate::engine::registry::EngineRegistry;
use crate::engine::{EngineResult, EngineStatus};
use std::collections::HashMap;
use tracing::warn;

/// One engine result that could not be normalized, kept for diagnostics.
#[derive(Debug, Clone)]
pub struct NormalizationFailure {
    pub engine: String,
    pub target: String,
    pub reason: String,
}

#[derive(Debug, Default)]
pub struct NormalizedSet {
    pub findings: Vec<Finding>,
    pub failures: Vec<NormalizationFailure>,
}

pub struct Normalizer;

impl Normalizer {
    /// Map every successful engine result into canonical findings.
    pub fn normalize(
        results: &[EngineResult],
        registry: &EngineRegistry,
        targets: &[ScanTarget],
    ) -> NormalizedSet {
        let targets_by_identity: HashMap<&str, &ScanTarget> = targets
            .iter()
            .map(|t| (t.identity.as_str(), t))
            .collect();

        let mut out = NormalizedSet::default();

        for result in results {
            if result.status != EngineStatus::Success {
                continue;
            }
            let Some(payload) = &result.payload else {
                continue;
            };

            let Some(adapter) = registry.get(&result.engine) else {
                // Results from engines no longer registered cannot be
                // translated; record and move on.
                out.failures.push(NormalizationFailure {
                    engine: result.engine.clone(),
                    target: result.target.clone(),
                    reason: "engine not registered".to_string(),
                });
                continue;
            };
            let Some(target) = targets_by_identity.get(result.target.as_str()) else {
                out.failures.push(NormalizationFailure {
                    engine: result.engine.clone(),
                    target: result.target.clone(),
                    reason: "unknown target".to_string(),
                });
                continue;
            };

            let raw_findings = match adapter.translate(payload, target) {
                Ok(raw) => raw,
                Err(error) => {
                    warn!(
                        engine = result.engine,
                        target = result.target,
                        %error,
                        "normalization failed, result contributes no findings"
                    );
                    out.failures.push(NormalizationFailure {
                        engine: result.engine.clone(),
                        target: result.target.clone(),
                        reason: error.to_string(),
                    });
                    continue;
                }
            };

            let severity_map = adapter.severity_map();
            for raw in raw_findings {
                let severity = severity_map.resolve(&raw.severity).unwrap_or_else(|| {
                    warn!(
                        engine = result.engine,
                        native = raw.severity,
                        "unknown native severity, defaulting to medium"
                    );
                    Severity::Medium
                });

                let mut finding = Finding::new(
                    &result.engine,
                    raw.entity_type,
                    raw.entity_name,
                    &result.target,
                    raw.category,
                    severity,
                    raw.description,
                )
                .with_evidence(raw.evidence);
                if let Some(remediation) = raw.remediation {
                    finding = finding.with_remediation(remediation);
                }
                out.findings.push(finding);
            }
        }

        out.findings = enforce_uniqueness(out.findings);
        out
    }
}

/// Collapse findings that share the per-scan dedup key, keeping the most
/// severe representative. Order of survivors follows first appearance.
fn enforce_uniqueness(findings: Vec<Finding>) -> Vec<Finding> {
    let mut index: HashMap<_, usize> = HashMap::new();
    let mut unique: Vec<Finding> = Vec::with_capacity(findings.len());

    for finding in findings {
        match index.get(&finding.dedup_key()) {
            Some(&position) => {
                if finding.severity > unique[position].severity {
                    unique[position] = finding;
                }
            }
            None => {
                index.insert(finding.dedup_key(), unique.len());
                unique.push(finding);
            }
        }
    }

    unique
}
