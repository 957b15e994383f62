//! End-to-end scan pipeline.
//!
//! One logical operation, `run_scan`, drives the lifecycle:
//! `Created → Loading → Dispatching → Collecting → Normalizing →
//! Deduplicating → DriftChecking → PolicyEvaluating → Completed`.
//! `Failed` is reachable only from `Loading`: once targets are resolved,
//! every later stage degrades gracefully and the scan still produces a gate
//! result. The only other fatal condition is the scan's own configuration
//! (an invalid policy never reaches this module; `Policy::from_json`
//! rejects it at the boundary).

use crate::baseline::drift::{compute_drift, drift_to_finding, DriftRecord};
use crate::baseline::BaselineManager;
use crate::core::{MergedFinding, Policy, ScanConfig, ScanTarget};
use crate::dedup::{DedupStats, Deduplicator};
use crate::engine::registry::EngineRegistry;
use crate::entities::{extract_entities, EntityHashes};
use crate::error::ScanError;
use crate::loader::{TargetFailure, TargetLoader, TargetRef};
use crate::normalize::{NormalizationFailure, Normalizer};
use crate::orchestrator::Orchestrator;
use crate::policy::{evaluate, GateResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Scan lifecycle stage, surfaced on the outcome for observability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanState {
    Created,
    Loading,
    Dispatching,
    Collecting,
    Normalizing,
    Deduplicating,
    DriftChecking,
    PolicyEvaluating,
    Completed,
    Failed,
}

/// One scan request: what to scan, under which policy, against which
/// baseline scope.
pub struct ScanRequest {
    pub refs: Vec<TargetRef>,

    pub policy: Policy,

    /// Scope whose active baseline drives drift detection. `None` opts out.
    pub baseline_scope: Option<String>,

    /// Restrict the run to these engine names; `None` runs all registered.
    pub engines: Option<Vec<String>>,
}

/// Everything a scan produced, degradations included.
#[derive(Debug)]
pub struct ScanOutcome {
    pub state: ScanState,
    pub gate: GateResult,
    pub findings: Vec<MergedFinding>,
    pub drift: Vec<DriftRecord>,
    pub degraded_engines: BTreeSet<String>,
    pub failed_targets: Vec<TargetFailure>,
    pub normalization_failures: Vec<NormalizationFailure>,
    pub dedup_stats: DedupStats,
    pub deadline_expired: bool,
    pub duration: Duration,
}

/// Owns the collaborators of one scanning installation and runs scans
/// against them.
pub struct ScanPipeline {
    registry: EngineRegistry,
    loader: TargetLoader,
    baselines: Option<Arc<BaselineManager>>,
    config: ScanConfig,
}

impl ScanPipeline {
    pub fn new(registry: EngineRegistry) -> Self {
        Self {
            registry,
            loader: TargetLoader::new(),
            baselines: None,
            config: ScanConfig::default(),
        }
    }

    pub fn with_loader(mut self, loader: TargetLoader) -> Self {
        self.loader = loader;
        self
    }

    pub fn with_baselines(mut self, baselines: Arc<BaselineManager>) -> Self {
        self.baselines = Some(baselines);
        self
    }

    pub fn with_config(mut self, config: ScanConfig) -> Self {
        self.config = config;
        self
    }

    pub fn registry(&self) -> &EngineRegistry {
        &self.registry
    }

    /// Run one scan end to end.
    ///
    /// Errors only on fatal configuration conditions: no targets resolved
    /// at all. Everything else degrades into outcome metadata.
    pub async fn run_scan(&self, request: ScanRequest) -> Result<ScanOutcome, ScanError> {
        let started = Instant::now();

        // Loading. The single stage a scan can still fail from.
        let loaded = self.loader.load(&request.refs);
        if loaded.targets.is_empty() {
            warn!(
                failed = loaded.failures.len(),
                "no targets resolved, scan failed"
            );
            return Err(ScanError::NoTargets);
        }
        info!(
            targets = loaded.targets.len(),
            failed = loaded.failures.len(),
            "targets loaded"
        );

        // Dispatching / Collecting.
        let engines = match &request.engines {
            Some(names) => {
                let mut subset = Vec::new();
                for name in names {
                    match self.registry.get(name) {
                        Some(engine) => subset.push(engine),
                        None => warn!(
                            engine = name.as_str(),
                            "requested engine is not registered, skipping"
                        ),
                    }
                }
                subset
            }
            None => self.registry.all(),
        };
        let orchestrator = Orchestrator::new(self.config.clone());
        let dispatch = orchestrator.dispatch(&engines, &loaded.targets).await;

        // Normalizing.
        let normalized = Normalizer::normalize(&dispatch.results, &self.registry, &loaded.targets);

        // Deduplicating.
        let singletons: Vec<MergedFinding> = normalized
            .findings
            .into_iter()
            .map(MergedFinding::from_finding)
            .collect();
        let dedup = Deduplicator::new(&self.registry);
        let (mut findings, dedup_stats) = if self.config.deduplication_enabled {
            dedup.merge(singletons)
        } else {
            let count = singletons.len();
            (
                singletons,
                DedupStats {
                    original_count: count,
                    merged_count: count,
                    collapsed_count: 0,
                },
            )
        };

        // DriftChecking.
        let drift = self.check_drift(&request, &loaded.targets);
        if !drift.is_empty() {
            let scope = request.baseline_scope.as_deref().unwrap_or_default();
            let drift_findings = drift
                .iter()
                .map(|record| {
                    MergedFinding::from_finding(drift_to_finding(
                        record,
                        scope,
                        request.policy.drift_severity,
                    ))
                })
                .collect::<Vec<_>>();
            findings.extend(drift_findings);
            if self.config.deduplication_enabled {
                // Re-merge keeps the final set sorted and is a no-op for
                // the already-merged portion. With dedup opted out the
                // drift findings are appended as-is; each drift record is
                // already unique per entity identity.
                (findings, _) = dedup.merge(findings);
            }
        }

        // PolicyEvaluating.
        let gate = evaluate(&findings, &request.policy);
        info!(
            passed = gate.passed,
            total = gate.total_findings,
            blocking = gate.blocking_findings,
            degraded = dispatch.degraded_engines.len(),
            "scan completed"
        );

        Ok(ScanOutcome {
            state: ScanState::Completed,
            gate,
            findings,
            drift,
            degraded_engines: dispatch.degraded_engines,
            failed_targets: loaded.failures,
            normalization_failures: normalized.failures,
            dedup_stats,
            deadline_expired: dispatch.deadline_expired,
            duration: started.elapsed(),
        })
    }

    /// Compute drift for the requested scope, or nothing when drift is
    /// disabled, unconfigured, or the scope has no usable baseline.
    fn check_drift(&self, request: &ScanRequest, targets: &[ScanTarget]) -> Vec<DriftRecord> {
        if !self.config.drift_enabled {
            return Vec::new();
        }
        let (Some(manager), Some(scope)) = (&self.baselines, &request.baseline_scope) else {
            return Vec::new();
        };

        let baseline = match manager.store().load_active(scope) {
            Ok(Some(baseline)) => baseline,
            Ok(None) => {
                // Drift is opt-in per scope; no baseline means no diff.
                return Vec::new();
            }
            Err(error) => {
                warn!(scope, %error, "baseline unusable, skipping drift for scope");
                return Vec::new();
            }
        };

        let mut current = EntityHashes::new();
        for target in targets {
            current.extend(extract_entities(target));
        }

        compute_drift(&current, &baseline)
    }
}
