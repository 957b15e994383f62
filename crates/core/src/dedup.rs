//! Cross-engine finding deduplication.
//!
//! Grouping runs over `(entity_type, entity_name, category)` through a
//! `BTreeMap`, so the merged output depends only on the input set, never on
//! engine completion order. Merging already-merged input is a no-op.

use crate::core::{Evidence, MergedFinding, MergeKey};
use crate::engine::registry::EngineRegistry;
use std::collections::BTreeMap;

/// Bookkeeping for reports: how much the merge collapsed.
#[derive(Debug, Clone, Copy, Default)]
pub struct DedupStats {
    pub original_count: usize,
    pub merged_count: usize,
    pub collapsed_count: usize,
}

impl DedupStats {
    pub fn reduction_percentage(&self) -> f64 {
        if self.original_count == 0 {
            0.0
        } else {
            (self.collapsed_count as f64 / self.original_count as f64) * 100.0
        }
    }
}

pub struct Deduplicator<'a> {
    registry: &'a EngineRegistry,
}

impl<'a> Deduplicator<'a> {
    pub fn new(registry: &'a EngineRegistry) -> Self {
        Self { registry }
    }

    /// Collapse merged findings that share a group key.
    ///
    /// Within a group: severity is the maximum (monotonic, never lowered),
    /// evidence is the concatenation ordered by engine registration rank,
    /// and the description is the longest one, ties broken by the rank of
    /// the engine that contributed it.
    pub fn merge(&self, findings: Vec<MergedFinding>) -> (Vec<MergedFinding>, DedupStats) {
        let original_count = findings.len();
        let mut groups: BTreeMap<MergeKey, Vec<MergedFinding>> = BTreeMap::new();

        for finding in findings {
            groups.entry(finding.merge_key()).or_default().push(finding);
        }

        let mut merged = Vec::with_capacity(groups.len());
        for (_key, group) in groups {
            merged.push(self.collapse(group));
        }

        let merged_count = merged.len();
        let stats = DedupStats {
            original_count,
            merged_count,
            collapsed_count: original_count - merged_count,
        };
        (merged, stats)
    }

    fn collapse(&self, mut group: Vec<MergedFinding>) -> MergedFinding {
        // Sort contributors by registration rank so evidence order and
        // tie-breaks are stable for the same engine set.
        group.sort_by_key(|f| {
            f.source_engines
                .iter()
                .map(|e| self.registry.rank(e))
                .min()
                .unwrap_or(usize::MAX)
        });

        let severity = group
            .iter()
            .map(|f| f.severity)
            .max()
            .unwrap_or(group[0].severity);

        // Strictly-greater comparison keeps the earliest-registered engine's
        // description on ties.
        let mut description = String::new();
        for contributor in &group {
            if contributor.description.len() > description.len() {
                description = contributor.description.clone();
            }
        }

        let remediation = group.iter().find_map(|f| f.remediation.clone());

        let mut source_engines: Vec<String> = Vec::new();
        let mut evidence: Vec<Evidence> = Vec::new();
        for contributor in &group {
            for engine in &contributor.source_engines {
                if !source_engines.contains(engine) {
                    source_engines.push(engine.clone());
                }
            }
            evidence.extend(contributor.evidence.iter().cloned());
        }

        let first = &group[0];
        MergedFinding {
            entity_type: first.entity_type,
            entity_name: first.entity_name.clone(),
            target: first.target.clone(),
            category: first.category,
            severity,
            description,
            source_engines,
            evidence,
            remediation,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Category, EntityType, Finding, Severity, TargetKind};
    use crate::core::ScanTarget;
    use crate::engine::registry::{EngineRegistry, EngineRegistryBuilder};
    use crate::engine::{EngineAdapter, RawFinding};
    use crate::error::EngineError;
    use async_trait::async_trait;

    struct NamedEngine(&'static str);

    #[async_trait]
    impl EngineAdapter for NamedEngine {
        fn name(&self) -> &str {
            self.0
        }

        fn accepts(&self, _kind: TargetKind) -> bool {
            true
        }

        async fn analyze(&self, _target: &ScanTarget) -> Result<serde_json::Value, EngineError> {
            Ok(serde_json::json!({}))
        }

        fn translate(
            &self,
            _payload: &serde_json::Value,
            _target: &ScanTarget,
        ) -> Result<Vec<RawFinding>, EngineError> {
            Ok(Vec::new())
        }
    }

    fn registry() -> EngineRegistry {
        EngineRegistryBuilder::new()
            .with_engine(NamedEngine("pattern"))
            .with_engine(NamedEngine("llm"))
            .build()
    }

    fn finding(engine: &str, severity: Severity, description: &str) -> MergedFinding {
        MergedFinding::from_finding(
            Finding::new(
                engine,
                EntityType::Tool,
                "execute_command",
                "server.json",
                Category::CommandInjection,
                severity,
                description,
            )
            .with_evidence(serde_json::json!({"engine": engine})),
        )
    }

    #[test]
    fn test_cross_engine_merge_takes_max_severity() {
        let registry = registry();
        let dedup = Deduplicator::new(&registry);
        let input = vec![
            finding("pattern", Severity::High, "short"),
            finding("llm", Severity::Critical, "a longer description"),
        ];

        let (merged, stats) = dedup.merge(input);

        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].severity, Severity::Critical);
        assert_eq!(merged[0].source_engines, vec!["pattern", "llm"]);
        assert_eq!(merged[0].description, "a longer description");
        assert_eq!(merged[0].evidence.len(), 2);
        // Evidence ordered by registration rank, not input order.
        assert_eq!(merged[0].evidence[0].source_engine, "pattern");
        assert_eq!(stats.collapsed_count, 1);
    }

    #[test]
    fn test_merge_is_order_independent() {
        let registry = registry();
        let dedup = Deduplicator::new(&registry);
        let forward = vec![
            finding("pattern", Severity::High, "alpha"),
            finding("llm", Severity::Critical, "beta!"),
        ];
        let reversed: Vec<_> = forward.iter().rev().cloned().collect();

        let (a, _) = dedup.merge(forward);
        let (b, _) = dedup.merge(reversed);

        assert_eq!(
            serde_json::to_string(&a).unwrap(),
            serde_json::to_string(&b).unwrap()
        );
    }

    #[test]
    fn test_merge_is_idempotent() {
        let registry = registry();
        let dedup = Deduplicator::new(&registry);
        let input = vec![
            finding("pattern", Severity::High, "one"),
            finding("llm", Severity::Medium, "two"),
        ];

        let (once, _) = dedup.merge(input);
        let (twice, stats) = dedup.merge(once.clone());

        assert_eq!(
            serde_json::to_string(&once).unwrap(),
            serde_json::to_string(&twice).unwrap()
        );
        assert_eq!(stats.collapsed_count, 0);
    }

    #[test]
    fn test_distinct_entities_stay_separate() {
        let registry = registry();
        let dedup = Deduplicator::new(&registry);
        let mut other = finding("pattern", Severity::High, "different tool");
        other.entity_name = "fetch".to_string();
        let input = vec![finding("pattern", Severity::High, "exec"), other];

        let (merged, _) = dedup.merge(input);
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn test_description_tie_breaks_by_registration_order() {
        let registry = registry();
        let dedup = Deduplicator::new(&registry);
        // Same length descriptions; "pattern" registered first must win.
        let input = vec![
            finding("llm", Severity::High, "12345"),
            finding("pattern", Severity::High, "abcde"),
        ];

        let (merged, _) = dedup.merge(input);
        assert_eq!(merged[0].description, "abcde");
    }
}
