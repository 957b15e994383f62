//! Baseline drift computation.
//!
//! Three-way diff between the entities seen now and the active baseline.
//! Pure functions over sorted maps, so the output order is deterministic
//! and diffing A against B mirrors diffing B against A exactly.

use crate::baseline::Baseline;
use crate::core::{Category, EntityType, Finding, Severity};
use crate::entities::EntityHashes;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeType {
    Added,
    Removed,
    Modified,
}

/// One discrepancy between the current state and the active baseline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriftRecord {
    pub change_type: ChangeType,
    pub entity_identity: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_hash: Option<String>,
}

/// Compare current entities against the active baseline.
///
/// Output is sorted by entity identity. An absent baseline is the caller's
/// concern: drift is opt-in per scope, so "no baseline" means "no diff",
/// handled before this function is reached.
pub fn compute_drift(current: &EntityHashes, baseline: &Baseline) -> Vec<DriftRecord> {
    let mut records = Vec::new();

    for (identity, hash) in current {
        match baseline.entries.get(identity) {
            None => records.push(DriftRecord {
                change_type: ChangeType::Added,
                entity_identity: identity.clone(),
                previous_hash: None,
                current_hash: Some(hash.clone()),
            }),
            Some(entry) if entry.hash != *hash => records.push(DriftRecord {
                change_type: ChangeType::Modified,
                entity_identity: identity.clone(),
                previous_hash: Some(entry.hash.clone()),
                current_hash: Some(hash.clone()),
            }),
            Some(_) => {}
        }
    }

    for (identity, entry) in &baseline.entries {
        if !current.contains_key(identity) {
            records.push(DriftRecord {
                change_type: ChangeType::Removed,
                entity_identity: identity.clone(),
                previous_hash: Some(entry.hash.clone()),
                current_hash: None,
            });
        }
    }

    records.sort_by(|a, b| a.entity_identity.cmp(&b.entity_identity));
    records
}

/// Convert a drift record into a synthetic finding.
pub fn drift_to_finding(record: &DriftRecord, target: &str, severity: Severity) -> Finding {
    let (entity_type, entity_name) = split_identity(&record.entity_identity);

    let description = match record.change_type {
        ChangeType::Added => format!(
            "{entity_type} '{entity_name}' is not present in the approved baseline"
        ),
        ChangeType::Removed => format!(
            "{entity_type} '{entity_name}' was approved in the baseline but is no longer present"
        ),
        ChangeType::Modified => format!(
            "{entity_type} '{entity_name}' changed since baseline approval"
        ),
    };

    Finding::new(
        "baseline",
        entity_type,
        entity_name,
        target,
        Category::BaselineDrift,
        severity,
        description,
    )
    .with_evidence(serde_json::json!({
        "change_type": record.change_type,
        "previous_hash": record.previous_hash,
        "current_hash": record.current_hash,
    }))
    .with_remediation("Review the change and approve a new baseline if it is intended")
}

fn split_identity(identity: &str) -> (EntityType, String) {
    let (prefix, name) = identity.split_once(':').unwrap_or(("component", identity));
    let entity_type = match prefix {
        "tool" => EntityType::Tool,
        "resource" => EntityType::Resource,
        "prompt" => EntityType::Prompt,
        "layer" => EntityType::Layer,
        _ => EntityType::Component,
    };
    (entity_type, name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::baseline::BaselineEntry;
    use chrono::Utc;
    use std::collections::BTreeMap;

    fn baseline(pairs: &[(&str, &str)]) -> Baseline {
        Baseline {
            id: "test@0".to_string(),
            scope: "server-a".to_string(),
            entries: pairs
                .iter()
                .map(|(k, v)| ((*k).to_string(), BaselineEntry { hash: (*v).to_string() }))
                .collect(),
            created_at: Utc::now(),
            approved_by: "test".to_string(),
            active: true,
        }
    }

    fn entities(pairs: &[(&str, &str)]) -> EntityHashes {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn test_modified_entity_yields_one_record_with_both_hashes() {
        let current = entities(&[("tool:fetch", "H2")]);
        let approved = baseline(&[("tool:fetch", "H1")]);

        let drift = compute_drift(&current, &approved);
        assert_eq!(drift.len(), 1);
        assert_eq!(drift[0].change_type, ChangeType::Modified);
        assert_eq!(drift[0].previous_hash.as_deref(), Some("H1"));
        assert_eq!(drift[0].current_hash.as_deref(), Some("H2"));
    }

    #[test]
    fn test_added_and_removed() {
        let current = entities(&[("tool:new_tool", "H1")]);
        let approved = baseline(&[("tool:old_tool", "H0")]);

        let drift = compute_drift(&current, &approved);
        assert_eq!(drift.len(), 2);
        assert!(drift
            .iter()
            .any(|r| r.change_type == ChangeType::Added && r.entity_identity == "tool:new_tool"));
        assert!(drift
            .iter()
            .any(|r| r.change_type == ChangeType::Removed && r.entity_identity == "tool:old_tool"));
    }

    #[test]
    fn test_diff_symmetry() {
        let state_a = entities(&[("tool:a", "H1"), ("tool:b", "H2"), ("tool:c", "H3")]);
        let state_b = entities(&[("tool:b", "H2x"), ("tool:c", "H3"), ("tool:d", "H4")]);

        let a_vs_b = compute_drift(&state_a, &to_baseline(&state_b));
        let b_vs_a = compute_drift(&state_b, &to_baseline(&state_a));

        let added_ab: BTreeMap<_, _> = filter(&a_vs_b, ChangeType::Added);
        let removed_ba: BTreeMap<_, _> = filter(&b_vs_a, ChangeType::Removed);
        assert_eq!(added_ab.keys().collect::<Vec<_>>(), removed_ba.keys().collect::<Vec<_>>());

        let removed_ab: BTreeMap<_, _> = filter(&a_vs_b, ChangeType::Removed);
        let added_ba: BTreeMap<_, _> = filter(&b_vs_a, ChangeType::Added);
        assert_eq!(removed_ab.keys().collect::<Vec<_>>(), added_ba.keys().collect::<Vec<_>>());

        let modified_ab: Vec<_> = a_vs_b
            .iter()
            .filter(|r| r.change_type == ChangeType::Modified)
            .map(|r| r.entity_identity.clone())
            .collect();
        let modified_ba: Vec<_> = b_vs_a
            .iter()
            .filter(|r| r.change_type == ChangeType::Modified)
            .map(|r| r.entity_identity.clone())
            .collect();
        assert_eq!(modified_ab, modified_ba);
    }

    fn to_baseline(state: &EntityHashes) -> Baseline {
        let pairs: Vec<(&str, &str)> = state
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        baseline(&pairs)
    }

    fn filter(records: &[DriftRecord], change: ChangeType) -> BTreeMap<String, ()> {
        records
            .iter()
            .filter(|r| r.change_type == change)
            .map(|r| (r.entity_identity.clone(), ()))
            .collect()
    }

    #[test]
    fn test_identical_states_produce_no_drift() {
        let current = entities(&[("tool:fetch", "H1")]);
        let approved = baseline(&[("tool:fetch", "H1")]);
        assert!(compute_drift(&current, &approved).is_empty());
    }

    #[test]
    fn test_drift_finding_carries_category_and_severity() {
        let record = DriftRecord {
            change_type: ChangeType::Modified,
            entity_identity: "tool:fetch".to_string(),
            previous_hash: Some("H1".to_string()),
            current_hash: Some("H2".to_string()),
        };

        let finding = drift_to_finding(&record, "server.json", Severity::High);
        assert_eq!(finding.category, Category::BaselineDrift);
        assert_eq!(finding.severity, Severity::High);
        assert_eq!(finding.entity_type, EntityType::Tool);
        assert_eq!(finding.entity_name, "fetch");
        assert_eq!(finding.source_engine, "baseline");
    }
}
