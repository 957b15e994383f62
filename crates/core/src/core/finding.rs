use crate::core::Severity;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of security-relevant entity a finding is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityType {
    Tool,
    Resource,
    Prompt,
    Layer,
    Component,
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tool => write!(f, "tool"),
            Self::Resource => write!(f, "resource"),
            Self::Prompt => write!(f, "prompt"),
            Self::Layer => write!(f, "layer"),
            Self::Component => write!(f, "component"),
        }
    }
}

/// Closed vocabulary of detection categories.
///
/// Adapters translate whatever their engine reports into one of these; an
/// engine category that has no mapping is dropped during normalization with
/// a logged warning rather than invented on the fly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    CommandInjection,
    HardcodedSecret,
    ToolPoisoning,
    BaselineDrift,
    ArbitraryCodeExecution,
    PromptInjection,
    DataExfiltration,
    ToolShadowing,
    UnsafeDeserialization,
    ObfuscatedPayload,
    NetworkBackdoor,
    ExcessivePermissions,
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::CommandInjection => "command_injection",
            Self::HardcodedSecret => "hardcoded_secret",
            Self::ToolPoisoning => "tool_poisoning",
            Self::BaselineDrift => "baseline_drift",
            Self::ArbitraryCodeExecution => "arbitrary_code_execution",
            Self::PromptInjection => "prompt_injection",
            Self::DataExfiltration => "data_exfiltration",
            Self::ToolShadowing => "tool_shadowing",
            Self::UnsafeDeserialization => "unsafe_deserialization",
            Self::ObfuscatedPayload => "obfuscated_payload",
            Self::NetworkBackdoor => "network_backdoor",
            Self::ExcessivePermissions => "excessive_permissions",
        };
        write!(f, "{name}")
    }
}

impl Category {
    /// Parse an engine-reported category label. Accepts the snake_case
    /// canonical names and a few common aliases seen in engine output.
    pub fn parse(label: &str) -> Option<Self> {
        match label.to_ascii_lowercase().replace('-', "_").as_str() {
            "command_injection" | "shell_injection" => Some(Self::CommandInjection),
            "hardcoded_secret" | "secret" | "credential" => Some(Self::HardcodedSecret),
            "tool_poisoning" | "poisoning" => Some(Self::ToolPoisoning),
            "baseline_drift" => Some(Self::BaselineDrift),
            "arbitrary_code_execution" | "code_execution" | "ace" => {
                Some(Self::ArbitraryCodeExecution)
            }
            "prompt_injection" => Some(Self::PromptInjection),
            "data_exfiltration" | "exfiltration" => Some(Self::DataExfiltration),
            "tool_shadowing" | "shadowing" => Some(Self::ToolShadowing),
            "unsafe_deserialization" | "deserialization" => Some(Self::UnsafeDeserialization),
            "obfuscated_payload" | "obfuscation" => Some(Self::ObfuscatedPayload),
            "network_backdoor" | "backdoor" => Some(Self::NetworkBackdoor),
            "excessive_permissions" | "overprivileged" => Some(Self::ExcessivePermissions),
            _ => None,
        }
    }
}

/// Structured evidence contributed by one engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Evidence {
    pub source_engine: String,

    /// Engine-specific payload fragment backing the finding.
    pub detail: serde_json::Value,
}

/// Canonical unit of a detected issue, attached to one entity on one target.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Finding {
    pub id: String,

    pub source_engine: String,

    pub entity_type: EntityType,

    pub entity_name: String,

    pub target: String,

    pub category: Category,

    pub severity: Severity,

    pub description: String,

    pub evidence: serde_json::Value,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub remediation: Option<String>,
}

impl Finding {
    pub fn new(
        source_engine: impl Into<String>,
        entity_type: EntityType,
        entity_name: impl Into<String>,
        target: impl Into<String>,
        category: Category,
        severity: Severity,
        description: impl Into<String>,
    ) -> Self {
        let source_engine = source_engine.into();
        let entity_name = entity_name.into();
        let id = format!("{source_engine}:{entity_type}:{entity_name}:{category}");
        Self {
            id,
            source_engine,
            entity_type,
            entity_name,
            target: target.into(),
            category,
            severity,
            description: description.into(),
            evidence: serde_json::Value::Null,
            remediation: None,
        }
    }

    pub fn with_evidence(mut self, evidence: serde_json::Value) -> Self {
        self.evidence = evidence;
        self
    }

    pub fn with_remediation(mut self, remediation: impl Into<String>) -> Self {
        self.remediation = Some(remediation.into());
        self
    }

    /// Uniqueness key within one scan, before cross-engine merge.
    pub fn dedup_key(&self) -> (String, EntityType, String, Category) {
        (
            self.source_engine.clone(),
            self.entity_type,
            self.entity_name.clone(),
            self.category,
        )
    }

    /// Cross-engine grouping key used by the deduplicator.
    pub fn merge_key(&self) -> MergeKey {
        MergeKey {
            entity_type: self.entity_type,
            entity_name: self.entity_name.clone(),
            category: self.category,
        }
    }
}

/// Grouping key for cross-engine deduplication.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MergeKey {
    pub entity_type: EntityType,
    pub entity_name: String,
    pub category: Category,
}

/// One or more findings describing the same issue, collapsed across engines.
///
/// Severity is the maximum of the contributing findings and never decreases
/// under further merging.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergedFinding {
    pub entity_type: EntityType,

    pub entity_name: String,

    pub target: String,

    pub category: Category,

    pub severity: Severity,

    pub description: String,

    pub source_engines: Vec<String>,

    pub evidence: Vec<Evidence>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub remediation: Option<String>,
}

impl MergedFinding {
    /// Wrap a single finding as a merged record with one contributor.
    pub fn from_finding(finding: Finding) -> Self {
        Self {
            entity_type: finding.entity_type,
            entity_name: finding.entity_name,
            target: finding.target,
            category: finding.category,
            severity: finding.severity,
            description: finding.description,
            source_engines: vec![finding.source_engine.clone()],
            evidence: vec![Evidence {
                source_engine: finding.source_engine,
                detail: finding.evidence,
            }],
            remediation: finding.remediation,
        }
    }

    pub fn merge_key(&self) -> MergeKey {
        MergeKey {
            entity_type: self.entity_type,
            entity_name: self.entity_name.clone(),
            category: self.category,
        }
    }
}
