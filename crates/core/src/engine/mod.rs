//! Engine adapter contract.
//!
//! Every detection engine (pattern matcher, secret detector, per-format
//! model parser, remote API) sits behind one capability trait. The adapter
//! owns two translations: its engine's invocation (process, library call,
//! network request) into `analyze`, and its engine's output schema into
//! `RawFinding`s. The orchestrator never looks inside an adapter; it only
//! relies on the contract and on adapters respecting cancellation.

pub mod process;
pub mod registry;

#[cfg(feature = "llm")]
pub mod llm;

use crate::core::{Category, EntityType, ScanTarget, Severity, TargetKind};
use crate::error::EngineError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Terminal state of one (engine, target) invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineStatus {
    Success,
    Timeout,
    Unavailable,
    Failed,
}

/// Raw output of one (engine, target) invocation. Transient; the normalizer
/// consumes it and it is never persisted.
#[derive(Debug, Clone)]
pub struct EngineResult {
    pub engine: String,
    pub target: String,
    pub status: EngineStatus,
    pub elapsed: Duration,
    pub payload: Option<serde_json::Value>,
    pub error: Option<String>,
}

impl EngineResult {
    pub fn success(
        engine: impl Into<String>,
        target: impl Into<String>,
        elapsed: Duration,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            engine: engine.into(),
            target: target.into(),
            status: EngineStatus::Success,
            elapsed,
            payload: Some(payload),
            error: None,
        }
    }

    pub fn degraded(
        engine: impl Into<String>,
        target: impl Into<String>,
        status: EngineStatus,
        elapsed: Duration,
        error: impl Into<String>,
    ) -> Self {
        Self {
            engine: engine.into(),
            target: target.into(),
            status,
            elapsed,
            payload: None,
            error: Some(error.into()),
        }
    }
}

/// Finding as the adapter's engine reported it, before severity
/// canonicalization. `severity` stays in the engine's native scale.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawFinding {
    pub entity_type: EntityType,
    pub entity_name: String,
    pub category: Category,
    pub severity: String,
    pub description: String,
    #[serde(default)]
    pub evidence: serde_json::Value,
    #[serde(default)]
    pub remediation: Option<String>,
}

/// Per-adapter mapping from an engine's native severity scale into the
/// canonical five levels. Lookup is case-insensitive; unknown values fall
/// back to `Medium` during normalization.
#[derive(Debug, Clone, Default)]
pub struct SeverityMap {
    entries: HashMap<String, Severity>,
}

impl SeverityMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, native: &str, canonical: Severity) -> Self {
        self.entries.insert(native.to_ascii_lowercase(), canonical);
        self
    }

    /// Identity mapping for engines that already report the canonical scale.
    pub fn canonical() -> Self {
        Self::new()
            .with("critical", Severity::Critical)
            .with("high", Severity::High)
            .with("medium", Severity::Medium)
            .with("low", Severity::Low)
            .with("info", Severity::Informational)
            .with("informational", Severity::Informational)
    }

    pub fn resolve(&self, native: &str) -> Option<Severity> {
        self.entries.get(&native.to_ascii_lowercase()).copied()
    }
}

/// Uniform capability interface over one external detection engine.
///
/// Adapters never treat "findings exist" as an error; findings are data.
/// Errors are reserved for the engine itself misbehaving.
#[async_trait]
pub trait EngineAdapter: Send + Sync {
    /// Registration name; also the `source_engine` on emitted findings.
    fn name(&self) -> &str;

    /// Which target kinds this engine understands.
    fn accepts(&self, kind: TargetKind) -> bool;

    /// Whether the underlying engine is installed/reachable. An unavailable
    /// engine is skipped for the whole scan, not failed.
    fn available(&self) -> bool {
        true
    }

    /// Run the engine against one target, returning its opaque payload.
    async fn analyze(&self, target: &ScanTarget) -> Result<serde_json::Value, EngineError>;

    /// Translate this engine's payload into raw findings. Only the adapter
    /// knows its engine's schema.
    fn translate(
        &self,
        payload: &serde_json::Value,
        target: &ScanTarget,
    ) -> Result<Vec<RawFinding>, EngineError>;

    /// Native-to-canonical severity mapping for this engine.
    fn severity_map(&self) -> SeverityMap {
        SeverityMap::canonical()
    }
}
