//! Kansa Core - Scan Orchestration for MCP Servers and Model Files
//!
//! This crate provides the orchestration core of a security-scanning
//! platform: it loads scan targets, fans them out across pluggable
//! detection engines with isolation and timeouts, normalizes and
//! deduplicates the engines' findings, detects drift from an approved
//! baseline, and evaluates a declarative policy into a single pass/fail
//! gate decision. The detection engines themselves are external
//! collaborators behind the `EngineAdapter` trait.

pub mod baseline;
pub mod core;
pub mod dedup;
pub mod engine;
pub mod entities;
pub mod error;
pub mod loader;
pub mod normalize;
pub mod orchestrator;
pub mod policy;
pub mod scan;

pub use crate::core::{
    Category, EntityType, Evidence, Finding, GateResult, MergedFinding, Policy, ScanConfig,
    ScanTarget, Severity, SeverityCount, TargetKind,
};

pub use baseline::drift::{ChangeType, DriftRecord};
pub use baseline::{Baseline, BaselineManager, BaselineStore, FileBaselineStore, MemoryBaselineStore};
pub use dedup::{DedupStats, Deduplicator};
pub use engine::registry::{EngineRegistry, EngineRegistryBuilder};
pub use engine::{EngineAdapter, EngineResult, EngineStatus, RawFinding, SeverityMap};
pub use error::{EngineError, ScanError};
pub use loader::{TargetFetcher, TargetLoader, TargetRef};
pub use orchestrator::{DispatchOutcome, Orchestrator};
pub use scan::{ScanOutcome, ScanPipeline, ScanRequest, ScanState};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
