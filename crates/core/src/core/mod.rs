//! Core data model shared by every pipeline stage.

pub mod config;
pub mod finding;
pub mod severity;
pub mod target;

pub use config::ScanConfig;
pub use finding::{Category, EntityType, Evidence, Finding, MergeKey, MergedFinding};
pub use severity::Severity;
pub use target::{sha256_hex, ScanTarget, TargetKind};

pub use crate::policy::{GateResult, Policy, SeverityCount};
