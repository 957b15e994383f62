use thiserror::Error;

/// Failures scoped to a single engine invocation.
///
/// None of these abort a scan; the orchestrator records them on the
/// corresponding `EngineResult` and moves on.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("engine not installed or configured")]
    Unavailable,

    #[error("engine timed out after {0} seconds")]
    Timeout(u64),

    #[error("engine reported an internal fault: {0}")]
    Internal(String),

    #[error("engine produced unparseable output: {0}")]
    MalformedOutput(String),
}

/// Scan-level error taxonomy.
///
/// Only configuration problems (`PolicyInvalid`, `NoTargets`) propagate to
/// the caller; everything scoped to one target, engine, or baseline scope
/// degrades gracefully and surfaces as metadata on the scan outcome.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("target not found: {0}")]
    TargetNotFound(String),

    #[error("target unreadable: {reference}: {reason}")]
    TargetUnreadable { reference: String, reason: String },

    #[error("no targets could be resolved")]
    NoTargets,

    #[error("baseline for scope '{scope}' is corrupt: {reason}")]
    BaselineCorrupt { scope: String, reason: String },

    #[error("invalid policy: {0}")]
    PolicyInvalid(String),

    #[error("baseline store error: {0}")]
    Store(String),
}
