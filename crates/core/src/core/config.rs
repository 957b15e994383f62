use std::time::Duration;

/// Tunables for one scan run.
#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// Maximum concurrent (engine, target) invocations. `None` bounds the
    /// pool by the number of registered engines.
    pub max_workers: Option<usize>,

    /// Per-invocation timeout. A timed-out invocation becomes a degraded
    /// result, not a scan failure.
    pub engine_timeout: Duration,

    /// Overall wall-clock bound for the dispatch phase. On expiry,
    /// outstanding invocations are cancelled and completed results are kept.
    pub scan_deadline: Duration,

    pub deduplication_enabled: bool,

    /// Baseline drift detection is opt-in per scope; this switches the
    /// whole step off regardless of scope.
    pub drift_enabled: bool,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            max_workers: None,
            engine_timeout: Duration::from_secs(60),
            scan_deadline: Duration::from_secs(300),
            deduplication_enabled: true,
            drift_enabled: true,
        }
    }
}

impl ScanConfig {
    pub fn worker_limit(&self, engine_count: usize) -> usize {
        self.max_workers.unwrap_or(engine_count).max(1)
    }
}
