//! Concurrent engine dispatch.
//!
//! One scan fans the cross product of (available engines × accepted targets)
//! across a bounded worker pool. Every invocation reaches a terminal state on
//! its own: success, timeout, or error. Nothing an engine does can abort the
//! scan; the worst case is a degraded result and an entry in
//! `degraded_engines`.

use crate::core::{ScanConfig, ScanTarget};
use crate::engine::{EngineAdapter, EngineResult, EngineStatus};
use crate::error::EngineError;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, warn};

/// Everything the dispatch phase produced, including degradation metadata.
#[derive(Debug)]
pub struct DispatchOutcome {
    pub results: Vec<EngineResult>,

    /// Engines that were unavailable, timed out, or faulted at least once.
    pub degraded_engines: BTreeSet<String>,

    /// True when the overall scan deadline expired before every invocation
    /// finished.
    pub deadline_expired: bool,
}

pub struct Orchestrator {
    config: ScanConfig,
}

impl Orchestrator {
    pub fn new(config: ScanConfig) -> Self {
        Self { config }
    }

    /// Run every available engine against every target it accepts.
    ///
    /// Unavailable engines are skipped for the whole scan. Timed-out or
    /// failed invocations contribute a degraded `EngineResult` instead of
    /// a payload. On overall deadline expiry, outstanding invocations are
    /// cancelled and recorded as timeouts; completed results are kept.
    pub async fn dispatch(
        &self,
        engines: &[Arc<dyn EngineAdapter>],
        targets: &[ScanTarget],
    ) -> DispatchOutcome {
        let mut results = Vec::new();
        let mut degraded_engines = BTreeSet::new();

        let mut runnable: Vec<Arc<dyn EngineAdapter>> = Vec::new();
        for engine in engines {
            if engine.available() {
                runnable.push(engine.clone());
            } else {
                warn!(engine = engine.name(), "engine unavailable, skipping");
                degraded_engines.insert(engine.name().to_string());
                results.push(EngineResult::degraded(
                    engine.name(),
                    "*",
                    EngineStatus::Unavailable,
                    Duration::ZERO,
                    EngineError::Unavailable.to_string(),
                ));
            }
        }

        let semaphore = Arc::new(Semaphore::new(self.config.worker_limit(runnable.len())));
        let per_engine_timeout = self.config.engine_timeout;

        let mut pending: BTreeSet<(String, String)> = BTreeSet::new();
        let mut workers: JoinSet<EngineResult> = JoinSet::new();
        // Task id to (engine, target), so a panicked worker can still be
        // attributed to its pair.
        let mut pair_of: HashMap<tokio::task::Id, (String, String)> = HashMap::new();

        for engine in &runnable {
            for target in targets {
                if !engine.accepts(target.kind) {
                    continue;
                }
                let pair = (engine.name().to_string(), target.identity.clone());
                pending.insert(pair.clone());

                let engine = engine.clone();
                let target = Arc::new(target.clone());
                let semaphore = semaphore.clone();

                let handle = workers.spawn(async move {
                    // Acquire inside the task so spawning stays cheap and the
                    // pool bound applies to running invocations only.
                    let _permit = semaphore.acquire_owned().await;
                    invoke(engine, &target, per_engine_timeout).await
                });
                pair_of.insert(handle.id(), pair);
            }
        }

        let deadline = Instant::now() + self.config.scan_deadline;
        let mut deadline_expired = false;

        while !pending.is_empty() {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match tokio::time::timeout(remaining, workers.join_next_with_id()).await {
                Ok(Some(Ok((id, result)))) => {
                    pair_of.remove(&id);
                    pending.remove(&(result.engine.clone(), result.target.clone()));
                    if result.status != EngineStatus::Success {
                        degraded_engines.insert(result.engine.clone());
                    }
                    results.push(result);
                }
                Ok(Some(Err(join_error))) => {
                    // A panicking adapter degrades its pair like any other
                    // engine fault.
                    warn!(error = %join_error, "engine worker panicked");
                    if let Some((engine, target)) = pair_of.remove(&join_error.id()) {
                        pending.remove(&(engine.clone(), target.clone()));
                        degraded_engines.insert(engine.clone());
                        results.push(EngineResult::degraded(
                            engine,
                            target,
                            EngineStatus::Failed,
                            Duration::ZERO,
                            format!("engine worker panicked: {join_error}"),
                        ));
                    }
                }
                Ok(None) => break,
                Err(_) => {
                    deadline_expired = true;
                    break;
                }
            }
        }

        if !pending.is_empty() {
            warn!(
                outstanding = pending.len(),
                "scan deadline expired, cancelling outstanding invocations"
            );
            workers.abort_all();
            for (engine, target) in pending {
                degraded_engines.insert(engine.clone());
                results.push(EngineResult::degraded(
                    engine,
                    target,
                    EngineStatus::Timeout,
                    self.config.scan_deadline,
                    "cancelled at scan deadline",
                ));
            }
        }

        // Deterministic result order for downstream consumers and reports.
        results.sort_by(|a, b| (&a.engine, &a.target).cmp(&(&b.engine, &b.target)));

        DispatchOutcome {
            results,
            degraded_engines,
            deadline_expired,
        }
    }
}

async fn invoke(
    engine: Arc<dyn EngineAdapter>,
    target: &ScanTarget,
    timeout: Duration,
) -> EngineResult {
    let started = Instant::now();
    debug!(
        engine = engine.name(),
        target = target.identity,
        "invoking engine"
    );

    match tokio::time::timeout(timeout, engine.analyze(target)).await {
        Ok(Ok(payload)) => {
            EngineResult::success(engine.name(), &target.identity, started.elapsed(), payload)
        }
        Ok(Err(EngineError::Unavailable)) => EngineResult::degraded(
            engine.name(),
            &target.identity,
            EngineStatus::Unavailable,
            started.elapsed(),
            EngineError::Unavailable.to_string(),
        ),
        Ok(Err(error)) => EngineResult::degraded(
            engine.name(),
            &target.identity,
            EngineStatus::Failed,
            started.elapsed(),
            error.to_string(),
        ),
        Err(_) => EngineResult::degraded(
            engine.name(),
            &target.identity,
            EngineStatus::Timeout,
            started.elapsed(),
            EngineError::Timeout(timeout.as_secs()).to_string(),
        ),
    }
}
