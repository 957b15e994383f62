//! Adapter for engines invoked as external processes.
//!
//! The engine binary receives the target bytes on stdin and is expected to
//! print a JSON document on stdout:
//!
//! ```json
//! {"findings": [{"entity_type": "tool", "entity_name": "fetch",
//!                "category": "tool_poisoning", "severity": "error",
//!                "description": "..."}]}
//! ```
//!
//! Anything else on stdout is a `MalformedOutput` fault for that
//! invocation only.

use crate::core::{ScanTarget, TargetKind};
use crate::engine::{EngineAdapter, RawFinding, SeverityMap};
use crate::error::EngineError;
use async_trait::async_trait;
use serde::Deserialize;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct ProcessEngineConfig {
    /// Registration name for the adapter.
    pub name: String,

    /// Engine binary; resolved against PATH when not absolute.
    pub program: PathBuf,

    pub args: Vec<String>,

    pub kinds: Vec<TargetKind>,

    pub severity_map: SeverityMap,
}

/// Wraps one external engine binary behind the adapter contract.
pub struct ProcessEngine {
    config: ProcessEngineConfig,
}

#[derive(Deserialize)]
struct ProcessOutput {
    #[serde(default)]
    findings: Vec<RawFinding>,
}

impl ProcessEngine {
    pub fn new(config: ProcessEngineConfig) -> Self {
        Self { config }
    }

    fn resolve_program(&self) -> Option<PathBuf> {
        let program = &self.config.program;
        if program.is_absolute() {
            return program.exists().then(|| program.clone());
        }
        let path_var = std::env::var_os("PATH")?;
        std::env::split_paths(&path_var)
            .map(|dir| dir.join(program))
            .find(|candidate| candidate.exists())
    }
}

#[async_trait]
impl EngineAdapter for ProcessEngine {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn accepts(&self, kind: TargetKind) -> bool {
        self.config.kinds.contains(&kind)
    }

    fn available(&self) -> bool {
        self.resolve_program().is_some()
    }

    async fn analyze(&self, target: &ScanTarget) -> Result<serde_json::Value, EngineError> {
        let program = self.resolve_program().ok_or(EngineError::Unavailable)?;

        debug!(
            engine = self.config.name,
            target = target.identity,
            program = %program.display(),
            "spawning engine process"
        );

        let mut child = Command::new(&program)
            .args(&self.config.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| EngineError::Internal(format!("spawn failed: {e}")))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(&target.content)
                .await
                .map_err(|e| EngineError::Internal(format!("stdin write failed: {e}")))?;
            drop(stdin);
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| EngineError::Internal(format!("wait failed: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(EngineError::Internal(format!(
                "exit status {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        serde_json::from_slice(&output.stdout)
            .map_err(|e| EngineError::MalformedOutput(e.to_string()))
    }

    fn translate(
        &self,
        payload: &serde_json::Value,
        _target: &ScanTarget,
    ) -> Result<Vec<RawFinding>, EngineError> {
        let parsed: ProcessOutput = serde_json::from_value(payload.clone())
            .map_err(|e| EngineError::MalformedOutput(e.to_string()))?;
        Ok(parsed.findings)
    }

    fn severity_map(&self) -> SeverityMap {
        self.config.severity_map.clone()
    }
}
