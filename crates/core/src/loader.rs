//! Target resolution.
//!
//! Turns logical references (paths, discovery requests) into concrete,
//! hashed `ScanTarget`s. Fetching bytes is delegated to `TargetFetcher`
//! collaborators so remote sources and their auth concerns stay outside the
//! core; the loader only orchestrates resolution, kind inference, and
//! hashing. A reference that fails to resolve degrades that reference only.

use crate::core::{ScanTarget, TargetKind};
use crate::error::ScanError;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// One logical reference to scan.
#[derive(Debug, Clone)]
pub struct TargetRef {
    pub reference: String,

    /// Explicit kind; inferred from the reference when absent.
    pub kind: Option<TargetKind>,
}

impl TargetRef {
    pub fn new(reference: impl Into<String>) -> Self {
        Self {
            reference: reference.into(),
            kind: None,
        }
    }

    pub fn with_kind(mut self, kind: TargetKind) -> Self {
        self.kind = Some(kind);
        self
    }
}

/// A reference the loader could not resolve, reported on the scan outcome.
#[derive(Debug, Clone)]
pub struct TargetFailure {
    pub reference: String,
    pub reason: String,
}

/// Byte-fetching collaborator. `fetch` returns the raw content plus a
/// stable identity string for the reference.
pub trait TargetFetcher: Send + Sync {
    /// Whether this fetcher understands the reference.
    fn handles(&self, reference: &str) -> bool;

    fn fetch(&self, reference: &str) -> Result<(String, Vec<u8>), ScanError>;
}

/// Local filesystem fetcher.
pub struct FileFetcher;

impl TargetFetcher for FileFetcher {
    fn handles(&self, reference: &str) -> bool {
        !reference.contains("://")
    }

    fn fetch(&self, reference: &str) -> Result<(String, Vec<u8>), ScanError> {
        let path = Path::new(reference);
        if !path.exists() {
            return Err(ScanError::TargetNotFound(reference.to_string()));
        }
        let content = std::fs::read(path).map_err(|e| ScanError::TargetUnreadable {
            reference: reference.to_string(),
            reason: e.to_string(),
        })?;
        Ok((reference.to_string(), content))
    }
}

pub struct TargetLoader {
    fetchers: Vec<Box<dyn TargetFetcher>>,
}

#[derive(Debug, Default)]
pub struct LoadedTargets {
    pub targets: Vec<ScanTarget>,
    pub failures: Vec<TargetFailure>,
}

impl TargetLoader {
    pub fn new() -> Self {
        Self {
            fetchers: vec![Box::new(FileFetcher)],
        }
    }

    pub fn with_fetcher(mut self, fetcher: Box<dyn TargetFetcher>) -> Self {
        self.fetchers.push(fetcher);
        self
    }

    /// Resolve references in order. Failures degrade the affected reference
    /// only; resolving nothing at all is the caller's fatal condition.
    pub fn load(&self, refs: &[TargetRef]) -> LoadedTargets {
        let mut loaded = LoadedTargets::default();

        for target_ref in refs {
            let Some(fetcher) = self
                .fetchers
                .iter()
                .find(|f| f.handles(&target_ref.reference))
            else {
                warn!(reference = target_ref.reference, "no fetcher for reference");
                loaded.failures.push(TargetFailure {
                    reference: target_ref.reference.clone(),
                    reason: "no fetcher handles this reference".to_string(),
                });
                continue;
            };

            match fetcher.fetch(&target_ref.reference) {
                Ok((identity, content)) => {
                    let kind = target_ref
                        .kind
                        .unwrap_or_else(|| TargetKind::infer(&identity));
                    debug!(identity, %kind, bytes = content.len(), "target resolved");
                    loaded.targets.push(ScanTarget::new(identity, kind, content));
                }
                Err(error) => {
                    warn!(reference = target_ref.reference, %error, "target failed to resolve");
                    loaded.failures.push(TargetFailure {
                        reference: target_ref.reference.clone(),
                        reason: error.to_string(),
                    });
                }
            }
        }

        loaded
    }

    /// Enumerate MCP configurations at their well-known locations. Pure
    /// enumeration: missing paths are skipped silently, per contract.
    pub fn discover_well_known() -> Vec<TargetRef> {
        well_known_config_paths()
            .into_iter()
            .filter(|p| p.exists())
            .map(|p| TargetRef::new(p.to_string_lossy().into_owned()).with_kind(TargetKind::McpConfig))
            .collect()
    }
}

impl Default for TargetLoader {
    fn default() -> Self {
        Self::new()
    }
}

fn well_known_config_paths() -> Vec<PathBuf> {
    let Some(home) = std::env::var_os("HOME").map(PathBuf::from) else {
        return Vec::new();
    };
    vec![
        home.join(".config/claude/claude_desktop_config.json"),
        home.join("Library/Application Support/Claude/claude_desktop_config.json"),
        home.join(".cursor/mcp.json"),
        home.join(".codeium/windsurf/mcp_config.json"),
        home.join(".vscode/mcp.json"),
    ]
}
