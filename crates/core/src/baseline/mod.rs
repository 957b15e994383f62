//! Approved baselines and their storage.
//!
//! A baseline is the approved snapshot of a target scope's security-relevant
//! entities. At most one baseline is active per scope; creating a new one
//! deactivates (never deletes) its predecessor so the approval history stays
//! auditable. Stores only have to provide load/save/list plus whatever
//! locking their medium needs; scope-level write serialization lives in
//! `BaselineManager`.

pub mod drift;

use crate::core::sha256_hex;
use crate::entities::EntityHashes;
use crate::error::ScanError;
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// One approved entity snapshot inside a baseline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BaselineEntry {
    pub hash: String,
}

/// Approved snapshot of a target scope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Baseline {
    pub id: String,
    pub scope: String,
    pub entries: BTreeMap<String, BaselineEntry>,
    pub created_at: DateTime<Utc>,
    pub approved_by: String,
    pub active: bool,
}

/// Persistence contract for baselines. Implementations must make `save` an
/// upsert keyed by baseline id.
pub trait BaselineStore: Send + Sync {
    fn load_active(&self, scope: &str) -> Result<Option<Baseline>, ScanError>;

    fn save(&self, baseline: &Baseline) -> Result<(), ScanError>;

    fn list(&self, scope: &str) -> Result<Vec<Baseline>, ScanError>;
}

/// Wraps a store with per-scope write serialization so concurrent baseline
/// creation cannot produce two active baselines for one scope.
pub struct BaselineManager {
    store: Arc<dyn BaselineStore>,
    scope_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl BaselineManager {
    pub fn new(store: Arc<dyn BaselineStore>) -> Self {
        Self {
            store,
            scope_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn store(&self) -> &Arc<dyn BaselineStore> {
        &self.store
    }

    fn scope_lock(&self, scope: &str) -> Arc<Mutex<()>> {
        self.scope_locks
            .lock()
            .entry(scope.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Approve a new snapshot, deactivating any currently active baseline
    /// for the scope. The superseded baseline is retained for audit.
    pub fn create_baseline(
        &self,
        scope: &str,
        entities: &EntityHashes,
        approved_by: &str,
    ) -> Result<Baseline, ScanError> {
        let lock = self.scope_lock(scope);
        let _guard = lock.lock();

        if let Some(mut previous) = self.store.load_active(scope)? {
            previous.active = false;
            self.store.save(&previous)?;
            info!(
                scope,
                superseded = previous.id,
                "deactivated previous baseline"
            );
        }

        let created_at = Utc::now();
        let baseline = Baseline {
            id: format!("{scope}@{}", created_at.timestamp_millis()),
            scope: scope.to_string(),
            entries: entities
                .iter()
                .map(|(identity, hash)| (identity.clone(), BaselineEntry { hash: hash.clone() }))
                .collect(),
            created_at,
            approved_by: approved_by.to_string(),
            active: true,
        };
        self.store.save(&baseline)?;

        info!(scope, id = baseline.id, entries = baseline.entries.len(), "baseline created");
        Ok(baseline)
    }
}

/// In-memory store for tests and ephemeral runs.
#[derive(Default)]
pub struct MemoryBaselineStore {
    scopes: RwLock<HashMap<String, Vec<Baseline>>>,
}

impl MemoryBaselineStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl BaselineStore for MemoryBaselineStore {
    fn load_active(&self, scope: &str) -> Result<Option<Baseline>, ScanError> {
        Ok(self
            .scopes
            .read()
            .get(scope)
            .and_then(|baselines| baselines.iter().find(|b| b.active).cloned()))
    }

    fn save(&self, baseline: &Baseline) -> Result<(), ScanError> {
        let mut scopes = self.scopes.write();
        let baselines = scopes.entry(baseline.scope.clone()).or_default();
        match baselines.iter_mut().find(|b| b.id == baseline.id) {
            Some(existing) => *existing = baseline.clone(),
            None => baselines.push(baseline.clone()),
        }
        Ok(())
    }

    fn list(&self, scope: &str) -> Result<Vec<Baseline>, ScanError> {
        Ok(self.scopes.read().get(scope).cloned().unwrap_or_default())
    }
}

/// One JSON file per scope under a root directory.
pub struct FileBaselineStore {
    root: PathBuf,
}

impl FileBaselineStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn scope_path(&self, scope: &str) -> PathBuf {
        // Scopes can carry path separators; flatten them for the filename
        // and suffix with a hash of the raw scope so distinct scopes never
        // share a file.
        let safe: String = scope
            .chars()
            .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        let digest = sha256_hex(scope.as_bytes());
        self.root.join(format!("{safe}-{}.json", &digest[..8]))
    }

    fn read_scope(&self, scope: &str) -> Result<Vec<Baseline>, ScanError> {
        let path = self.scope_path(scope);
        if !path.exists() {
            return Ok(Vec::new());
        }
        let raw = std::fs::read_to_string(&path).map_err(|e| ScanError::Store(e.to_string()))?;
        serde_json::from_str(&raw).map_err(|e| ScanError::BaselineCorrupt {
            scope: scope.to_string(),
            reason: e.to_string(),
        })
    }

    fn write_scope(&self, scope: &str, baselines: &[Baseline]) -> Result<(), ScanError> {
        std::fs::create_dir_all(&self.root).map_err(|e| ScanError::Store(e.to_string()))?;
        let rendered = serde_json::to_string_pretty(baselines)
            .map_err(|e| ScanError::Store(e.to_string()))?;
        std::fs::write(self.scope_path(scope), rendered)
            .map_err(|e| ScanError::Store(e.to_string()))
    }
}

impl BaselineStore for FileBaselineStore {
    fn load_active(&self, scope: &str) -> Result<Option<Baseline>, ScanError> {
        Ok(self.read_scope(scope)?.into_iter().find(|b| b.active))
    }

    fn save(&self, baseline: &Baseline) -> Result<(), ScanError> {
        let mut baselines = self.read_scope(&baseline.scope)?;
        match baselines.iter_mut().find(|b| b.id == baseline.id) {
            Some(existing) => *existing = baseline.clone(),
            None => baselines.push(baseline.clone()),
        }
        self.write_scope(&baseline.scope, &baselines)
    }

    fn list(&self, scope: &str) -> Result<Vec<Baseline>, ScanError> {
        self.read_scope(scope)
    }
}
