//! `kansa baseline`: approve and inspect baselines.

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use kansa_core::baseline::BaselineManager;
use kansa_core::entities::{extract_entities, EntityHashes};
use kansa_core::{BaselineStore, FileBaselineStore, TargetLoader, TargetRef};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Subcommand)]
pub enum BaselineCommand {
    /// Approve the current state of the given targets as the scope's baseline.
    Create {
        /// Scope name the baseline belongs to, e.g. a server identifier.
        scope: String,

        /// Files whose entities make up the snapshot.
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Recorded approver identity.
        #[arg(long, default_value = "cli")]
        approved_by: String,

        #[arg(long, default_value = ".kansa/baselines")]
        baseline_dir: PathBuf,
    },

    /// Show the baseline history for a scope.
    Show {
        scope: String,

        #[arg(long, default_value = ".kansa/baselines")]
        baseline_dir: PathBuf,
    },
}

impl BaselineCommand {
    pub fn execute(self) -> Result<()> {
        match self {
            Self::Create {
                scope,
                paths,
                approved_by,
                baseline_dir,
            } => create(&scope, &paths, &approved_by, &baseline_dir),
            Self::Show {
                scope,
                baseline_dir,
            } => show(&scope, &baseline_dir),
        }
    }
}

fn create(scope: &str, paths: &[PathBuf], approved_by: &str, baseline_dir: &Path) -> Result<()> {
    let refs: Vec<TargetRef> = paths
        .iter()
        .map(|p| TargetRef::new(p.to_string_lossy().into_owned()))
        .collect();
    let loaded = TargetLoader::new().load(&refs);
    for failure in &loaded.failures {
        eprintln!(
            "{} {}: {}",
            "warning:".yellow(),
            failure.reference,
            failure.reason
        );
    }
    if loaded.targets.is_empty() {
        anyhow::bail!("none of the given targets could be loaded");
    }

    let mut entities = EntityHashes::new();
    for target in &loaded.targets {
        entities.extend(extract_entities(target));
    }
    if entities.is_empty() {
        anyhow::bail!("no security-relevant entities found in the given targets");
    }

    let manager = BaselineManager::new(Arc::new(FileBaselineStore::new(baseline_dir)));
    let baseline = manager
        .create_baseline(scope, &entities, approved_by)
        .context("creating baseline")?;

    println!(
        "✅ Baseline {} approved for scope '{}' ({} entities)",
        baseline.id.bright_cyan(),
        scope,
        baseline.entries.len()
    );
    Ok(())
}

fn show(scope: &str, baseline_dir: &Path) -> Result<()> {
    let store = FileBaselineStore::new(baseline_dir);
    let baselines = store.list(scope).context("reading baselines")?;
    if baselines.is_empty() {
        println!("No baselines recorded for scope '{scope}'");
        return Ok(());
    }

    for baseline in &baselines {
        let marker = if baseline.active {
            "● active".green().to_string()
        } else {
            "○ superseded".dimmed().to_string()
        };
        println!(
            "{marker}  {}  approved by {} at {}",
            baseline.id,
            baseline.approved_by,
            baseline.created_at.format("%Y-%m-%d %H:%M:%S UTC")
        );
        for (identity, entry) in &baseline.entries {
            println!("    {identity}  {}", &entry.hash[..12.min(entry.hash.len())]);
        }
    }
    Ok(())
}
