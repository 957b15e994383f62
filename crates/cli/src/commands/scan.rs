//! `kansa scan`: run the pipeline and render the gate decision.

use crate::report::{self, OutputFormat};
use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use kansa_core::baseline::BaselineManager;
use kansa_core::{
    FileBaselineStore, Policy, ScanConfig, ScanPipeline, ScanRequest, TargetKind, TargetLoader,
    TargetRef,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use walkdir::WalkDir;

#[derive(Args)]
pub struct ScanArgs {
    /// Files or directories to scan. Directories are walked recursively.
    pub paths: Vec<PathBuf>,

    /// Also scan MCP configurations at their well-known locations.
    #[arg(long)]
    pub discover: bool,

    /// Treat every resolved target as this kind instead of inferring.
    #[arg(long, value_enum)]
    pub kind: Option<KindArg>,

    /// Policy file (JSON). Defaults to a HIGH severity threshold.
    #[arg(short, long)]
    pub policy: Option<PathBuf>,

    /// External engine, repeatable: name=/path/to/binary.
    #[arg(long = "engine")]
    pub engines: Vec<String>,

    /// Enable the LLM review engine (requires OPENAI_API_KEY).
    #[arg(long)]
    pub llm: bool,

    /// Baseline scope to check drift against.
    #[arg(long)]
    pub baseline_scope: Option<String>,

    /// Directory holding baseline files.
    #[arg(long, default_value = ".kansa/baselines")]
    pub baseline_dir: PathBuf,

    /// Per-engine timeout in seconds.
    #[arg(long, default_value_t = 60)]
    pub timeout: u64,

    /// Overall scan deadline in seconds.
    #[arg(long, default_value_t = 300)]
    pub deadline: u64,

    #[arg(long, value_enum, default_value = "console")]
    pub format: OutputFormat,
}

#[derive(Copy, Clone, PartialEq, Eq, clap::ValueEnum)]
pub enum KindArg {
    McpConfig,
    ModelFile,
}

impl From<KindArg> for TargetKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::McpConfig => TargetKind::McpConfig,
            KindArg::ModelFile => TargetKind::ModelFile,
        }
    }
}

pub async fn execute(args: ScanArgs) -> Result<()> {
    let policy = match &args.policy {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("reading policy {}", path.display()))?;
            Policy::from_json(&raw)?
        }
        None => Policy::default(),
    };

    let mut refs = collect_refs(&args);
    if args.discover {
        refs.extend(TargetLoader::discover_well_known());
    }
    if refs.is_empty() {
        anyhow::bail!("nothing to scan: pass paths or --discover");
    }

    let registry = super::build_registry(&args.engines, args.llm)?;
    let config = ScanConfig {
        engine_timeout: Duration::from_secs(args.timeout),
        scan_deadline: Duration::from_secs(args.deadline),
        ..ScanConfig::default()
    };

    let baselines = Arc::new(BaselineManager::new(Arc::new(FileBaselineStore::new(
        &args.baseline_dir,
    ))));
    let pipeline = ScanPipeline::new(registry)
        .with_config(config)
        .with_baselines(baselines);

    let outcome = pipeline
        .run_scan(ScanRequest {
            refs,
            policy,
            baseline_scope: args.baseline_scope.clone(),
            engines: None,
        })
        .await?;

    report::render(&outcome, args.format)?;

    if !outcome.degraded_engines.is_empty() {
        eprintln!(
            "{} {} engine(s) degraded: {}",
            "warning:".yellow(),
            outcome.degraded_engines.len(),
            outcome
                .degraded_engines
                .iter()
                .cloned()
                .collect::<Vec<_>>()
                .join(", ")
        );
    }
    if !outcome.gate.passed {
        // Non-zero exit is the gate signal for CI callers.
        std::process::exit(1);
    }
    Ok(())
}

fn collect_refs(args: &ScanArgs) -> Vec<TargetRef> {
    let mut refs = Vec::new();
    for path in &args.paths {
        if path.is_dir() {
            for entry in WalkDir::new(path)
                .into_iter()
                .filter_map(std::result::Result::ok)
                .filter(|e| e.file_type().is_file())
            {
                refs.push(make_ref(&entry.path().to_string_lossy(), args.kind));
            }
        } else {
            refs.push(make_ref(&path.to_string_lossy(), args.kind));
        }
    }
    refs
}

fn make_ref(reference: &str, kind: Option<KindArg>) -> TargetRef {
    let mut target_ref = TargetRef::new(reference);
    if let Some(kind) = kind {
        target_ref = target_ref.with_kind(kind.into());
    }
    target_ref
}
