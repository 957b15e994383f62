//! `kansa engines`: list configured engines and their availability.

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use kansa_core::TargetKind;

#[derive(Args)]
pub struct EnginesArgs {
    /// External engine, repeatable: name=/path/to/binary.
    #[arg(long = "engine")]
    pub engines: Vec<String>,

    /// Include the LLM review engine in the listing.
    #[arg(long)]
    pub llm: bool,
}

pub fn execute(args: EnginesArgs) -> Result<()> {
    let registry = super::build_registry(&args.engines, args.llm)?;
    if registry.is_empty() {
        println!("No engines configured. Register one with --engine name=/path/to/binary");
        return Ok(());
    }

    for engine in registry.all() {
        let status = if engine.available() {
            "available".green()
        } else {
            "unavailable".red()
        };
        let kinds: Vec<&str> = [TargetKind::McpConfig, TargetKind::ModelFile]
            .iter()
            .filter(|kind| engine.accepts(**kind))
            .map(|kind| match kind {
                TargetKind::McpConfig => "mcp-config",
                TargetKind::ModelFile => "model-file",
            })
            .collect();
        println!(
            "{:<20} {:<12} accepts: {}",
            engine.name().bold(),
            status,
            kinds.join(", ")
        );
    }
    Ok(())
}
