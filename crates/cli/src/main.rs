use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;
mod report;

use commands::{baseline::BaselineCommand, engines::EnginesArgs, scan::ScanArgs};

#[derive(Parser)]
#[command(name = "kansa")]
#[command(about = "Security scanning gate for MCP server configurations and model files")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan targets and evaluate the gate policy.
    Scan(ScanArgs),

    /// Manage approved baselines.
    Baseline {
        #[command(subcommand)]
        subcommand: BaselineCommand,
    },

    /// List configured engines and their availability.
    Engines(EnginesArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Scan(args) => {
            let runtime = tokio::runtime::Runtime::new()?;
            runtime.block_on(commands::scan::execute(args))
        }
        Commands::Baseline { subcommand } => subcommand.execute(),
        Commands::Engines(args) => commands::engines::execute(args),
    }
}
