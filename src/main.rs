//! iATW command-line interface
//!
//! ```bash
//! iatw inspect --problem problem.toml
//! iatw evaluate --problem problem.yaml --json
//! iatw fit --problem problem.toml --max-iterations 500 --output report.json
//! ```

use anyhow::Result;
use clap::Parser;

use iatw::cli::{commands, Cli, Commands};

/// Main entry point for the iATW CLI application
fn main() -> Result<()> {
    let cli = Cli::parse();
    let overrides = cli.overrides();

    match cli.command {
        Commands::Inspect(args) => commands::inspect(args, overrides),
        Commands::Evaluate(args) => commands::evaluate(args, overrides),
        Commands::Fit(args) => commands::fit(args, overrides),
    }
}
