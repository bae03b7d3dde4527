mod cli;
mod cli_utils;
mod commands;

use anyhow::Result;
use clap::Parser;

use cli::{Cli, Commands};
use commands::run::Mode;

fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Initialize structured logging
    vw_executor::logging::init(cli.command.log_level());

    // Dispatch to appropriate command handler
    match &cli.command {
        Commands::Train(args) => commands::run::run(args, Mode::Train),
        Commands::Test(args) => commands::run::run(args, Mode::Test),
        Commands::Cache(args) => commands::cache::cache(args),
    }
}
