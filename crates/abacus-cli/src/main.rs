mod cli;
mod commands;
mod fixtures;
mod observability;
mod output;

use anyhow::{Context, Result};
use clap::Parser;

use cli::{Cli, Commands};
use output::print_error;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        print_error(&format!("{e:#}"));
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let format = cli.format.unwrap_or_default();

    let config =
        abacus_config::load_config(cli.config.as_deref()).context("Failed to load configuration")?;
    observability::init_tracing(&config.logging.level);

    match &cli.command {
        Commands::Validate(args) => commands::validate::run(args, format)?,
        Commands::Check(args) => commands::check::run(args, config, format).await?,
        Commands::Ability(args) => commands::ability::run(args, config, format).await?,
    }

    Ok(())
}
