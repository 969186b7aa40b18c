//! ContentCrew CLI: competitor keyword research and SEO content generation.
//!
//! Each subcommand runs one pipeline entry point against a per-user
//! workspace under the output directory.

mod commands;

use clap::Parser;
use color_eyre::eyre::{Result, eyre};

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    // Credentials usually live in a local .env file.
    dotenv::dotenv().ok();
    let cli = Cli::parse();
    commands::init_tracing(&cli);

    // Dropping the run future on Ctrl-C releases any held run lock.
    tokio::select! {
        result = commands::run(cli) => result,
        Ok(()) = tokio::signal::ctrl_c() => Err(eyre!("interrupted")),
    }
}
