//! crmvault - snapshot backup and restore for CRM table data
//!
//! Main binary entry point for the command-line interface.

use anyhow::Context;
use clap::Parser;
use crmvault::cli::{self, Cli, Commands};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Cli::parse();
    init_logging(args.verbose);

    let service = cli::build_service(&args.config)
        .await
        .context("failed to initialize the backup service")?;

    match args.command {
        Commands::Backup(cmd) => cli::backup::run(&service, cmd).await?,
        Commands::Restore(cmd) => cli::restore::run(&service, cmd).await?,
        Commands::List(cmd) => cli::list::run(&service, cmd).await?,
        Commands::Cleanup => cli::cleanup::run(&service).await?,
        Commands::Verify(cmd) => cli::verify::run(&service, cmd).await?,
    }

    Ok(())
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("crmvault=debug")
    } else {
        EnvFilter::new("crmvault=info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}
