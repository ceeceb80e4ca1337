// src/main.rs

use anyhow::Result;
use clap::Parser;
use smelt::cli::{Cli, Commands};
use smelt::commands;
use smelt::config::Config;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::load_or_default(cli.config.as_deref())?;

    match cli.command {
        Commands::Concretize { specs, metadata } => {
            commands::cmd_concretize(&specs, &metadata, &config)?;
        }
        Commands::Install {
            specs,
            metadata,
            jobs,
            fail_fast,
            store,
            dry_run,
        } => {
            commands::cmd_install(&specs, &metadata, jobs, fail_fast, store, dry_run, &config)?;
        }
        Commands::Providers {
            virtual_name,
            metadata,
        } => {
            commands::cmd_providers(&virtual_name, &metadata)?;
        }
        Commands::Find { query, store } => {
            commands::cmd_find(query.as_deref(), store, &config)?;
        }
        Commands::Init { store } => {
            commands::cmd_init(store, &config)?;
        }
        Commands::Completions { shell } => {
            commands::cmd_completions(shell)?;
        }
    }
    Ok(())
}
