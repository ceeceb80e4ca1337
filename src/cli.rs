// src/cli.rs
//! CLI definitions for smelt
//!
//! Command definitions live here; the implementations are in the
//! `commands` module.

use clap::{Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "smelt")]
#[command(version)]
#[command(about = "Source-based package manager core: concretizer and build orchestrator", long_about = None)]
pub struct Cli {
    /// Configuration file (TOML); defaults apply when omitted
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Resolve abstract specs into a concrete forest and print it
    Concretize {
        /// Abstract specs, e.g. 'app@2.0 +ssl ^zlib@1.2:'
        #[arg(required = true)]
        specs: Vec<String>,

        /// Package metadata file (TOML)
        #[arg(short, long)]
        metadata: PathBuf,
    },

    /// Concretize specs and build every node into the store
    Install {
        /// Abstract specs to install
        #[arg(required = true)]
        specs: Vec<String>,

        /// Package metadata file (TOML)
        #[arg(short, long)]
        metadata: PathBuf,

        /// Worker pool size
        #[arg(short, long)]
        jobs: Option<usize>,

        /// Stop dispatching new builds after the first failure
        #[arg(long)]
        fail_fast: bool,

        /// Install store root
        #[arg(long)]
        store: Option<PathBuf>,

        /// Show the build plan without building anything
        #[arg(long)]
        dry_run: bool,
    },

    /// List packages providing a virtual dependency
    Providers {
        /// Virtual name, e.g. 'mpi'
        virtual_name: String,

        /// Package metadata file (TOML)
        #[arg(short, long)]
        metadata: PathBuf,
    },

    /// Query the install database
    Find {
        /// NAME or NAME@VERSION-PREFIX; all installs when omitted
        query: Option<String>,

        /// Install store root
        #[arg(long)]
        store: Option<PathBuf>,
    },

    /// Initialize the install store and database
    Init {
        /// Install store root
        #[arg(long)]
        store: Option<PathBuf>,
    },

    /// Generate shell completion scripts
    Completions {
        /// Shell type
        #[arg(value_enum)]
        shell: Shell,
    },
}
