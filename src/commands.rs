// src/commands.rs
//! Command handlers for the smelt CLI

use crate::cli::Cli;
use crate::concretize::{self, COMMAND_LINE};
use crate::config::Config;
use crate::dag;
use crate::db::Database;
use crate::error::{Error, Result};
use crate::executor::ShellExecutor;
use crate::install::{BuildState, Installer};
use crate::metadata::MetadataSnapshot;
use crate::provider::ProviderIndex;
use crate::spec::{Spec, parser};
use clap::CommandFactory;
use clap_complete::Shell;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

/// Parse the CLI spec arguments as one forest
fn parse_roots(specs: &[String]) -> Result<Vec<Spec>> {
    parser::parse_forest(&specs.join(" "))
}

pub fn cmd_concretize(specs: &[String], metadata_path: &Path, config: &Config) -> Result<()> {
    let roots = parse_roots(specs)?;
    let metadata = MetadataSnapshot::load(metadata_path)?;
    let forest = concretize::concretize(&roots, &metadata, &config.solver)?;

    for root in &forest {
        print!("{}", concretize::render_tree(root));
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
pub fn cmd_install(
    specs: &[String],
    metadata_path: &Path,
    jobs: Option<usize>,
    fail_fast: bool,
    store: Option<PathBuf>,
    dry_run: bool,
    config: &Config,
) -> Result<()> {
    let mut install_config = config.install.clone();
    if let Some(jobs) = jobs {
        install_config.jobs = jobs;
    }
    if fail_fast {
        install_config.keep_going = false;
    }
    if let Some(store) = store {
        install_config.store = store;
    }

    let roots = parse_roots(specs)?;
    let metadata = MetadataSnapshot::load(metadata_path)?;
    let forest = concretize::concretize(&roots, &metadata, &config.solver)?;

    if dry_run {
        let ordered = dag::topological_order(&forest, dag::hash_deptypes())?;
        let db = Database::open(&install_config.db_path())?;
        println!("Build plan ({} nodes):", ordered.len());
        for spec in &ordered {
            let hash = spec.hash.as_deref().unwrap_or_default();
            let marker = if db.is_installed(hash)? {
                "reuse"
            } else {
                "build"
            };
            println!("  [{}] {}  {}", marker, spec_label(spec), dag::short_hash(hash));
        }
        return Ok(());
    }

    let db = Database::open(&install_config.db_path())?;
    let executor = ShellExecutor::new(
        install_config.build_command.clone(),
        Duration::from_millis(install_config.build_timeout_ms),
    );
    let installer = Installer::new(&install_config, &db);
    let report = installer.install(&forest, &executor)?;

    for node in &report.nodes {
        match node.state {
            BuildState::Installed if node.reused => {
                println!("  reused     {}  {}", node.name, dag::short_hash(&node.hash));
            }
            BuildState::Installed => {
                println!("  installed  {}  {}", node.name, node.prefix.display());
            }
            _ => {
                let reason = node
                    .reason
                    .as_ref()
                    .map(|r| r.to_string())
                    .unwrap_or_else(|| "unknown".to_string());
                println!("  failed     {}  ({})", node.name, reason);
            }
        }
    }

    if !report.succeeded() {
        let first = report
            .nodes
            .iter()
            .find(|n| n.state == BuildState::Failed)
            .map(|n| n.name.clone())
            .unwrap_or_default();
        return Err(Error::Build {
            spec: first,
            message: format!("{} of {} nodes failed", report.failed(), report.nodes.len()),
        });
    }
    Ok(())
}

pub fn cmd_providers(virtual_name: &str, metadata_path: &Path) -> Result<()> {
    let metadata = MetadataSnapshot::load(metadata_path)?;
    let index = ProviderIndex::rebuild(&metadata);

    if !index.is_virtual(virtual_name) {
        return Err(Error::MissingProvider {
            virtual_name: virtual_name.to_string(),
            requester: COMMAND_LINE.to_string(),
        });
    }
    for provider in index.providers_of(virtual_name) {
        println!("{}", provider);
    }
    Ok(())
}

pub fn cmd_find(query: Option<&str>, store: Option<PathBuf>, config: &Config) -> Result<()> {
    let mut install_config = config.install.clone();
    if let Some(store) = store {
        install_config.store = store;
    }
    let db = Database::open(&install_config.db_path())?;

    let records = match query {
        Some(query) => {
            let (name, prefix) = match query.split_once('@') {
                Some((name, prefix)) => (name, Some(prefix)),
                None => (query, None),
            };
            db.find_by_name(name, prefix)?
        }
        None => db.all()?,
    };

    if records.is_empty() {
        println!("No matching installs");
        return Ok(());
    }
    for record in records {
        println!(
            "{}@{}  {}  {}",
            record.name,
            record.version,
            dag::short_hash(&record.hash),
            record.path.display()
        );
    }
    Ok(())
}

pub fn cmd_init(store: Option<PathBuf>, config: &Config) -> Result<()> {
    let mut install_config = config.install.clone();
    if let Some(store) = store {
        install_config.store = store;
    }
    std::fs::create_dir_all(&install_config.store)?;
    std::fs::create_dir_all(install_config.lock_dir())?;
    Database::open(&install_config.db_path())?;
    info!("Store initialized at {}", install_config.store.display());
    println!("Store initialized at {}", install_config.store.display());
    Ok(())
}

pub fn cmd_completions(shell: Shell) -> Result<()> {
    let mut cmd = Cli::command();
    clap_complete::generate(shell, &mut cmd, "smelt", &mut std::io::stdout());
    Ok(())
}

fn spec_label(spec: &Spec) -> String {
    let mut node = spec.clone();
    node.dependencies.clear();
    node.hash = None;
    node.to_string()
}
