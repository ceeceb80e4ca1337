// build.rs

use clap::{Arg, Command};
use clap_mangen::Man;
use std::env;
use std::fs;
use std::path::PathBuf;

/// Common argument: package metadata file
fn metadata_arg() -> Arg {
    Arg::new("metadata")
        .short('m')
        .long("metadata")
        .value_name("FILE")
        .required(true)
        .help("Package metadata file (TOML)")
}

/// Common argument: install store root
fn store_arg() -> Arg {
    Arg::new("store")
        .long("store")
        .value_name("DIR")
        .help("Install store root")
}

fn build_cli() -> Command {
    Command::new("smelt")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Source-based package manager core: concretizer and build orchestrator")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .global(true)
                .help("Configuration file (TOML)"),
        )
        .subcommand(
            Command::new("concretize")
                .about("Resolve abstract specs into a concrete forest and print it")
                .arg(
                    Arg::new("specs")
                        .required(true)
                        .num_args(1..)
                        .help("Abstract specs"),
                )
                .arg(metadata_arg()),
        )
        .subcommand(
            Command::new("install")
                .about("Concretize specs and build every node into the store")
                .arg(
                    Arg::new("specs")
                        .required(true)
                        .num_args(1..)
                        .help("Abstract specs to install"),
                )
                .arg(metadata_arg())
                .arg(
                    Arg::new("jobs")
                        .short('j')
                        .long("jobs")
                        .value_name("N")
                        .help("Worker pool size"),
                )
                .arg(
                    Arg::new("fail_fast")
                        .long("fail-fast")
                        .action(clap::ArgAction::SetTrue)
                        .help("Stop dispatching new builds after the first failure"),
                )
                .arg(store_arg())
                .arg(
                    Arg::new("dry_run")
                        .long("dry-run")
                        .action(clap::ArgAction::SetTrue)
                        .help("Show the build plan without building anything"),
                ),
        )
        .subcommand(
            Command::new("providers")
                .about("List packages providing a virtual dependency")
                .arg(Arg::new("virtual_name").required(true).help("Virtual name"))
                .arg(metadata_arg()),
        )
        .subcommand(
            Command::new("find")
                .about("Query the install database")
                .arg(Arg::new("query").help("NAME or NAME@VERSION-PREFIX"))
                .arg(store_arg()),
        )
        .subcommand(
            Command::new("init")
                .about("Initialize the install store and database")
                .arg(store_arg()),
        )
        .subcommand(
            Command::new("completions")
                .about("Generate shell completion scripts")
                .arg(
                    Arg::new("shell")
                        .required(true)
                        .value_parser(["bash", "zsh", "fish", "powershell"])
                        .help("Shell type"),
                ),
        )
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    let manifest_dir = match env::var("CARGO_MANIFEST_DIR") {
        Ok(dir) => PathBuf::from(dir),
        Err(e) => {
            println!("cargo:warning=CARGO_MANIFEST_DIR not set: {}", e);
            return;
        }
    };
    let man_dir = manifest_dir.join("man");

    if let Err(e) = fs::create_dir_all(&man_dir) {
        println!("cargo:warning=Failed to create man directory: {}", e);
        return;
    }

    let cmd = build_cli();
    let man = Man::new(cmd);
    let mut buffer = Vec::new();

    if let Err(e) = man.render(&mut buffer) {
        println!("cargo:warning=Failed to render man page: {}", e);
        return;
    }

    let man_path = man_dir.join("smelt.1");
    if let Err(e) = fs::write(&man_path, buffer) {
        println!("cargo:warning=Failed to write man page: {}", e);
    }
}
