// tests/common/mod.rs

//! Shared fixtures for integration tests.

#![allow(dead_code)]

use smelt::config::{Config, InstallConfig};
use smelt::executor::BuildExecutor;
use smelt::metadata::{MetadataSnapshot, PackageMetadata, VariantDecl};
use smelt::spec::{DepTypes, Spec};
use smelt::{Error, Result};
use std::path::Path;
use std::sync::Mutex;
use tempfile::TempDir;

/// A small package universe: app depends on the mpi virtual and zlib,
/// openmpi and mpich provide mpi, openmpi pulls in hwloc.
pub fn mpi_universe() -> MetadataSnapshot {
    MetadataSnapshot::new()
        .with(
            PackageMetadata::new("app")
                .with_version("1.0")
                .with_version("2.0")
                .with_variant(VariantDecl::boolean("ssl", false))
                .with_dependency("mpi", DepTypes::default_types())
                .with_dependency("zlib@1.2:", DepTypes::default_types()),
        )
        .with(
            PackageMetadata::new("openmpi")
                .with_version("4.1.5")
                .with_version("4.1.6")
                .with_dependency("hwloc", DepTypes::default_types())
                .with_provides("mpi"),
        )
        .with(
            PackageMetadata::new("mpich")
                .with_version("4.2.0")
                .with_provides("mpi"),
        )
        .with(PackageMetadata::new("hwloc").with_version("2.9.0"))
        .with(
            PackageMetadata::new("zlib")
                .with_version("1.2.13")
                .with_version("1.3.1"),
        )
}

/// The mpi universe as a metadata TOML file on disk, for CLI-facing tests
pub fn write_mpi_universe(dir: &Path) -> std::path::PathBuf {
    let path = dir.join("packages.toml");
    std::fs::write(
        &path,
        r#"
[packages.app]
versions = ["1.0", "2.0"]
variants = [{ name = "ssl", default = false }]
dependencies = [{ spec = "mpi" }, { spec = "zlib@1.2:" }]

[packages.openmpi]
versions = ["4.1.5", "4.1.6"]
dependencies = [{ spec = "hwloc" }]
provides = ["mpi"]

[packages.mpich]
versions = ["4.2.0"]
provides = ["mpi"]

[packages.hwloc]
versions = ["2.9.0"]

[packages.zlib]
versions = ["1.2.13", "1.3.1"]
"#,
    )
    .unwrap();
    path
}

/// A scratch store plus an install config pointing at it.
///
/// Returns (TempDir, config) - keep the TempDir alive to prevent cleanup.
pub fn test_store() -> (TempDir, InstallConfig) {
    let temp_dir = tempfile::tempdir().unwrap();
    let config = InstallConfig {
        store: temp_dir.path().join("store"),
        jobs: 2,
        lock_timeout_ms: 2_000,
        keep_going: true,
        build_command: None,
        build_timeout_ms: 10_000,
    };
    (temp_dir, config)
}

pub fn default_config() -> Config {
    Config::default()
}

/// Executor that records which packages it built and can be told to
/// fail specific ones.
pub struct CountingExecutor {
    built: Mutex<Vec<String>>,
    fail: Vec<String>,
}

impl CountingExecutor {
    pub fn new() -> Self {
        Self {
            built: Mutex::new(Vec::new()),
            fail: Vec::new(),
        }
    }

    pub fn failing(names: &[&str]) -> Self {
        Self {
            built: Mutex::new(Vec::new()),
            fail: names.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn built(&self) -> Vec<String> {
        self.built.lock().unwrap().clone()
    }

    pub fn build_count(&self) -> usize {
        self.built.lock().unwrap().len()
    }
}

impl Default for CountingExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl BuildExecutor for CountingExecutor {
    fn build(&self, spec: &Spec, prefix: &Path) -> Result<()> {
        if self.fail.contains(&spec.name) {
            return Err(Error::Build {
                spec: spec.to_string(),
                message: "synthetic failure".to_string(),
            });
        }
        std::fs::create_dir_all(prefix)?;
        std::fs::write(prefix.join("receipt"), &spec.name)?;
        self.built.lock().unwrap().push(spec.name.clone());
        Ok(())
    }
}
