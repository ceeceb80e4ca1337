// src/config.rs

//! Solver and installer configuration
//!
//! Configuration is an explicit immutable value passed into every
//! concretize/install call; there is no process-wide config state. The
//! CLI loads it from a TOML file, tests build it directly.

use crate::error::{Error, Result};
use crate::spec::Arch;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Where a field assignment may come from, strongest first
///
/// The relative precedence of these sources is deliberately a configured
/// ordered list rather than a hard-coded rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PrecedenceRule {
    /// Explicit pin in the user's input spec
    UserPin,
    /// Requirement propagated from a depending package
    DependentRequirement,
    /// Site preference from this config
    ConfigPreference,
    /// The package's own declared default
    PackageDefault,
}

/// A compiler toolchain available on this site
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompilerDecl {
    pub name: String,
    pub version: String,
    /// Targets this toolchain can build for; empty = all targets
    #[serde(default)]
    pub targets: Vec<String>,
}

impl CompilerDecl {
    pub fn available_on(&self, target: &str) -> bool {
        self.targets.is_empty() || self.targets.iter().any(|t| t == target)
    }
}

/// Configuration consulted by the concretizer
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    /// Available compilers in preference order
    pub compilers: Vec<CompilerDecl>,
    /// Preferred providers per virtual name, in preference order
    pub providers: BTreeMap<String, Vec<String>>,
    /// Architecture filled into specs that leave components open
    pub platform: String,
    pub os: String,
    pub target: String,
    /// Tie-break precedence when sources of an assignment conflict
    pub precedence: Vec<PrecedenceRule>,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            compilers: vec![CompilerDecl {
                name: "gcc".to_string(),
                version: "13.2.0".to_string(),
                targets: Vec::new(),
            }],
            providers: BTreeMap::new(),
            platform: std::env::consts::OS.to_string(),
            os: "generic".to_string(),
            target: std::env::consts::ARCH.to_string(),
            precedence: vec![
                PrecedenceRule::UserPin,
                PrecedenceRule::DependentRequirement,
                PrecedenceRule::ConfigPreference,
                PrecedenceRule::PackageDefault,
            ],
        }
    }
}

impl SolverConfig {
    /// The architecture used to fill open components of abstract specs
    pub fn default_arch(&self) -> Arch {
        Arch::concrete(&self.platform, &self.os, &self.target)
    }

    /// Preferred providers for a virtual name (empty when unconfigured)
    pub fn preferred_providers(&self, virtual_name: &str) -> &[String] {
        self.providers
            .get(virtual_name)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }
}

/// Configuration consulted by the installer
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InstallConfig {
    /// Root of the install store; prefixes live at
    /// `<store>/<name>-<version>-<hash>`
    pub store: PathBuf,
    /// Worker pool size
    pub jobs: usize,
    /// How long to wait for another process's build lock
    pub lock_timeout_ms: u64,
    /// Continue independent branches after a failure
    pub keep_going: bool,
    /// Shell command run to build each node; the executor exports
    /// SMELT_SPEC, SMELT_PREFIX, SMELT_PACKAGE, SMELT_VERSION and
    /// SMELT_HASH. None means the executor only stages the prefix.
    pub build_command: Option<String>,
    /// Kill a build that runs longer than this
    pub build_timeout_ms: u64,
}

impl Default for InstallConfig {
    fn default() -> Self {
        let store = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("/var/lib"))
            .join("smelt")
            .join("store");
        Self {
            store,
            jobs: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
            lock_timeout_ms: 60_000,
            keep_going: true,
            build_command: None,
            build_timeout_ms: 3_600_000,
        }
    }
}

impl InstallConfig {
    pub fn db_path(&self) -> PathBuf {
        self.store.join("installs.db")
    }

    pub fn lock_dir(&self) -> PathBuf {
        self.store.join("locks")
    }
}

/// On-disk configuration file combining both sections
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub solver: SolverConfig,
    pub install: InstallConfig,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {}: {}", path.display(), e)))?;
        toml::from_str(&text)
            .map_err(|e| Error::Config(format!("invalid config {}: {}", path.display(), e)))
    }

    /// Load `path` when given, otherwise the default config
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::load(p),
            None => Ok(Self::default()),
        }
    }
}
