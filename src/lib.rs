// src/lib.rs

//! smelt: a source-based package manager core
//!
//! smelt turns abstract dependency specs into concrete, content-hashed
//! build DAGs and drives their installation:
//!
//! - Specs: `name@version +variants %compiler ^deps`, abstract until the
//!   concretizer fills in every open field
//! - Concretizer: deterministic constraint solver with unification,
//!   virtual providers, and configurable precedence
//! - DAG: bottom-up SHA-256 hashing, hashes identify installs
//! - Installer: parallel bounded build orchestrator over a SQLite
//!   install database, idempotent by hash
//!
//! Build systems and fetching stay outside the core behind the
//! `MetadataProvider` and `BuildExecutor` traits.

pub mod cli;
pub mod commands;
pub mod concretize;
pub mod config;
pub mod dag;
pub mod db;
mod error;
pub mod executor;
pub mod install;
pub mod metadata;
pub mod provider;
pub mod spec;
pub mod version;

pub use concretize::{ConflictKind, ConflictReport, ConstraintSource, concretize};
pub use config::{Config, InstallConfig, SolverConfig};
pub use db::{Database, InstallRecord};
pub use error::{Error, Result};
pub use executor::{BuildExecutor, ShellExecutor};
pub use install::{BuildState, FailureReason, InstallReport, Installer};
pub use metadata::{MetadataProvider, MetadataSnapshot, PackageMetadata};
pub use provider::ProviderIndex;
pub use spec::{DepType, DepTypes, Spec, VariantValue};
pub use version::{Version, VersionConstraint};
