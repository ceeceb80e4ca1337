// src/install/mod.rs

//! Installer: walks a concrete forest in dependency order and builds
//! every node that is not already in the store
//!
//! Each node moves through Pending -> Queued -> Building -> Installed
//! or Failed. A node is ready when all of its build and link
//! dependencies are Installed. Builds run on a bounded pool of scoped
//! worker threads; results come back to the scheduler over an mpsc
//! channel, and the install database is only ever touched from the
//! scheduler thread. Hashes already recorded in the database are
//! reused without invoking the executor, which makes repeated installs
//! of the same forest idempotent.

pub mod lock;

use crate::config::InstallConfig;
use crate::dag;
use crate::db::{Database, DepRef, InstallRecord};
use crate::error::{Error, Result};
use crate::executor::BuildExecutor;
use crate::install::lock::BuildLock;
use crate::spec::{DepTypes, Spec};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use strum_macros::Display;
use tracing::{debug, info, warn};

/// Lifecycle of one node during an install run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum BuildState {
    Pending,
    Queued,
    Building,
    Installed,
    Failed,
}

/// Why a node ended up Failed
#[derive(Debug, Clone)]
pub enum FailureReason {
    /// The build itself failed
    Build(String),
    /// A transitive dependency failed, so the build never ran
    DependencyFailed(String),
    /// The run was aborted before this node was dispatched
    Aborted,
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureReason::Build(msg) => write!(f, "build failed: {}", msg),
            FailureReason::DependencyFailed(hash) => {
                write!(f, "dependency {} failed", dag::short_hash(hash))
            }
            FailureReason::Aborted => write!(f, "aborted"),
        }
    }
}

/// Outcome for one node of the forest
#[derive(Debug, Clone)]
pub struct NodeReport {
    pub name: String,
    pub version: String,
    pub hash: String,
    pub state: BuildState,
    pub prefix: PathBuf,
    /// Already present in the store, no build performed
    pub reused: bool,
    pub reason: Option<FailureReason>,
}

/// Summary of a whole install run, nodes in dependency order
#[derive(Debug, Default)]
pub struct InstallReport {
    pub nodes: Vec<NodeReport>,
}

impl InstallReport {
    pub fn succeeded(&self) -> bool {
        self.nodes.iter().all(|n| n.state == BuildState::Installed)
    }

    pub fn installed(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| n.state == BuildState::Installed && !n.reused)
            .count()
    }

    pub fn reused(&self) -> usize {
        self.nodes.iter().filter(|n| n.reused).count()
    }

    pub fn failed(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| n.state == BuildState::Failed)
            .count()
    }
}

/// Message from a worker back to the scheduler
enum WorkerResult {
    /// Build completed and the prefix passed the sanity check; the
    /// lock is held until the database record is committed
    Built { hash: String, lock: BuildLock },
    /// Another process installed the node while we waited on its lock
    Reused { hash: String },
    Failed { hash: String, error: Error },
}

/// Per-node bookkeeping on the scheduler thread
struct Node {
    spec: Spec,
    state: BuildState,
    reused: bool,
    reason: Option<FailureReason>,
    prefix: PathBuf,
    /// Hashes of build+link dependencies gating readiness
    gating: Vec<String>,
    /// Hashes of all non-test dependencies, recorded in the database
    deps: Vec<DepRef>,
}

pub struct Installer<'a> {
    config: &'a InstallConfig,
    db: &'a Database,
    abort: Arc<AtomicBool>,
}

impl<'a> Installer<'a> {
    pub fn new(config: &'a InstallConfig, db: &'a Database) -> Self {
        Self {
            config,
            db,
            abort: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Flag that stops dispatching new builds when set; in-flight
    /// builds run to completion
    pub fn abort_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.abort)
    }

    /// Install every node of the forest, children before parents
    pub fn install(
        &self,
        forest: &[Spec],
        executor: &dyn BuildExecutor,
    ) -> Result<InstallReport> {
        let ordered = dag::topological_order(forest, dag::hash_deptypes())?;
        let mut nodes: BTreeMap<String, Node> = BTreeMap::new();
        let mut order: Vec<String> = Vec::with_capacity(ordered.len());

        for spec in ordered {
            let hash = spec
                .hash
                .clone()
                .ok_or_else(|| Error::Metadata(format!("spec '{}' has no hash", spec.name)))?;
            let node = self.make_node(spec)?;
            order.push(hash.clone());
            nodes.insert(hash, node);
        }

        // Idempotence: anything already recorded skips its build
        for node in nodes.values_mut() {
            let hash = node.spec.hash.as_deref().unwrap_or_default();
            if self.db.is_installed(hash)? {
                debug!("{} already installed, reusing", node.spec.name);
                node.state = BuildState::Installed;
                node.reused = true;
            }
        }

        let jobs = self.config.jobs.max(1);
        let lock_dir = self.config.lock_dir();
        let lock_timeout = self.config.lock_timeout_ms;
        let db_path = self.config.db_path();

        std::thread::scope(|scope| -> Result<()> {
            let (tx, rx) = mpsc::channel::<WorkerResult>();
            let mut in_flight = 0usize;
            let mut stop_dispatch = false;

            loop {
                if self.abort.load(Ordering::Relaxed) {
                    stop_dispatch = true;
                }

                // Dispatch ready nodes in deterministic order
                if !stop_dispatch {
                    for hash in &order {
                        if !ready(&nodes, hash) {
                            continue;
                        }
                        if in_flight >= jobs {
                            // Ready but no worker slot free
                            if let Some(node) = nodes.get_mut(hash) {
                                node.state = BuildState::Queued;
                            }
                            continue;
                        }
                        let node = nodes.get_mut(hash).ok_or_else(corrupt_schedule)?;
                        node.state = BuildState::Building;
                        in_flight += 1;

                        let spec = node.spec.clone();
                        let prefix = node.prefix.clone();
                        let hash = hash.clone();
                        let tx = tx.clone();
                        let lock_dir = lock_dir.clone();
                        let db_path = db_path.clone();
                        info!("Building {}@{}", spec.name, display_version(&spec));
                        scope.spawn(move || {
                            let result = build_one(
                                executor,
                                &spec,
                                &prefix,
                                &lock_dir,
                                lock_timeout,
                                &db_path,
                            );
                            let message = match result {
                                Ok(Some(lock)) => WorkerResult::Built { hash, lock },
                                Ok(None) => WorkerResult::Reused { hash },
                                Err(error) => WorkerResult::Failed { hash, error },
                            };
                            // Receiver only disappears on scheduler error
                            let _ = tx.send(message);
                        });
                    }
                }

                if in_flight == 0 {
                    break;
                }

                // Block until a worker finishes
                let result = rx
                    .recv()
                    .map_err(|_| Error::Metadata("worker channel closed".to_string()))?;
                in_flight -= 1;

                match result {
                    WorkerResult::Built { hash, lock } => {
                        let node = nodes.get_mut(&hash).ok_or_else(corrupt_schedule)?;
                        let record = InstallRecord::new(
                            hash.clone(),
                            node.spec.name.clone(),
                            display_version(&node.spec),
                            node.prefix.clone(),
                            node.deps.clone(),
                        );
                        // Lock stays held until the record is visible
                        self.db.record_install(&record)?;
                        drop(lock);
                        node.state = BuildState::Installed;
                        info!("Installed {} at {}", node.spec.name, node.prefix.display());
                    }
                    WorkerResult::Reused { hash } => {
                        if let Some(node) = nodes.get_mut(&hash) {
                            debug!(
                                "{} installed by another process, reusing",
                                node.spec.name
                            );
                            node.state = BuildState::Installed;
                            node.reused = true;
                        }
                    }
                    WorkerResult::Failed { hash, error } => {
                        warn!("Build of {} failed: {}", dag::short_hash(&hash), error);
                        if let Some(node) = nodes.get_mut(&hash) {
                            node.state = BuildState::Failed;
                            node.reason = Some(FailureReason::Build(error.to_string()));
                        }
                        propagate_failure(&mut nodes, &order, &hash);
                        if !self.config.keep_going {
                            stop_dispatch = true;
                        }
                    }
                }
            }
            Ok(())
        })?;

        // Anything never dispatched was blocked by abort or fail-fast
        for node in nodes.values_mut() {
            if node.state == BuildState::Pending || node.state == BuildState::Queued {
                node.state = BuildState::Failed;
                if node.reason.is_none() {
                    node.reason = Some(FailureReason::Aborted);
                }
            }
        }

        let mut report = InstallReport::default();
        for hash in &order {
            if let Some(node) = nodes.get(hash) {
                report.nodes.push(NodeReport {
                    name: node.spec.name.clone(),
                    version: display_version(&node.spec),
                    hash: hash.clone(),
                    state: node.state,
                    prefix: node.prefix.clone(),
                    reused: node.reused,
                    reason: node.reason.clone(),
                });
            }
        }
        info!(
            "Install finished: {} built, {} reused, {} failed",
            report.installed(),
            report.reused(),
            report.failed()
        );
        Ok(report)
    }

    fn make_node(&self, spec: Spec) -> Result<Node> {
        let hash = spec.hash.as_deref().unwrap_or_default();
        let prefix = self.config.store.join(format!(
            "{}-{}-{}",
            spec.name,
            display_version(&spec),
            dag::short_hash(hash)
        ));
        let mut gating = Vec::new();
        let mut deps = Vec::new();
        for edge in spec.dependencies_of_type(dag::hash_deptypes()) {
            let dep_hash = edge.spec.hash.clone().ok_or_else(|| {
                Error::Metadata(format!("dependency '{}' has no hash", edge.spec.name))
            })?;
            if edge.deptypes.intersects(DepTypes::BUILD | DepTypes::LINK) {
                gating.push(dep_hash.clone());
            }
            deps.push(DepRef {
                name: edge.spec.name.clone(),
                hash: dep_hash,
            });
        }
        Ok(Node {
            spec,
            state: BuildState::Pending,
            reused: false,
            reason: None,
            prefix,
            gating,
            deps,
        })
    }
}

fn display_version(spec: &Spec) -> String {
    spec.version().map(|v| v.to_string()).unwrap_or_default()
}

fn corrupt_schedule() -> Error {
    Error::Metadata("install schedule lost track of a node".to_string())
}

/// Not yet started, with all build+link dependencies Installed
fn ready(nodes: &BTreeMap<String, Node>, hash: &str) -> bool {
    let Some(node) = nodes.get(hash) else {
        return false;
    };
    matches!(node.state, BuildState::Pending | BuildState::Queued)
        && node.gating.iter().all(|dep| {
            nodes
                .get(dep)
                .map(|d| d.state == BuildState::Installed)
                .unwrap_or(false)
        })
}

/// Mark every not-yet-started transitive dependent of `failed_hash`
/// as Failed; their builds never run
fn propagate_failure(nodes: &mut BTreeMap<String, Node>, order: &[String], failed_hash: &str) {
    // Order is topological, so one forward pass reaches all dependents
    for hash in order {
        let blocked = match nodes.get(hash) {
            Some(node)
                if matches!(node.state, BuildState::Pending | BuildState::Queued) =>
            {
                node.deps.iter().any(|dep| {
                    nodes
                        .get(&dep.hash)
                        .map(|d| d.state == BuildState::Failed)
                        .unwrap_or(false)
                })
            }
            _ => false,
        };
        if blocked {
            if let Some(node) = nodes.get_mut(hash) {
                node.state = BuildState::Failed;
                node.reason = Some(FailureReason::DependencyFailed(failed_hash.to_string()));
            }
        }
    }
}

/// Worker-side build: lock, re-check the database, build, sanity-check
/// the prefix; None means another process finished the node while we
/// waited on its lock
fn build_one(
    executor: &dyn BuildExecutor,
    spec: &Spec,
    prefix: &std::path::Path,
    lock_dir: &std::path::Path,
    lock_timeout_ms: u64,
    db_path: &std::path::Path,
) -> Result<Option<BuildLock>> {
    let hash = spec.hash.as_deref().unwrap_or_default();
    let lock = BuildLock::acquire(lock_dir, hash, lock_timeout_ms)?;

    // The record is only ever committed under this lock, so a hit here
    // is definitive
    if Database::open(db_path)?.is_installed(hash)? {
        return Ok(None);
    }

    executor.build(spec, prefix)?;

    // A successful build must leave a non-empty prefix behind
    let mut entries = std::fs::read_dir(prefix).map_err(|e| Error::Build {
        spec: spec.to_string(),
        message: format!("install prefix {} missing: {}", prefix.display(), e),
    })?;
    if entries.next().is_none() {
        return Err(Error::Build {
            spec: spec.to_string(),
            message: format!("install prefix {} is empty", prefix.display()),
        });
    }
    Ok(Some(lock))
}
