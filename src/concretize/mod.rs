// src/concretize/mod.rs

//! Concretization: resolving abstract spec forests into concrete ones
//!
//! The concretizer is a pure function of (abstract specs, metadata
//! snapshot, solver config): no hidden state, deterministic output. It
//! either returns a forest where every node is fully assigned and hashed,
//! or fails with a structured conflict report.

mod conflict;
mod engine;

pub use conflict::{ConflictKind, ConflictReport, ConstraintSource};
pub use engine::COMMAND_LINE;

use crate::config::SolverConfig;
use crate::dag;
use crate::error::Result;
use crate::metadata::MetadataProvider;
use crate::spec::Spec;
use engine::Solver;
use tracing::info;

/// Resolve an abstract forest into a concrete, hashed one
///
/// Unification applies across the whole forest: every request for a given
/// package name collapses to a single concrete node satisfying all
/// requesters, or the solve fails citing the conflicting constraints.
pub fn concretize(
    roots: &[Spec],
    metadata: &impl MetadataProvider,
    config: &SolverConfig,
) -> Result<Vec<Spec>> {
    let solver = Solver::new(metadata, config);
    let mut forest = solver.solve(roots)?;
    dag::hash_forest(&mut forest)?;
    info!(roots = forest.len(), "concretization complete");
    Ok(forest)
}

/// Render a concrete spec as an indented dependency tree
pub fn render_tree(spec: &Spec) -> String {
    let mut out = String::new();
    render_node(spec, 0, &mut out);
    out
}

fn render_node(spec: &Spec, depth: usize, out: &mut String) {
    for _ in 0..depth {
        out.push_str("    ");
    }
    if depth > 0 {
        out.push('^');
    }
    let mut node = spec.clone();
    node.dependencies.clear();
    out.push_str(&node.to_string());
    if let Some(ref hash) = spec.hash {
        out.push_str(&format!("  [{}]", &hash[..8.min(hash.len())]));
    }
    out.push('\n');
    for edge in &spec.dependencies {
        render_node(&edge.spec, depth + 1, out);
    }
}
