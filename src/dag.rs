// src/dag.rs

//! DAG assembly: content hashing and build ordering for concrete forests
//!
//! A concrete spec's hash is a SHA-256 digest over its canonical
//! serialization: name, version, sorted variants, compiler, architecture,
//! then the (name, hash) pairs of its build|link|run dependencies sorted
//! by name. test-only edges are excluded, so adding or removing a test
//! dependency never changes installed identity. The hash is a pure
//! function of the subgraph: structurally identical subgraphs hash
//! identically regardless of construction order.

use crate::error::{Error, Result};
use crate::spec::{DepTypes, Spec, VariantValue};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// Deptypes that contribute to installed identity
pub fn hash_deptypes() -> DepTypes {
    DepTypes::BUILD | DepTypes::LINK | DepTypes::RUN
}

/// Display/store-path form of a full hash: the first 32 hex chars
pub fn short_hash(hash: &str) -> &str {
    &hash[..hash.len().min(32)]
}

/// Compute and store hashes for every node of the forest, bottom-up
pub fn hash_forest(forest: &mut [Spec]) -> Result<()> {
    for root in forest.iter_mut() {
        assign_hashes(root)?;
    }
    Ok(())
}

fn assign_hashes(spec: &mut Spec) -> Result<String> {
    let mut dep_hashes: Vec<(String, String)> = Vec::new();
    for edge in &mut spec.dependencies {
        let hash = assign_hashes(&mut edge.spec)?;
        if edge.deptypes.intersects(hash_deptypes()) {
            dep_hashes.push((edge.spec.name.clone(), hash));
        }
    }

    if !spec.is_concrete() {
        return Err(Error::Metadata(format!(
            "cannot hash abstract spec '{}'",
            spec
        )));
    }

    let digest = hash_node(spec, &mut dep_hashes);
    spec.hash = Some(digest.clone());
    Ok(digest)
}

/// Canonical serialization of a single node plus its dependency hashes
fn hash_node(spec: &Spec, dep_hashes: &mut Vec<(String, String)>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(b"name:");
    hasher.update(spec.name.as_bytes());
    hasher.update(b"\nversion:");
    // Canonical segment rendering, so `1.2-3` and `1.2.3` cannot diverge
    if let Some(version) = spec.version() {
        hasher.update(version.canonical().as_bytes());
    }

    // BTreeMap iteration is already name-sorted
    for (name, value) in &spec.variants {
        hasher.update(b"\nvariant:");
        hasher.update(name.as_bytes());
        hasher.update(b"=");
        match value {
            VariantValue::Bool(b) => hasher.update(if *b { b"true".as_slice() } else { b"false" }),
            VariantValue::Single(s) => hasher.update(s.as_bytes()),
            VariantValue::Multi(vs) => {
                let joined: Vec<&str> = vs.iter().map(|s| s.as_str()).collect();
                hasher.update(joined.join(",").as_bytes())
            }
        }
    }

    if let Some(ref compiler) = spec.compiler {
        hasher.update(b"\ncompiler:");
        hasher.update(compiler.name.as_bytes());
        if let Some(version) = compiler.versions.as_exact() {
            hasher.update(b"@");
            hasher.update(version.canonical().as_bytes());
        }
    }
    hasher.update(b"\narch:");
    hasher.update(spec.arch.to_string().as_bytes());

    dep_hashes.sort();
    for (name, hash) in dep_hashes {
        hasher.update(b"\ndep:");
        hasher.update(name.as_bytes());
        hasher.update(b"=");
        hasher.update(hash.as_bytes());
    }

    hex::encode(hasher.finalize())
}

/// Unique nodes of a forest in dependency order (children before
/// parents), following only edges carrying any of `deptypes`
///
/// Nodes are deduplicated by hash; ties at the same depth break by
/// (name, hash) so the order is deterministic.
pub fn topological_order(forest: &[Spec], deptypes: DepTypes) -> Result<Vec<Spec>> {
    let mut nodes: BTreeMap<String, Spec> = BTreeMap::new();
    for root in forest {
        collect(root, deptypes, &mut nodes)?;
    }

    let mut ordered: Vec<Spec> = Vec::with_capacity(nodes.len());
    let mut emitted: std::collections::BTreeSet<String> = Default::default();
    while ordered.len() < nodes.len() {
        let mut progressed = false;
        // sorted by (name, hash) for deterministic tie-breaking
        let mut ready: Vec<&Spec> = nodes
            .values()
            .filter(|spec| {
                let hash = spec.hash.as_deref().unwrap_or_default();
                !emitted.contains(hash)
                    && spec.dependencies_of_type(deptypes).all(|e| {
                        e.spec
                            .hash
                            .as_deref()
                            .map(|h| emitted.contains(h))
                            .unwrap_or(false)
                    })
            })
            .collect();
        ready.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.hash.cmp(&b.hash)));
        for spec in ready {
            emitted.insert(spec.hash.clone().unwrap_or_default());
            ordered.push(spec.clone());
            progressed = true;
        }
        if !progressed {
            let stuck: Vec<&str> = nodes
                .values()
                .filter(|s| !emitted.contains(s.hash.as_deref().unwrap_or_default()))
                .map(|s| s.name.as_str())
                .collect();
            return Err(Error::CyclicDependency {
                cycle: stuck.join(" -> "),
            });
        }
    }
    Ok(ordered)
}

fn collect(spec: &Spec, deptypes: DepTypes, nodes: &mut BTreeMap<String, Spec>) -> Result<()> {
    let hash = spec
        .hash
        .clone()
        .ok_or_else(|| Error::Metadata(format!("spec '{}' has no hash", spec.name)))?;
    if nodes.contains_key(&hash) {
        return Ok(());
    }
    nodes.insert(hash, spec.clone());
    for edge in spec.dependencies_of_type(deptypes) {
        collect(&edge.spec, deptypes, nodes)?;
    }
    Ok(())
}
