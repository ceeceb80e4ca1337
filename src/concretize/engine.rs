// src/concretize/engine.rs

//! The concretization search engine
//!
//! State is a set of per-package constraint contributions, each tagged
//! with its source (command line or a depending package). Expansion is
//! worklist-driven: a dirty package gets its contributions merged, an
//! assignment (version, variants, compiler, arch) chosen, and its active
//! dependency declarations turned into contributions on its children.
//! Virtual packages are resolved by trying providers in preference order
//! with explicit state snapshots for backtracking; no exception-style
//! unwinding.

use super::conflict::{ConflictKind, ConflictReport, ConstraintSource};
use crate::config::{PrecedenceRule, SolverConfig};
use crate::error::{Error, Result};
use crate::metadata::{MetadataProvider, PackageMetadata, VariantKind};
use crate::provider::ProviderIndex;
use crate::spec::{CompilerSpec, DepEdge, DepTypes, Spec, VariantValue};
use crate::version::{Version, VersionConstraint};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, trace};

/// Requester label for constraints from user input
pub const COMMAND_LINE: &str = "command line";

/// Bound on expansion steps; metadata that keeps flip-flopping conditional
/// dependencies would otherwise loop forever
const MAX_STEPS: usize = 10_000;

/// Which precedence class a contribution belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SourceClass {
    User,
    Dependent,
}

impl SourceClass {
    fn rule(self) -> PrecedenceRule {
        match self {
            SourceClass::User => PrecedenceRule::UserPin,
            SourceClass::Dependent => PrecedenceRule::DependentRequirement,
        }
    }
}

/// One constraint on a target package, with provenance
#[derive(Debug, Clone, PartialEq)]
struct Contribution {
    source: String,
    class: SourceClass,
    spec: Spec,
}

impl Contribution {
    fn constraint_source(&self) -> ConstraintSource {
        ConstraintSource::new(&self.source, self.spec.to_string())
    }
}

/// Cloneable solver state; snapshots of this drive backtracking
#[derive(Debug, Clone, Default)]
struct SolverState {
    /// Per target-name constraint contributions (key may be a virtual)
    requests: BTreeMap<String, Vec<Contribution>>,
    /// parent -> child -> deptypes, from package dependency declarations;
    /// rebuilt from scratch whenever the parent is re-expanded
    edges: BTreeMap<String, BTreeMap<String, DepTypes>>,
    /// parent -> child -> deptypes, from user `^dep` clauses; never
    /// touched by expansion so user edges survive re-expansion
    user_edges: BTreeMap<String, BTreeMap<String, DepTypes>>,
    /// Chosen assignment per package, without dependency edges
    assignments: BTreeMap<String, Spec>,
    /// virtual name -> chosen provider
    virtual_map: BTreeMap<String, String>,
    /// Packages whose contributions changed since last expansion
    dirty: BTreeSet<String>,
    /// Root names in input order (may name virtuals)
    roots: Vec<String>,
}

/// Merged view of all contributions on one package
#[derive(Debug)]
struct Merged {
    versions: VersionConstraint,
    version_sources: Vec<ConstraintSource>,
    variants: BTreeMap<String, (VariantValue, ConstraintSource, SourceClass)>,
    compiler: Option<(CompilerSpec, ConstraintSource, SourceClass)>,
    arch: crate::spec::Arch,
}

pub struct Solver<'a, M: MetadataProvider> {
    metadata: &'a M,
    config: &'a SolverConfig,
    index: ProviderIndex,
    state: SolverState,
}

impl<'a, M: MetadataProvider> Solver<'a, M> {
    pub fn new(metadata: &'a M, config: &'a SolverConfig) -> Self {
        Self {
            metadata,
            config,
            index: ProviderIndex::rebuild(metadata),
            state: SolverState::default(),
        }
    }

    /// Solve the forest: returns concrete root specs (hashes not yet
    /// computed; the DAG assembler does that)
    pub fn solve(mut self, roots: &[Spec]) -> Result<Vec<Spec>> {
        for root in roots {
            self.add_root(root)?;
        }
        self.run()?;
        let full = self.build_full_specs()?;
        let mut forest = Vec::with_capacity(self.state.roots.len());
        for name in &self.state.roots {
            let resolved = self.state.virtual_map.get(name).unwrap_or(name);
            let spec = full.get(resolved).ok_or_else(|| {
                Error::Metadata(format!("no assignment produced for root '{}'", resolved))
            })?;
            forest.push(spec.clone());
        }
        Ok(forest)
    }

    fn add_root(&mut self, root: &Spec) -> Result<()> {
        if root.name.is_empty() {
            return Err(Error::Metadata(
                "anonymous spec cannot be concretized".to_string(),
            ));
        }
        self.state.roots.push(root.name.clone());

        let mut node = root.clone();
        node.dependencies.clear();
        node.hash = None;
        self.push_contribution(
            &root.name,
            Contribution {
                source: COMMAND_LINE.to_string(),
                class: SourceClass::User,
                spec: node,
            },
        );

        // user-specified dependency edges constrain the child and add an
        // edge from this root; the command-line source can never collide
        // with a package name, so expansion leaves these contributions
        // alone
        for edge in &root.dependencies {
            let mut child = edge.spec.clone();
            child.hash = None;
            let child_name = child.name.clone();
            self.push_contribution(
                &child_name,
                Contribution {
                    source: COMMAND_LINE.to_string(),
                    class: SourceClass::User,
                    spec: child,
                },
            );
            let entry = self
                .state
                .user_edges
                .entry(root.name.clone())
                .or_default()
                .entry(child_name)
                .or_insert(DepTypes::empty());
            *entry = entry.union(edge.deptypes);
        }
        Ok(())
    }

    fn push_contribution(&mut self, target: &str, contribution: Contribution) {
        let list = self.state.requests.entry(target.to_string()).or_default();
        if !list.contains(&contribution) {
            list.push(contribution);
            self.state.dirty.insert(target.to_string());
        }
    }

    /// Main loop: expand dirty packages to a fixpoint, then resolve one
    /// virtual (recursing for the rest), then run final checks
    fn run(&mut self) -> Result<()> {
        let mut steps = 0;
        loop {
            steps += 1;
            if steps > MAX_STEPS {
                return Err(Error::Metadata(
                    "concretization did not converge (conditional dependency loop?)".to_string(),
                ));
            }

            if let Some(name) = self.state.dirty.iter().next().cloned() {
                self.state.dirty.remove(&name);
                if self.metadata.package(&name).is_none() {
                    if self.index.is_virtual(&name) {
                        // handled in the provider-resolution phase
                        continue;
                    }
                    let requesters = self.requesters_of(&name);
                    return Err(Error::Metadata(format!(
                        "unknown package '{}' (required by {})",
                        name,
                        requesters.join(", ")
                    )));
                }
                self.expand(&name)?;
                continue;
            }

            if let Some(virtual_name) = self.first_unresolved_virtual() {
                return self.resolve_virtual(&virtual_name);
            }

            return self.check_final();
        }
    }

    fn requesters_of(&self, name: &str) -> Vec<String> {
        self.state
            .requests
            .get(name)
            .map(|list| list.iter().map(|c| c.source.clone()).collect())
            .unwrap_or_default()
    }

    fn first_unresolved_virtual(&self) -> Option<String> {
        self.state
            .requests
            .keys()
            .find(|name| {
                self.metadata.package(name).is_none() && self.index.is_virtual(name)
            })
            .cloned()
    }

    /// Try providers for `virtual_name` in preference order, snapshotting
    /// state so a failed branch can be rolled back
    fn resolve_virtual(&mut self, virtual_name: &str) -> Result<()> {
        let providers = self.index.providers_of(virtual_name);
        if providers.is_empty() {
            let requester = self
                .requesters_of(virtual_name)
                .first()
                .cloned()
                .unwrap_or_else(|| COMMAND_LINE.to_string());
            return Err(Error::MissingProvider {
                virtual_name: virtual_name.to_string(),
                requester,
            });
        }

        let candidates = self.order_providers(virtual_name, &providers);
        debug!(
            virtual_name,
            ?candidates,
            "resolving virtual package"
        );

        let mut last_err = None;
        for candidate in candidates {
            let snapshot = self.state.clone();
            self.apply_provider(virtual_name, &candidate);
            match self.run() {
                Ok(()) => return Ok(()),
                Err(e) => {
                    trace!(virtual_name, provider = %candidate, error = %e, "provider rejected");
                    last_err = Some(e);
                    self.state = snapshot;
                }
            }
        }

        Err(last_err.unwrap_or_else(|| {
            Error::Concretization(ConflictReport::new(
                virtual_name,
                ConflictKind::Provider,
                self.state
                    .requests
                    .get(virtual_name)
                    .map(|l| l.iter().map(|c| c.constraint_source()).collect())
                    .unwrap_or_default(),
                "no provider satisfies all constraints",
            ))
        }))
    }

    /// Preference order: configured providers first (in listed order),
    /// then the rest by highest known version, then name
    fn order_providers(&self, virtual_name: &str, providers: &BTreeSet<String>) -> Vec<String> {
        let mut ordered = Vec::new();
        for preferred in self.config.preferred_providers(virtual_name) {
            if providers.contains(preferred) {
                ordered.push(preferred.clone());
            }
        }
        let mut rest: Vec<&String> = providers
            .iter()
            .filter(|p| !ordered.contains(*p))
            .collect();
        rest.sort_by(|a, b| {
            let va = self.highest_known_version(a);
            let vb = self.highest_known_version(b);
            vb.cmp(&va).then_with(|| a.cmp(b))
        });
        ordered.extend(rest.into_iter().cloned());
        ordered
    }

    fn highest_known_version(&self, name: &str) -> Option<Version> {
        self.metadata
            .package(name)
            .and_then(|pkg| pkg.versions_descending().first().cloned().cloned())
    }

    /// Commit a provider choice: move the virtual's contributions and
    /// incoming edges onto the provider
    fn apply_provider(&mut self, virtual_name: &str, provider: &str) {
        self.state
            .virtual_map
            .insert(virtual_name.to_string(), provider.to_string());

        let contributions = self.state.requests.remove(virtual_name).unwrap_or_default();
        for mut c in contributions {
            c.spec.name = provider.to_string();
            self.push_contribution(provider, c);
        }

        for edges in [&mut self.state.edges, &mut self.state.user_edges] {
            for children in edges.values_mut() {
                if let Some(deptypes) = children.remove(virtual_name) {
                    let entry = children
                        .entry(provider.to_string())
                        .or_insert(DepTypes::empty());
                    *entry = entry.union(deptypes);
                }
            }
        }
        self.state.dirty.insert(provider.to_string());
    }

    /// Merge contributions, choose an assignment, and propagate active
    /// dependency declarations to children
    fn expand(&mut self, name: &str) -> Result<()> {
        let merged = self.merge(name)?;
        let pkg = self
            .metadata
            .package(name)
            .ok_or_else(|| Error::Metadata(format!("unknown package '{}'", name)))?;
        let assignment = self.assign(pkg, &merged)?;
        trace!(package = name, assignment = %assignment, "assigned");
        self.state
            .assignments
            .insert(name.to_string(), assignment.clone());

        // recompute this package's outgoing constraints from scratch so a
        // re-expansion cannot leave stale contributions behind
        let before = self.state.requests.clone();
        for list in self.state.requests.values_mut() {
            list.retain(|c| c.source != name);
        }
        self.state.edges.remove(name);

        for decl in &pkg.dependencies {
            let active = match &decl.when {
                None => true,
                Some(condition) => assignment.satisfies(condition),
            };
            if !active {
                continue;
            }
            let child_name = decl.spec.name.clone();
            self.state
                .requests
                .entry(child_name.clone())
                .or_default()
                .push(Contribution {
                    source: name.to_string(),
                    class: SourceClass::Dependent,
                    spec: decl.spec.clone(),
                });
            let entry = self
                .state
                .edges
                .entry(name.to_string())
                .or_default()
                .entry(child_name)
                .or_insert(DepTypes::empty());
            *entry = entry.union(decl.deptypes);
        }

        // only children whose contribution lists actually changed go dirty
        let keys: BTreeSet<String> = before
            .keys()
            .chain(self.state.requests.keys())
            .cloned()
            .collect();
        for key in keys {
            if key == name {
                continue;
            }
            if before.get(&key) != self.state.requests.get(&key) {
                self.state.dirty.insert(key);
            }
        }
        self.state.requests.retain(|_, list| !list.is_empty());
        Ok(())
    }

    /// Fold all contributions on `name` into one merged constraint view
    fn merge(&self, name: &str) -> Result<Merged> {
        let contributions = self
            .state
            .requests
            .get(name)
            .cloned()
            .unwrap_or_default();

        let mut merged = Merged {
            versions: VersionConstraint::any(),
            version_sources: Vec::new(),
            variants: BTreeMap::new(),
            compiler: None,
            arch: crate::spec::Arch::default(),
        };

        // versions: straight intersection, citing the disjoint pair
        let versioned: Vec<&Contribution> = contributions
            .iter()
            .filter(|c| !c.spec.versions.is_any())
            .collect();
        for c in &versioned {
            merged.version_sources.push(c.constraint_source());
            match merged.versions.intersect(&c.spec.versions) {
                Some(v) => merged.versions = v,
                None => {
                    let sources = Self::disjoint_version_pair(&versioned, c);
                    return Err(Error::Concretization(ConflictReport::new(
                        name,
                        ConflictKind::Version,
                        sources,
                        "version requirements cannot all be met",
                    )));
                }
            }
        }

        for c in &contributions {
            self.merge_variants(name, c, &mut merged)?;
            self.merge_compiler(name, c, &mut merged)?;
            self.merge_arch(name, c, &mut merged)?;
        }

        Ok(merged)
    }

    /// Find a specific disjoint pair for the conflict report; falls back
    /// to the full source list for overconstrained 3-way conflicts
    fn disjoint_version_pair(
        versioned: &[&Contribution],
        failing: &Contribution,
    ) -> Vec<ConstraintSource> {
        for earlier in versioned {
            if std::ptr::eq(*earlier, failing) {
                break;
            }
            if earlier.spec.versions.intersect(&failing.spec.versions).is_none() {
                return vec![earlier.constraint_source(), failing.constraint_source()];
            }
        }
        versioned.iter().map(|c| c.constraint_source()).collect()
    }

    fn stronger(&self, a: SourceClass, b: SourceClass) -> Option<SourceClass> {
        if a == b {
            return None;
        }
        for rule in &self.config.precedence {
            if *rule == a.rule() {
                return Some(a);
            }
            if *rule == b.rule() {
                return Some(b);
            }
        }
        None
    }

    fn merge_variants(&self, name: &str, c: &Contribution, merged: &mut Merged) -> Result<()> {
        for (vname, value) in &c.spec.variants {
            let Some((existing, source, class)) = merged.variants.get_mut(vname) else {
                merged.variants.insert(
                    vname.clone(),
                    (value.clone(), c.constraint_source(), c.class),
                );
                continue;
            };
            if existing == value {
                continue;
            }
            // multi-valued requirements combine
            if let (VariantValue::Multi(a), VariantValue::Multi(b)) = (&mut *existing, value) {
                a.extend(b.iter().cloned());
                continue;
            }
            match self.stronger(*class, c.class) {
                Some(winner) if winner == c.class => {
                    *existing = value.clone();
                    *source = c.constraint_source();
                    *class = c.class;
                }
                Some(_) => {}
                None => {
                    return Err(Error::Concretization(ConflictReport::new(
                        name,
                        ConflictKind::Variant,
                        vec![source.clone(), c.constraint_source()],
                        format!("variant '{}' is requested with different values", vname),
                    )));
                }
            }
        }
        Ok(())
    }

    fn merge_compiler(&self, name: &str, c: &Contribution, merged: &mut Merged) -> Result<()> {
        let Some(wanted) = &c.spec.compiler else {
            return Ok(());
        };
        let Some((existing, source, class)) = merged.compiler.as_mut() else {
            merged.compiler = Some((wanted.clone(), c.constraint_source(), c.class));
            return Ok(());
        };
        if existing.name == wanted.name {
            match existing.versions.intersect(&wanted.versions) {
                Some(v) => existing.versions = v,
                None => {
                    return Err(Error::Concretization(ConflictReport::new(
                        name,
                        ConflictKind::Compiler,
                        vec![source.clone(), c.constraint_source()],
                        "compiler version requirements are disjoint",
                    )));
                }
            }
        } else {
            match self.stronger(*class, c.class) {
                Some(winner) if winner == c.class => {
                    *existing = wanted.clone();
                    *source = c.constraint_source();
                    *class = c.class;
                }
                Some(_) => {}
                None => {
                    return Err(Error::Concretization(ConflictReport::new(
                        name,
                        ConflictKind::Compiler,
                        vec![source.clone(), c.constraint_source()],
                        "different compilers requested",
                    )));
                }
            }
        }
        Ok(())
    }

    fn merge_arch(&self, name: &str, c: &Contribution, merged: &mut Merged) -> Result<()> {
        let wanted = &c.spec.arch;
        for (mine, theirs) in [
            (&mut merged.arch.platform, &wanted.platform),
            (&mut merged.arch.os, &wanted.os),
            (&mut merged.arch.target, &wanted.target),
        ] {
            let Some(t) = theirs else {
                continue;
            };
            match mine {
                None => *mine = Some(t.clone()),
                Some(m) if *m == *t => {}
                Some(m) => {
                    return Err(Error::Concretization(ConflictReport::new(
                        name,
                        ConflictKind::Arch,
                        vec![
                            ConstraintSource::new(name, m.to_string()),
                            ConstraintSource::new(&c.source, t.to_string()),
                        ],
                        "architecture components differ",
                    )));
                }
            }
        }
        Ok(())
    }

    /// Choose a full assignment for one package from its merged view
    fn assign(&self, pkg: &PackageMetadata, merged: &Merged) -> Result<Spec> {
        let mut spec = Spec::new(&pkg.name);

        // version: a preferred version that satisfies wins, else highest
        let chosen = pkg
            .preferred_version()
            .filter(|v| merged.versions.satisfies(v))
            .or_else(|| {
                pkg.versions_descending()
                    .into_iter()
                    .find(|v| merged.versions.satisfies(v))
            })
            .cloned();
        let version = chosen.ok_or_else(|| {
            Error::Concretization(ConflictReport::new(
                &pkg.name,
                ConflictKind::Version,
                merged.version_sources.clone(),
                format!(
                    "no known version of '{}' satisfies the merged constraint",
                    pkg.name
                ),
            ))
        })?;
        spec.versions = VersionConstraint::exact(version);

        // architecture: merged components, open ones from config
        spec.arch = merged.arch.clone();
        spec.arch.merge_from(&self.config.default_arch());
        let target = spec
            .arch
            .target
            .clone()
            .unwrap_or_else(|| self.config.target.clone());

        // variants: pins checked against the declaration, rest defaulted
        for (vname, (value, source, _)) in &merged.variants {
            let Some(decl) = pkg.variant(vname) else {
                return Err(Error::Concretization(ConflictReport::new(
                    &pkg.name,
                    ConflictKind::Variant,
                    vec![source.clone()],
                    format!("package '{}' has no variant '{}'", pkg.name, vname),
                )));
            };
            if !decl.allows(value) {
                return Err(Error::Concretization(ConflictReport::new(
                    &pkg.name,
                    ConflictKind::Variant,
                    vec![source.clone()],
                    format!("value not allowed for variant '{}'", vname),
                )));
            }
            // single values widen to a set for multi-valued variants
            let value = match (&decl.kind, value) {
                (VariantKind::Multi { .. }, VariantValue::Single(s)) => {
                    VariantValue::multi([s.clone()])
                }
                (_, v) => v.clone(),
            };
            spec.variants.insert(vname.clone(), value);
        }
        for decl in &pkg.variants {
            spec.variants
                .entry(decl.name.clone())
                .or_insert_with(|| decl.default.clone());
        }

        // compiler: pin filtered by site availability, else site preference
        spec.compiler = Some(self.choose_compiler(&pkg.name, merged, &target)?);

        Ok(spec)
    }

    fn choose_compiler(
        &self,
        package: &str,
        merged: &Merged,
        target: &str,
    ) -> Result<CompilerSpec> {
        match &merged.compiler {
            Some((pin, source, _)) => {
                for decl in &self.config.compilers {
                    if decl.name != pin.name || !decl.available_on(target) {
                        continue;
                    }
                    let version = Version::parse(&decl.version).map_err(|e| {
                        Error::Config(format!("bad compiler version in config: {}", e))
                    })?;
                    if pin.versions.satisfies(&version) {
                        return Ok(CompilerSpec::with_versions(
                            &decl.name,
                            VersionConstraint::exact(version),
                        ));
                    }
                }
                Err(Error::Concretization(ConflictReport::new(
                    package,
                    ConflictKind::Compiler,
                    vec![source.clone()],
                    format!("compiler %{} is not available on target '{}'", pin, target),
                )))
            }
            None => {
                for decl in &self.config.compilers {
                    if !decl.available_on(target) {
                        continue;
                    }
                    let version = Version::parse(&decl.version).map_err(|e| {
                        Error::Config(format!("bad compiler version in config: {}", e))
                    })?;
                    return Ok(CompilerSpec::with_versions(
                        &decl.name,
                        VersionConstraint::exact(version),
                    ));
                }
                Err(Error::Concretization(ConflictReport::new(
                    package,
                    ConflictKind::Compiler,
                    Vec::new(),
                    format!("no configured compiler is available on target '{}'", target),
                )))
            }
        }
    }

    /// Provider `when` predicates and declared conflicts are checked
    /// against the fully assembled specs; a failure here rolls back to the
    /// nearest provider choice point
    fn check_final(&self) -> Result<()> {
        let full = self.build_full_specs()?;

        for (virtual_name, provider) in &self.state.virtual_map {
            let Some(pkg) = self.metadata.package(provider) else {
                continue;
            };
            let Some(spec) = full.get(provider) else {
                continue;
            };
            let satisfied = pkg
                .provides
                .iter()
                .filter(|d| &d.virtual_name == virtual_name)
                .any(|d| match &d.when {
                    None => true,
                    Some(condition) => spec.satisfies(condition),
                });
            if !satisfied {
                return Err(Error::Concretization(ConflictReport::new(
                    virtual_name,
                    ConflictKind::Provider,
                    vec![ConstraintSource::new(provider, spec.to_string())],
                    format!(
                        "'{}' does not provide '{}' in the chosen configuration",
                        provider, virtual_name
                    ),
                )));
            }
        }

        for (name, spec) in &full {
            let Some(pkg) = self.metadata.package(name) else {
                continue;
            };
            for rule in &pkg.conflicts {
                if spec.satisfies(&rule.when) {
                    let message = rule.message.clone().unwrap_or_else(|| {
                        format!("declared conflict '{}' holds", rule.when)
                    });
                    return Err(Error::Concretization(ConflictReport::new(
                        name,
                        ConflictKind::ConflictRule,
                        vec![ConstraintSource::new(name, rule.when.to_string())],
                        message,
                    )));
                }
            }
        }

        Ok(())
    }

    /// Assemble full specs (assignments + dependency subtrees) for every
    /// package reachable from the roots, detecting cycles
    fn build_full_specs(&self) -> Result<BTreeMap<String, Spec>> {
        let mut cache: BTreeMap<String, Spec> = BTreeMap::new();
        let mut visiting: Vec<String> = Vec::new();
        for name in &self.state.roots {
            let resolved = self.state.virtual_map.get(name).unwrap_or(name).clone();
            self.full_spec(&resolved, &mut cache, &mut visiting)?;
        }
        Ok(cache)
    }

    fn full_spec(
        &self,
        name: &str,
        cache: &mut BTreeMap<String, Spec>,
        visiting: &mut Vec<String>,
    ) -> Result<Spec> {
        if let Some(spec) = cache.get(name) {
            return Ok(spec.clone());
        }
        if visiting.iter().any(|n| n == name) {
            let mut cycle: Vec<&str> = visiting.iter().map(|s| s.as_str()).collect();
            cycle.push(name);
            return Err(Error::CyclicDependency {
                cycle: cycle.join(" -> "),
            });
        }

        let mut spec = self
            .state
            .assignments
            .get(name)
            .ok_or_else(|| Error::Metadata(format!("package '{}' was never assigned", name)))?
            .clone();

        // declared and user edges combined; a child reached both ways
        // gets the union of the deptypes
        let mut children: BTreeMap<String, DepTypes> = BTreeMap::new();
        for edges in [&self.state.edges, &self.state.user_edges] {
            if let Some(map) = edges.get(name) {
                for (child, deptypes) in map {
                    let entry = children
                        .entry(child.clone())
                        .or_insert(DepTypes::empty());
                    *entry = entry.union(*deptypes);
                }
            }
        }

        visiting.push(name.to_string());
        for (child, deptypes) in &children {
            let child_spec = self.full_spec(child, cache, visiting)?;
            spec.dependencies.push(DepEdge {
                spec: child_spec,
                deptypes: *deptypes,
            });
        }
        visiting.pop();

        cache.insert(name.to_string(), spec.clone());
        Ok(spec)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{MetadataSnapshot, PackageMetadata};

    fn snapshot() -> MetadataSnapshot {
        MetadataSnapshot::new()
            .with(PackageMetadata::new("zlib").with_version("1.2.13").with_version("1.2.11"))
            .with(
                PackageMetadata::new("libpng")
                    .with_version("1.6.39")
                    .with_dependency("zlib@1.2:", DepTypes::default_types()),
            )
    }

    #[test]
    fn test_simple_chain_assigns_highest_versions() {
        let metadata = snapshot();
        let config = SolverConfig::default();
        let solver = Solver::new(&metadata, &config);
        let forest = solver.solve(&[Spec::parse("libpng").unwrap()]).unwrap();
        assert_eq!(forest.len(), 1);
        let libpng = &forest[0];
        assert_eq!(libpng.version().unwrap().to_string(), "1.6.39");
        let zlib = &libpng.dependencies[0].spec;
        assert_eq!(zlib.name, "zlib");
        assert_eq!(zlib.version().unwrap().to_string(), "1.2.13");
        assert!(zlib.is_concrete());
    }

    #[test]
    fn test_user_version_pin_wins_over_highest() {
        let metadata = snapshot();
        let config = SolverConfig::default();
        let solver = Solver::new(&metadata, &config);
        let forest = solver
            .solve(&[Spec::parse("libpng ^zlib@1.2.11").unwrap()])
            .unwrap();
        let zlib = &forest[0].dependencies[0].spec;
        assert_eq!(zlib.version().unwrap().to_string(), "1.2.11");
    }

    #[test]
    fn test_unknown_package_is_reported_with_requester() {
        let metadata = snapshot();
        let config = SolverConfig::default();
        let solver = Solver::new(&metadata, &config);
        let err = solver
            .solve(&[Spec::parse("libpng ^nosuch").unwrap()])
            .unwrap_err();
        assert!(err.to_string().contains("unknown package 'nosuch'"));
    }

    #[test]
    fn test_assignment_fills_compiler_and_arch_from_config() {
        let metadata = snapshot();
        let config = SolverConfig::default();
        let solver = Solver::new(&metadata, &config);
        let forest = solver.solve(&[Spec::parse("zlib").unwrap()]).unwrap();
        let zlib = &forest[0];
        assert!(zlib.compiler.as_ref().unwrap().is_concrete());
        assert!(zlib.arch.is_concrete());
    }
}
