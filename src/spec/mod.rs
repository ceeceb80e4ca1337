// src/spec/mod.rs

//! The Spec model: typed representation of a package request
//!
//! A `Spec` describes one package instance, either abstract (fields left
//! open or partially constrained) or concrete (every field fixed and a
//! content hash computed). Abstract specs come from user input or from a
//! package's declared dependencies; the concretizer consumes them and
//! produces new concrete specs, which are immutable once hashed.
//!
//! Printing is the inverse of parsing: `parse(print(s)) == s` structurally
//! for any spec the parser itself can produce (dependency edges attach to
//! the root, so they are one level deep). A concrete spec prints its
//! transitive dependency closure flat, one `^` clause per node, and that
//! text is a fixpoint of print-then-parse; identity for concrete specs is
//! the content hash, not the nesting of edges.

pub mod parser;

use crate::version::{Version, VersionConstraint};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;
use strum_macros::{Display as StrumDisplay, EnumString};

/// A dependency edge tag controlling which operations traverse the edge
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, StrumDisplay, EnumString,
    Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
pub enum DepType {
    Build,
    Link,
    Run,
    Test,
}

/// A set of deptypes on one dependency edge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DepTypes(u8);

impl DepTypes {
    pub const BUILD: DepTypes = DepTypes(1);
    pub const LINK: DepTypes = DepTypes(2);
    pub const RUN: DepTypes = DepTypes(4);
    pub const TEST: DepTypes = DepTypes(8);

    /// Default for an unannotated `^dep` edge
    pub fn default_types() -> Self {
        Self::BUILD | Self::LINK
    }

    pub fn empty() -> Self {
        DepTypes(0)
    }

    pub fn all() -> Self {
        Self::BUILD | Self::LINK | Self::RUN | Self::TEST
    }

    pub fn from_type(t: DepType) -> Self {
        match t {
            DepType::Build => Self::BUILD,
            DepType::Link => Self::LINK,
            DepType::Run => Self::RUN,
            DepType::Test => Self::TEST,
        }
    }

    pub fn contains(&self, t: DepType) -> bool {
        self.0 & Self::from_type(t).0 != 0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// True when the edge carries only the `test` deptype
    pub fn is_test_only(&self) -> bool {
        self.0 == Self::TEST.0
    }

    pub fn union(self, other: Self) -> Self {
        DepTypes(self.0 | other.0)
    }

    pub fn intersects(&self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    pub fn iter(&self) -> impl Iterator<Item = DepType> + '_ {
        [DepType::Build, DepType::Link, DepType::Run, DepType::Test]
            .into_iter()
            .filter(|t| self.contains(*t))
    }
}

impl std::ops::BitOr for DepTypes {
    type Output = DepTypes;

    fn bitor(self, rhs: Self) -> Self {
        self.union(rhs)
    }
}

impl Default for DepTypes {
    fn default() -> Self {
        Self::default_types()
    }
}

impl fmt::Display for DepTypes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.iter().map(|t| t.to_string()).collect();
        write!(f, "{}", parts.join(","))
    }
}

/// A variant assignment: boolean flag, single value, or multi-valued set
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VariantValue {
    Bool(bool),
    Single(String),
    Multi(BTreeSet<String>),
}

impl VariantValue {
    pub fn multi<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        VariantValue::Multi(values.into_iter().map(Into::into).collect())
    }

    /// True when `self` satisfies a constraint value `other`
    /// (equal for bool/single; superset for multi)
    pub fn satisfies(&self, other: &VariantValue) -> bool {
        match (self, other) {
            (VariantValue::Multi(mine), VariantValue::Multi(wanted)) => {
                wanted.is_subset(mine)
            }
            (VariantValue::Multi(mine), VariantValue::Single(wanted)) => {
                mine.contains(wanted)
            }
            (a, b) => a == b,
        }
    }
}

/// Architecture triple; abstract specs may leave components open
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Arch {
    pub platform: Option<String>,
    pub os: Option<String>,
    pub target: Option<String>,
}

impl Arch {
    pub fn concrete(
        platform: impl Into<String>,
        os: impl Into<String>,
        target: impl Into<String>,
    ) -> Self {
        Self {
            platform: Some(platform.into()),
            os: Some(os.into()),
            target: Some(target.into()),
        }
    }

    pub fn is_open(&self) -> bool {
        self.platform.is_none() && self.os.is_none() && self.target.is_none()
    }

    pub fn is_concrete(&self) -> bool {
        self.platform.is_some() && self.os.is_some() && self.target.is_some()
    }

    /// Parse the value of an `arch=` clause: `platform-os-target` or
    /// `os-target` (platform left open)
    pub fn parse_value(value: &str) -> Option<Self> {
        let parts: Vec<&str> = value.split('-').collect();
        match parts.as_slice() {
            [os, target] => Some(Self {
                platform: None,
                os: Some(os.to_string()),
                target: Some(target.to_string()),
            }),
            [platform, os, target] => Some(Self {
                platform: Some(platform.to_string()),
                os: Some(os.to_string()),
                target: Some(target.to_string()),
            }),
            _ => None,
        }
    }

    /// True when every component fixed in `other` matches `self`
    pub fn satisfies(&self, other: &Arch) -> bool {
        fn component(mine: &Option<String>, wanted: &Option<String>) -> bool {
            match wanted {
                None => true,
                Some(w) => mine.as_deref() == Some(w.as_str()),
            }
        }
        component(&self.platform, &other.platform)
            && component(&self.os, &other.os)
            && component(&self.target, &other.target)
    }

    /// Fill open components from `other`
    pub fn merge_from(&mut self, other: &Arch) {
        if self.platform.is_none() {
            self.platform = other.platform.clone();
        }
        if self.os.is_none() {
            self.os = other.os.clone();
        }
        if self.target.is_none() {
            self.target = other.target.clone();
        }
    }
}

impl fmt::Display for Arch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<&str> = [&self.platform, &self.os, &self.target]
            .into_iter()
            .flatten()
            .map(|s| s.as_str())
            .collect();
        write!(f, "{}", parts.join("-"))
    }
}

/// Compiler selection: name plus version constraint (any when unversioned)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CompilerSpec {
    pub name: String,
    pub versions: VersionConstraint,
}

impl CompilerSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            versions: VersionConstraint::any(),
        }
    }

    pub fn with_versions(name: impl Into<String>, versions: VersionConstraint) -> Self {
        Self {
            name: name.into(),
            versions,
        }
    }

    pub fn is_concrete(&self) -> bool {
        self.versions.as_exact().is_some()
    }
}

impl fmt::Display for CompilerSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if !self.versions.is_any() {
            write!(f, "@{}", self.versions)?;
        }
        Ok(())
    }
}

/// A dependency edge to a child spec
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepEdge {
    pub spec: Spec,
    pub deptypes: DepTypes,
}

/// A package request node, abstract or concrete
///
/// The predicate grammar also allows anonymous specs (empty name) used as
/// `when` conditions in package metadata; those never enter a solve as
/// roots.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Spec {
    pub name: String,
    pub versions: VersionConstraint,
    pub variants: BTreeMap<String, VariantValue>,
    pub compiler: Option<CompilerSpec>,
    pub arch: Arch,
    pub dependencies: Vec<DepEdge>,
    /// Content hash; present only on concrete specs
    pub hash: Option<String>,
}

impl Spec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Parse a single spec (errors if the text contains a forest)
    pub fn parse(text: &str) -> crate::Result<Self> {
        parser::parse_single(text)
    }

    /// The concrete version, when the constraint pins exactly one
    pub fn version(&self) -> Option<&Version> {
        self.versions.as_exact()
    }

    /// True when every locally visible field is fixed: exact version,
    /// concrete compiler and architecture. Variant completeness is checked
    /// against declared variants by the concretizer, which knows the
    /// package's metadata.
    pub fn is_concrete(&self) -> bool {
        self.versions.as_exact().is_some()
            && self.compiler.as_ref().is_some_and(|c| c.is_concrete())
            && self.arch.is_concrete()
            && self.dependencies.iter().all(|d| d.spec.is_concrete())
    }

    /// Look up a variant assignment
    pub fn variant(&self, name: &str) -> Option<&VariantValue> {
        self.variants.get(name)
    }

    /// Dependency edges filtered to those carrying any of `types`
    pub fn dependencies_of_type(&self, types: DepTypes) -> impl Iterator<Item = &DepEdge> {
        self.dependencies
            .iter()
            .filter(move |e| e.deptypes.intersects(types))
    }

    pub fn find_dependency(&self, name: &str) -> Option<&DepEdge> {
        self.dependencies.iter().find(|e| e.spec.name == name)
    }

    /// Constraint satisfaction predicate: does `self` (typically concrete
    /// or at least more constrained) satisfy everything `constraint` asks
    /// for? Anonymous constraints (empty name) match any name; used for
    /// `when` conditions on conditional dependencies and conflicts.
    pub fn satisfies(&self, constraint: &Spec) -> bool {
        if !constraint.name.is_empty() && constraint.name != self.name {
            return false;
        }

        if !constraint.versions.is_any() {
            match self.versions.as_exact() {
                Some(v) => {
                    if !constraint.versions.satisfies(v) {
                        return false;
                    }
                }
                // both still abstract: satisfiable only if ranges overlap
                None => {
                    if self.versions.intersect(&constraint.versions).is_none() {
                        return false;
                    }
                }
            }
        }

        for (name, wanted) in &constraint.variants {
            match self.variants.get(name) {
                Some(value) if value.satisfies(wanted) => {}
                _ => return false,
            }
        }

        if let Some(ref wanted) = constraint.compiler {
            match self.compiler {
                Some(ref mine) if mine.name == wanted.name => {
                    if !wanted.versions.is_any() {
                        match mine.versions.as_exact() {
                            Some(v) => {
                                if !wanted.versions.satisfies(v) {
                                    return false;
                                }
                            }
                            None => {
                                if mine.versions.intersect(&wanted.versions).is_none() {
                                    return false;
                                }
                            }
                        }
                    }
                }
                _ => return false,
            }
        }

        if !self.arch.satisfies(&constraint.arch) {
            return false;
        }

        // every dependency constraint must be satisfied by a dependency
        // of the same name
        for wanted in &constraint.dependencies {
            match self.find_dependency(&wanted.spec.name) {
                Some(edge) if edge.spec.satisfies(&wanted.spec) => {}
                _ => return false,
            }
        }

        true
    }
}

impl Spec {
    /// This node's own clauses, without any dependency edges
    fn fmt_node(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if !self.versions.is_any() {
            write!(f, "@{}", self.versions)?;
        }
        for (name, value) in &self.variants {
            match value {
                VariantValue::Bool(true) => write!(f, " +{}", name)?,
                VariantValue::Bool(false) => write!(f, " ~{}", name)?,
                VariantValue::Single(v) if v.contains(char::is_whitespace) => {
                    write!(f, " {}=\"{}\"", name, v)?
                }
                VariantValue::Single(v) => write!(f, " {}={}", name, v)?,
                VariantValue::Multi(vs) => {
                    let joined: Vec<&str> = vs.iter().map(|s| s.as_str()).collect();
                    write!(f, " {}={}", name, joined.join(","))?
                }
            }
        }
        if let Some(ref compiler) = self.compiler {
            write!(f, " %{}", compiler)?;
        }
        if !self.arch.is_open() {
            write!(f, " arch={}", self.arch)?;
        }
        Ok(())
    }
}

/// Transitive dependency closure in first-seen preorder, one entry per
/// package name; a node reached through several edges gets the union of
/// their deptypes
fn collect_display_edges<'a>(
    spec: &'a Spec,
    order: &mut Vec<&'a str>,
    edges: &mut BTreeMap<&'a str, (DepTypes, &'a Spec)>,
) {
    for edge in &spec.dependencies {
        let name = edge.spec.name.as_str();
        match edges.get_mut(name) {
            Some((types, _)) => *types = types.union(edge.deptypes),
            None => {
                order.push(name);
                edges.insert(name, (edge.deptypes, &edge.spec));
            }
        }
        collect_display_edges(&edge.spec, order, edges);
    }
}

impl fmt::Display for Spec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_node(f)?;
        let mut order = Vec::new();
        let mut edges = BTreeMap::new();
        collect_display_edges(self, &mut order, &mut edges);
        for name in order {
            if let Some((deptypes, child)) = edges.get(name) {
                if *deptypes == DepTypes::default_types() {
                    write!(f, " ^")?;
                } else {
                    write!(f, " ^[deptypes={}]", deptypes)?;
                }
                child.fmt_node(f)?;
            }
        }
        Ok(())
    }
}

impl FromStr for Spec {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        Spec::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deptypes_display() {
        assert_eq!(DepTypes::default_types().to_string(), "build,link");
        assert_eq!(
            (DepTypes::RUN | DepTypes::TEST).to_string(),
            "run,test"
        );
    }

    #[test]
    fn test_deptypes_test_only() {
        assert!(DepTypes::TEST.is_test_only());
        assert!(!(DepTypes::TEST | DepTypes::BUILD).is_test_only());
    }

    #[test]
    fn test_arch_parse_value() {
        let a = Arch::parse_value("linux-rhel8-x86_64").unwrap();
        assert_eq!(a.platform.as_deref(), Some("linux"));
        assert_eq!(a.os.as_deref(), Some("rhel8"));
        assert_eq!(a.target.as_deref(), Some("x86_64"));

        let b = Arch::parse_value("rhel8-x86_64").unwrap();
        assert!(b.platform.is_none());
        assert!(Arch::parse_value("x86_64").is_none());
    }

    #[test]
    fn test_arch_satisfies_open_components() {
        let concrete = Arch::concrete("linux", "rhel8", "x86_64");
        let open = Arch {
            platform: None,
            os: None,
            target: Some("x86_64".to_string()),
        };
        assert!(concrete.satisfies(&open));
        assert!(!concrete.satisfies(&Arch {
            target: Some("aarch64".to_string()),
            ..Default::default()
        }));
    }

    #[test]
    fn test_variant_value_satisfies() {
        let multi = VariantValue::multi(["a", "b", "c"]);
        assert!(multi.satisfies(&VariantValue::multi(["a", "c"])));
        assert!(multi.satisfies(&VariantValue::Single("b".to_string())));
        assert!(!multi.satisfies(&VariantValue::multi(["a", "d"])));
        assert!(VariantValue::Bool(true).satisfies(&VariantValue::Bool(true)));
        assert!(!VariantValue::Bool(false).satisfies(&VariantValue::Bool(true)));
    }

    #[test]
    fn test_spec_satisfies_version_and_variant() {
        let mut spec = Spec::new("hdf5");
        spec.versions = VersionConstraint::parse("1.12.0").unwrap();
        spec.variants
            .insert("mpi".to_string(), VariantValue::Bool(true));

        let mut want = Spec::new("hdf5");
        want.versions = VersionConstraint::parse("1.10:1.12").unwrap();
        want.variants
            .insert("mpi".to_string(), VariantValue::Bool(true));
        assert!(spec.satisfies(&want));

        want.versions = VersionConstraint::parse("1.13:").unwrap();
        assert!(!spec.satisfies(&want));
    }

    #[test]
    fn test_spec_satisfies_anonymous_condition() {
        let mut spec = Spec::new("hwloc");
        spec.variants
            .insert("cuda".to_string(), VariantValue::Bool(true));

        let mut cond = Spec::default();
        cond.variants
            .insert("cuda".to_string(), VariantValue::Bool(true));
        assert!(spec.satisfies(&cond));

        let other = Spec::new("ucx");
        assert!(other.satisfies(&Spec::default()));
        assert!(!other.satisfies(&Spec::new("hwloc")));
    }

    #[test]
    fn test_spec_satisfies_dependency_constraint() {
        let mut dep = Spec::new("zlib");
        dep.versions = VersionConstraint::parse("1.2.13").unwrap();
        let mut spec = Spec::new("libpng");
        spec.dependencies.push(DepEdge {
            spec: dep,
            deptypes: DepTypes::default_types(),
        });

        let mut want = Spec::new("libpng");
        let mut want_dep = Spec::new("zlib");
        want_dep.versions = VersionConstraint::parse("1.2:").unwrap();
        want.dependencies.push(DepEdge {
            spec: want_dep,
            deptypes: DepTypes::default_types(),
        });
        assert!(spec.satisfies(&want));
    }
}
