// src/metadata/mod.rs

//! Package metadata: the collaborator interface the concretizer consults
//!
//! Metadata is purely declarative: known versions, variant declarations
//! with defaults and legal values, dependency declarations (abstract specs
//! with deptypes, optionally conditional on a `when` predicate), conflicts
//! rules, and virtual "provides" declarations. The core never inspects how
//! this is stored; `MetadataSnapshot` is the in-memory implementation,
//! loadable from a TOML file for the CLI and built directly in tests.

use crate::error::{Error, Result};
use crate::spec::{parser, DepType, DepTypes, Spec, VariantValue};
use crate::version::Version;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

/// A known version of a package, optionally tagged preferred
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionDecl {
    pub version: Version,
    pub preferred: bool,
}

/// The shape of a variant: boolean flag, single value, or value set
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VariantKind {
    Bool,
    /// Exactly one of `values` (empty = any string)
    Single { values: Vec<String> },
    /// Any subset of `values` (empty = any strings)
    Multi { values: Vec<String> },
}

/// A declared variant with its default assignment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariantDecl {
    pub name: String,
    pub kind: VariantKind,
    pub default: VariantValue,
    pub description: Option<String>,
}

impl VariantDecl {
    pub fn boolean(name: impl Into<String>, default: bool) -> Self {
        Self {
            name: name.into(),
            kind: VariantKind::Bool,
            default: VariantValue::Bool(default),
            description: None,
        }
    }

    pub fn single<I, S>(name: impl Into<String>, values: I, default: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            kind: VariantKind::Single {
                values: values.into_iter().map(Into::into).collect(),
            },
            default: VariantValue::Single(default.into()),
            description: None,
        }
    }

    pub fn multi<I, S, J, T>(name: impl Into<String>, values: I, defaults: J) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        J: IntoIterator<Item = T>,
        T: Into<String>,
    {
        Self {
            name: name.into(),
            kind: VariantKind::Multi {
                values: values.into_iter().map(Into::into).collect(),
            },
            default: VariantValue::multi(defaults),
            description: None,
        }
    }

    /// Check an assignment against the declaration's shape and legal values
    pub fn allows(&self, value: &VariantValue) -> bool {
        match (&self.kind, value) {
            (VariantKind::Bool, VariantValue::Bool(_)) => true,
            (VariantKind::Single { values }, VariantValue::Single(v)) => {
                values.is_empty() || values.iter().any(|lv| lv == v)
            }
            (VariantKind::Multi { values }, VariantValue::Multi(vs)) => {
                values.is_empty() || vs.iter().all(|v| values.iter().any(|lv| lv == v))
            }
            // a single value is an acceptable assignment for a multi variant
            (VariantKind::Multi { values }, VariantValue::Single(v)) => {
                values.is_empty() || values.iter().any(|lv| lv == v)
            }
            _ => false,
        }
    }
}

/// A declared dependency: abstract spec + deptypes, optionally conditional
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyDecl {
    pub spec: Spec,
    pub deptypes: DepTypes,
    /// Activate only when the depending node satisfies this predicate
    pub when: Option<Spec>,
}

/// A conflicts rule: the described combination must not hold when concrete
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConflictRule {
    pub when: Spec,
    pub message: Option<String>,
}

/// A virtual package this package can stand in for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvidesDecl {
    pub virtual_name: String,
    /// Only provider versions satisfying this predicate count
    pub when: Option<Spec>,
}

/// Everything the concretizer needs to know about one package
#[derive(Debug, Clone, Default)]
pub struct PackageMetadata {
    pub name: String,
    pub versions: Vec<VersionDecl>,
    pub variants: Vec<VariantDecl>,
    pub dependencies: Vec<DependencyDecl>,
    pub conflicts: Vec<ConflictRule>,
    pub provides: Vec<ProvidesDecl>,
}

impl PackageMetadata {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_version(mut self, version: &str) -> Self {
        self.versions.push(VersionDecl {
            version: Version::parse(version).expect("valid version literal"),
            preferred: false,
        });
        self
    }

    pub fn with_preferred_version(mut self, version: &str) -> Self {
        self.versions.push(VersionDecl {
            version: Version::parse(version).expect("valid version literal"),
            preferred: true,
        });
        self
    }

    pub fn with_variant(mut self, decl: VariantDecl) -> Self {
        self.variants.push(decl);
        self
    }

    pub fn with_dependency(mut self, spec: &str, deptypes: DepTypes) -> Self {
        self.dependencies.push(DependencyDecl {
            spec: Spec::parse(spec).expect("valid dependency spec literal"),
            deptypes,
            when: None,
        });
        self
    }

    pub fn with_conditional_dependency(
        mut self,
        spec: &str,
        deptypes: DepTypes,
        when: &str,
    ) -> Self {
        self.dependencies.push(DependencyDecl {
            spec: Spec::parse(spec).expect("valid dependency spec literal"),
            deptypes,
            when: Some(parser::parse_predicate(when).expect("valid when predicate")),
        });
        self
    }

    pub fn with_conflict(mut self, when: &str, message: Option<&str>) -> Self {
        self.conflicts.push(ConflictRule {
            when: parser::parse_predicate(when).expect("valid conflict predicate"),
            message: message.map(str::to_string),
        });
        self
    }

    pub fn with_provides(mut self, virtual_name: &str) -> Self {
        self.provides.push(ProvidesDecl {
            virtual_name: virtual_name.to_string(),
            when: None,
        });
        self
    }

    pub fn with_conditional_provides(mut self, virtual_name: &str, when: &str) -> Self {
        self.provides.push(ProvidesDecl {
            virtual_name: virtual_name.to_string(),
            when: Some(parser::parse_predicate(when).expect("valid when predicate")),
        });
        self
    }

    /// Declared variant lookup
    pub fn variant(&self, name: &str) -> Option<&VariantDecl> {
        self.variants.iter().find(|v| v.name == name)
    }

    /// Known versions, highest first
    pub fn versions_descending(&self) -> Vec<&Version> {
        let mut versions: Vec<&Version> = self.versions.iter().map(|d| &d.version).collect();
        versions.sort();
        versions.reverse();
        versions
    }

    /// The highest version tagged preferred, if any
    pub fn preferred_version(&self) -> Option<&Version> {
        self.versions
            .iter()
            .filter(|d| d.preferred)
            .map(|d| &d.version)
            .max()
    }
}

/// Read access to package metadata; implementations must be immutable for
/// the duration of a solve (the concretizer is a pure function of the
/// snapshot)
pub trait MetadataProvider {
    fn package(&self, name: &str) -> Option<&PackageMetadata>;

    /// All known package names, sorted
    fn package_names(&self) -> Vec<&str>;
}

/// In-memory metadata snapshot
#[derive(Debug, Clone, Default)]
pub struct MetadataSnapshot {
    packages: BTreeMap<String, PackageMetadata>,
}

impl MetadataSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, metadata: PackageMetadata) {
        self.packages.insert(metadata.name.clone(), metadata);
    }

    pub fn with(mut self, metadata: PackageMetadata) -> Self {
        self.insert(metadata);
        self
    }

    /// Load a snapshot from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn from_toml_str(text: &str) -> Result<Self> {
        let raw: RawSnapshot = toml::from_str(text)
            .map_err(|e| Error::Metadata(format!("invalid metadata TOML: {}", e)))?;

        let mut snapshot = Self::new();
        for (name, raw_pkg) in raw.packages {
            snapshot.insert(raw_pkg.into_metadata(&name)?);
        }
        Ok(snapshot)
    }
}

impl MetadataProvider for MetadataSnapshot {
    fn package(&self, name: &str) -> Option<&PackageMetadata> {
        self.packages.get(name)
    }

    fn package_names(&self) -> Vec<&str> {
        self.packages.keys().map(|s| s.as_str()).collect()
    }
}

// --- TOML deserialization shims ---

#[derive(Debug, Deserialize)]
struct RawSnapshot {
    #[serde(default)]
    packages: BTreeMap<String, RawPackage>,
}

#[derive(Debug, Deserialize)]
struct RawPackage {
    #[serde(default)]
    versions: Vec<RawVersion>,
    #[serde(default)]
    variants: Vec<RawVariant>,
    #[serde(default)]
    dependencies: Vec<RawDependency>,
    #[serde(default)]
    conflicts: Vec<RawConflict>,
    #[serde(default)]
    provides: Vec<RawProvides>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawVersion {
    Plain(String),
    Detailed {
        version: String,
        #[serde(default)]
        preferred: bool,
    },
}

#[derive(Debug, Deserialize)]
struct RawVariant {
    name: String,
    #[serde(default)]
    values: Vec<String>,
    #[serde(default)]
    multi: bool,
    default: toml::Value,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawDependency {
    spec: String,
    #[serde(default)]
    deptypes: Vec<String>,
    #[serde(default)]
    when: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawConflict {
    when: String,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawProvides {
    Plain(String),
    Detailed {
        name: String,
        #[serde(default)]
        when: Option<String>,
    },
}

impl RawPackage {
    fn into_metadata(self, name: &str) -> Result<PackageMetadata> {
        let mut pkg = PackageMetadata::new(name);

        for raw in self.versions {
            let (text, preferred) = match raw {
                RawVersion::Plain(v) => (v, false),
                RawVersion::Detailed { version, preferred } => (version, preferred),
            };
            pkg.versions.push(VersionDecl {
                version: Version::parse(&text)?,
                preferred,
            });
        }

        for raw in self.variants {
            let kind = if raw.values.is_empty() && raw.default.is_bool() {
                VariantKind::Bool
            } else if raw.multi {
                VariantKind::Multi { values: raw.values }
            } else {
                VariantKind::Single { values: raw.values }
            };
            let default = match (&kind, raw.default) {
                (VariantKind::Bool, toml::Value::Boolean(b)) => VariantValue::Bool(b),
                (VariantKind::Single { .. }, toml::Value::String(s)) => VariantValue::Single(s),
                (VariantKind::Multi { .. }, toml::Value::String(s)) => {
                    VariantValue::multi(s.split(',').map(str::trim))
                }
                (VariantKind::Multi { .. }, toml::Value::Array(items)) => {
                    let mut values = Vec::new();
                    for item in items {
                        match item {
                            toml::Value::String(s) => values.push(s),
                            other => {
                                return Err(Error::Metadata(format!(
                                    "package '{}' variant '{}': non-string default {}",
                                    name, raw.name, other
                                )));
                            }
                        }
                    }
                    VariantValue::multi(values)
                }
                (_, other) => {
                    return Err(Error::Metadata(format!(
                        "package '{}' variant '{}': default {} does not match the variant shape",
                        name, raw.name, other
                    )));
                }
            };
            pkg.variants.push(VariantDecl {
                name: raw.name,
                kind,
                default,
                description: raw.description,
            });
        }

        for raw in self.dependencies {
            let mut deptypes = DepTypes::empty();
            for t in &raw.deptypes {
                let parsed: DepType = t
                    .parse()
                    .map_err(|_| Error::Metadata(format!("unknown deptype '{}'", t)))?;
                deptypes = deptypes.union(DepTypes::from_type(parsed));
            }
            if deptypes.is_empty() {
                deptypes = DepTypes::default_types();
            }
            pkg.dependencies.push(DependencyDecl {
                spec: Spec::parse(&raw.spec)?,
                deptypes,
                when: raw.when.as_deref().map(parser::parse_predicate).transpose()?,
            });
        }

        for raw in self.conflicts {
            pkg.conflicts.push(ConflictRule {
                when: parser::parse_predicate(&raw.when)?,
                message: raw.message,
            });
        }

        for raw in self.provides {
            let (virtual_name, when) = match raw {
                RawProvides::Plain(v) => (v, None),
                RawProvides::Detailed { name, when } => (
                    name,
                    when.as_deref().map(parser::parse_predicate).transpose()?,
                ),
            };
            pkg.provides.push(ProvidesDecl { virtual_name, when });
        }

        Ok(pkg)
    }
}
