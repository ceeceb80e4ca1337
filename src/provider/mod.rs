// src/provider/mod.rs

//! Virtual package provider index
//!
//! Maps a virtual name (e.g. "mpi") to the set of concrete packages whose
//! metadata declares it provides that virtual. Built once from a metadata
//! snapshot; queries are O(1) map lookups afterwards.

use crate::metadata::MetadataProvider;
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Default)]
pub struct ProviderIndex {
    providers: BTreeMap<String, BTreeSet<String>>,
}

impl ProviderIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scan all known packages' provides declarations and (re)build the
    /// index from scratch
    pub fn rebuild(metadata: &impl MetadataProvider) -> Self {
        let mut index = Self::new();
        for name in metadata.package_names() {
            let Some(pkg) = metadata.package(name) else {
                continue;
            };
            for decl in &pkg.provides {
                index
                    .providers
                    .entry(decl.virtual_name.clone())
                    .or_default()
                    .insert(pkg.name.clone());
            }
        }
        index
    }

    /// Packages that can satisfy `virtual_name` (empty set when unknown)
    pub fn providers_of(&self, virtual_name: &str) -> BTreeSet<String> {
        self.providers
            .get(virtual_name)
            .cloned()
            .unwrap_or_default()
    }

    /// True when at least one provider is known for `name`
    pub fn is_virtual(&self, name: &str) -> bool {
        self.providers.contains_key(name)
    }

    /// All known virtual names, sorted
    pub fn virtual_names(&self) -> impl Iterator<Item = &str> {
        self.providers.keys().map(|s| s.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{MetadataSnapshot, PackageMetadata};

    #[test]
    fn test_rebuild_and_query() {
        let snapshot = MetadataSnapshot::new()
            .with(
                PackageMetadata::new("openmpi")
                    .with_version("4.1.5")
                    .with_provides("mpi"),
            )
            .with(
                PackageMetadata::new("mpich")
                    .with_version("3.4.3")
                    .with_provides("mpi"),
            )
            .with(PackageMetadata::new("zlib").with_version("1.2.13"));

        let index = ProviderIndex::rebuild(&snapshot);
        assert!(index.is_virtual("mpi"));
        assert!(!index.is_virtual("zlib"));

        let providers = index.providers_of("mpi");
        assert_eq!(
            providers.iter().map(|s| s.as_str()).collect::<Vec<_>>(),
            ["mpich", "openmpi"]
        );
        assert!(index.providers_of("blas").is_empty());
    }

    #[test]
    fn test_rebuild_empty_snapshot() {
        let index = ProviderIndex::rebuild(&MetadataSnapshot::new());
        assert_eq!(index.virtual_names().count(), 0);
    }
}
