// tests/spec_grammar.rs

//! End-to-end checks of the spec grammar: parsing, printing, and the
//! round-trip property.

use smelt::Error;
use smelt::spec::{DepType, Spec, VariantValue, parser};

fn roundtrip(text: &str) {
    let spec = Spec::parse(text).unwrap();
    let printed = spec.to_string();
    let reparsed = Spec::parse(&printed).unwrap();
    assert_eq!(spec, reparsed, "round-trip changed '{}' -> '{}'", text, printed);
}

#[test]
fn test_roundtrip_meaningful_specs() {
    roundtrip("zlib");
    roundtrip("zlib@1.2.13");
    roundtrip("app@1.0:2.0");
    roundtrip("app@:2.0 +ssl ~static");
    roundtrip("app@1.0,2.0,3.0:4.0");
    roundtrip("app %gcc@12.2.0");
    roundtrip("app arch=linux-rhel8-x86_64");
    roundtrip("app +ssl build_type=Release ^zlib@1.2: ^openssl@3:");
    roundtrip("app ^[deptypes=build]cmake ^[deptypes=link,run]openssl");
}

#[test]
fn test_quoted_variant_values() {
    let spec = Spec::parse("app cflags=\"-O2 -g\"").unwrap();
    assert_eq!(
        spec.variant("cflags"),
        Some(&VariantValue::Single("-O2 -g".to_string()))
    );
    // Values with whitespace come back quoted
    let printed = spec.to_string();
    assert!(printed.contains("cflags=\"-O2 -g\""), "got '{}'", printed);
    roundtrip("app cflags=\"-O2 -g\"");
}

#[test]
fn test_concrete_spec_with_transitive_deps_prints_flat() {
    use smelt::spec::{Arch, CompilerSpec, DepEdge, DepTypes};
    use smelt::{Version, VersionConstraint};

    fn concrete(name: &str, version: &str) -> Spec {
        let mut spec = Spec::new(name);
        spec.versions = VersionConstraint::exact(Version::parse(version).unwrap());
        spec.compiler = Some(CompilerSpec::with_versions(
            "gcc",
            VersionConstraint::parse("12.2.0").unwrap(),
        ));
        spec.arch = Arch::concrete("linux", "rhel8", "x86_64");
        spec
    }

    // app -> openmpi -> hwloc, two levels of nesting
    let mut openmpi = concrete("openmpi", "4.1.5");
    openmpi.dependencies.push(DepEdge {
        spec: concrete("hwloc", "2.9.0"),
        deptypes: DepTypes::default_types(),
    });
    let mut app = concrete("app", "1.0");
    app.dependencies.push(DepEdge {
        spec: openmpi,
        deptypes: DepTypes::default_types(),
    });

    let printed = app.to_string();
    let reparsed = Spec::parse(&printed).unwrap();

    // Every transitive node shows up exactly once at the root level
    let names: Vec<&str> = reparsed
        .dependencies
        .iter()
        .map(|e| e.spec.name.as_str())
        .collect();
    assert_eq!(names, ["openmpi", "hwloc"], "got '{}'", printed);
    assert_eq!(
        reparsed
            .find_dependency("hwloc")
            .unwrap()
            .spec
            .version()
            .unwrap()
            .to_string(),
        "2.9.0"
    );
    // The printed form is a fixpoint of print-then-parse
    assert_eq!(reparsed.to_string(), printed);
}

#[test]
fn test_dependency_attachment() {
    // Successive ^ clauses attach to the most recent root
    let forest = parser::parse_forest("app ^zlib ^openssl other ^bzip2").unwrap();
    assert_eq!(forest.len(), 2);
    assert_eq!(forest[0].name, "app");
    assert_eq!(forest[0].dependencies.len(), 2);
    assert_eq!(forest[1].name, "other");
    assert_eq!(forest[1].dependencies.len(), 1);
    assert_eq!(forest[1].dependencies[0].spec.name, "bzip2");
}

#[test]
fn test_deptype_annotations() {
    let spec = Spec::parse("app ^[deptypes=build,test]cmake").unwrap();
    let edge = spec.find_dependency("cmake").unwrap();
    assert!(edge.deptypes.contains(DepType::Build));
    assert!(edge.deptypes.contains(DepType::Test));
    assert!(!edge.deptypes.contains(DepType::Link));
}

#[test]
fn test_unterminated_quote_reports_offset() {
    let err = Spec::parse("app cflags=\"-O2").unwrap_err();
    match err {
        Error::Parse { text, offset, .. } => {
            assert_eq!(text, "app cflags=\"-O2");
            assert!(offset > 0);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_empty_deptype_list_is_rejected() {
    assert!(matches!(
        Spec::parse("app ^[deptypes=]cmake"),
        Err(Error::Parse { .. })
    ));
}

#[test]
fn test_caret_without_name_is_rejected() {
    assert!(matches!(Spec::parse("app ^"), Err(Error::Parse { .. })));
    assert!(matches!(Spec::parse("app ^ @1.0"), Err(Error::Parse { .. })));
}

#[test]
fn test_version_ordering_semantics() {
    use smelt::Version;
    let v = |s: &str| Version::parse(s).unwrap();
    // prerelease sorts below release, patch sorts above
    assert!(v("2.0") > v("2.0rc1"));
    assert!(v("2.0.1") > v("2.0"));
    assert!(v("1.10") > v("1.9"));
}

#[test]
fn test_constraint_intersection_in_grammar_terms() {
    use smelt::VersionConstraint;
    let a = VersionConstraint::parse("1.0:1.5").unwrap();
    let b = VersionConstraint::parse("1.4:2.0").unwrap();
    assert!(a.intersect(&b).is_some());

    let disjoint = VersionConstraint::parse("1.6:2.0").unwrap();
    assert!(a.intersect(&disjoint).is_none());
}
