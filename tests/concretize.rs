// tests/concretize.rs

//! End-to-end concretization scenarios over the shared mpi universe.

mod common;

use common::mpi_universe;
use smelt::concretize::concretize;
use smelt::config::SolverConfig;
use smelt::spec::{DepTypes, Spec, parser};
use smelt::{Error, VariantValue};

fn solve(text: &str, config: &SolverConfig) -> smelt::Result<Vec<Spec>> {
    let roots = parser::parse_forest(text).unwrap();
    concretize(&roots, &mpi_universe(), config)
}

fn find<'a>(spec: &'a Spec, name: &str) -> Option<&'a Spec> {
    if spec.name == name {
        return Some(spec);
    }
    spec.dependencies
        .iter()
        .find_map(|e| find(&e.spec, name))
}

#[test]
fn test_solve_fills_every_field() {
    let config = SolverConfig::default();
    let forest = solve("app", &config).unwrap();
    assert_eq!(forest.len(), 1);

    let app = &forest[0];
    assert!(app.is_concrete());
    assert_eq!(app.version().unwrap().to_string(), "2.0");
    assert_eq!(app.variant("ssl"), Some(&VariantValue::Bool(false)));
    assert!(app.compiler.is_some());
    assert!(app.hash.is_some());

    // mpi resolved to a real provider somewhere in the tree
    assert!(find(app, "mpi").is_none());
    assert!(find(app, "openmpi").is_some() || find(app, "mpich").is_some());
    assert!(find(app, "zlib").is_some());
}

#[test]
fn test_provider_preference_flips_the_choice() {
    let mut config = SolverConfig::default();
    config
        .providers
        .insert("mpi".to_string(), vec!["mpich".to_string()]);
    let forest = solve("app", &config).unwrap();
    assert!(find(&forest[0], "mpich").is_some());
    assert!(find(&forest[0], "openmpi").is_none());

    config
        .providers
        .insert("mpi".to_string(), vec!["openmpi".to_string()]);
    let forest = solve("app", &config).unwrap();
    assert!(find(&forest[0], "openmpi").is_some());
    assert!(find(&forest[0], "mpich").is_none());
    // openmpi drags in hwloc
    assert!(find(&forest[0], "hwloc").is_some());
}

#[test]
fn test_user_pin_narrows_the_dependency() {
    let config = SolverConfig::default();
    let forest = solve("app ^zlib@1.2.13", &config).unwrap();
    let zlib = find(&forest[0], "zlib").unwrap();
    assert_eq!(zlib.version().unwrap().to_string(), "1.2.13");
}

#[test]
fn test_user_added_dependency_edge_is_kept() {
    // hwloc is not among app's declared dependencies; a user `^hwloc`
    // must still appear as an edge in the concrete tree
    let mut config = SolverConfig::default();
    config
        .providers
        .insert("mpi".to_string(), vec!["mpich".to_string()]);
    let forest = solve("app ^hwloc", &config).unwrap();
    let app = &forest[0];
    assert!(app.find_dependency("hwloc").is_some());
    assert!(find(app, "hwloc").unwrap().is_concrete());
}

#[test]
fn test_disjoint_user_pins_on_shared_dependency_are_unsat() {
    let config = SolverConfig::default();
    let roots = parser::parse_forest("app ^zlib@1.2:1.2.13 app ^zlib@1.3:").unwrap();
    let err = concretize(&roots, &mpi_universe(), &config).unwrap_err();
    assert!(matches!(err, Error::Concretization(_)), "got: {err}");
}

#[test]
fn test_unification_across_roots() {
    let config = SolverConfig::default();
    let forest = solve("app zlib@1.2.13", &config).unwrap();
    assert_eq!(forest.len(), 2);
    let via_app = find(&forest[0], "zlib").unwrap();
    let standalone = &forest[1];
    assert_eq!(standalone.name, "zlib");
    // One concrete node per name: same version, same hash
    assert_eq!(via_app.version(), standalone.version());
    assert_eq!(via_app.hash, standalone.hash);
}

#[test]
fn test_disjoint_ranges_report_both_sides() {
    let config = SolverConfig::default();
    let roots = parser::parse_forest("zlib@1.0:1.5 zlib@1.6:2.0").unwrap();
    let err = concretize(&roots, &mpi_universe(), &config).unwrap_err();
    match err {
        Error::Concretization(report) => {
            assert_eq!(report.package, "zlib");
            let rendered = report.to_string();
            assert!(rendered.contains("1.0:1.5"), "got: {rendered}");
            assert!(rendered.contains("1.6:2.0"), "got: {rendered}");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_determinism_across_repeated_solves() {
    let config = SolverConfig::default();
    let first = solve("app +ssl ^zlib@1.2:", &config).unwrap();
    for _ in 0..5 {
        let again = solve("app +ssl ^zlib@1.2:", &config).unwrap();
        assert_eq!(first, again);
    }
}

#[test]
fn test_hash_stable_under_test_only_dependency() {
    use smelt::dag;
    let config = SolverConfig::default();
    let plain = solve("zlib@1.2.13", &config).unwrap();

    // Attach a test-only edge to the already-concrete node by hand
    let mut with_test = plain.clone();
    let extra = solve("hwloc", &config).unwrap().remove(0);
    with_test[0].hash = None;
    with_test[0].dependencies.push(smelt::spec::DepEdge {
        spec: extra,
        deptypes: DepTypes::TEST,
    });
    dag::hash_forest(&mut with_test).unwrap();

    assert_eq!(plain[0].hash, with_test[0].hash);
}

#[test]
fn test_unknown_package_fails() {
    let config = SolverConfig::default();
    assert!(solve("no-such-package", &config).is_err());
}
