use std::fs;
use std::io::Write;
use std::path::Path;
use std::sync::{Arc, Mutex};

use modgraph_lib::models::{ConflictRule, ConflictType, LoaderType, Severity};
use modgraph_lib::storage::{JsonFileStore, MemoryStore, ModStore};
use modgraph_lib::{AnalysisService, ProgressReporter, ServiceOptions, SilentProgressReporter};
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

struct MockProgressReporter {
    events: Arc<Mutex<Vec<(String, String, u8)>>>,
}

impl ProgressReporter for MockProgressReporter {
    fn report(&self, operation: &str, message: &str, percent: u8) {
        self.events
            .lock()
            .unwrap()
            .push((operation.to_string(), message.to_string(), percent));
    }
}

fn write_jar(path: &Path, entries: &[(&str, &str)]) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    let file = fs::File::create(path).unwrap();
    let mut zip = ZipWriter::new(file);
    for (name, contents) in entries {
        zip.start_file(*name, SimpleFileOptions::default()).unwrap();
        zip.write_all(contents.as_bytes()).unwrap();
    }
    zip.finish().unwrap();
}

fn fabric_mod(dir: &Path, file: &str, id: &str, version: &str, depends: &str) {
    let json = format!(
        r#"{{"schemaVersion": 1, "id": "{}", "version": "{}", "depends": {{{}}}}}"#,
        id, version, depends
    );
    write_jar(&dir.join(file), &[("fabric.mod.json", &json)]);
}

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn service(store: Arc<dyn ModStore>) -> AnalysisService {
    init_logging();
    AnalysisService::new(
        store,
        ServiceOptions::default(),
        Arc::new(SilentProgressReporter),
    )
    .unwrap()
}

#[test]
fn missing_required_dependency_yields_one_critical_conflict() {
    let dir = tempfile::tempdir().unwrap();
    fabric_mod(dir.path(), "m1.jar", "m1", "1.0.0", r#""m2": ">=1.0.0""#);

    let report = service(Arc::new(MemoryStore::new())).analyze(dir.path()).unwrap();

    assert_eq!(report.dependencies.missing_dependencies.len(), 1);
    assert!(report.dependencies.missing_dependencies[0].required);
    assert_eq!(report.conflicts.len(), 1);
    assert_eq!(report.conflicts[0].conflict_type, ConflictType::MissingDependency);
    assert_eq!(report.conflicts[0].severity, Severity::Critical);
    assert_eq!(report.conflicts[0].affected_mods, vec!["m1", "m2"]);
    assert_eq!(report.summary.conflicts_by_severity.get(&Severity::Critical), Some(&1));
}

#[test]
fn out_of_range_version_yields_one_warning() {
    let dir = tempfile::tempdir().unwrap();
    fabric_mod(dir.path(), "m1.jar", "m1", "1.0.0", r#""m2": "[1.0.0,2.0.0)""#);
    write_jar(
        &dir.path().join("m2.jar"),
        &[(
            "META-INF/mods.toml",
            "[[mods]]\nmodId = \"m2\"\nversion = \"2.0.0\"\n",
        )],
    );

    let report = service(Arc::new(MemoryStore::new())).analyze(dir.path()).unwrap();

    assert_eq!(report.dependencies.version_conflicts.len(), 1);
    assert_eq!(report.conflicts.len(), 1);
    assert_eq!(report.conflicts[0].conflict_type, ConflictType::VersionConflict);
    assert_eq!(report.conflicts[0].severity, Severity::Warning);
    let loaders: Vec<_> = report.mods.iter().map(|m| m.loader_type).collect();
    assert_eq!(loaders, vec![LoaderType::Fabric, LoaderType::ForgeModern]);
}

#[test]
fn malformed_archive_does_not_abort_analysis() {
    let dir = tempfile::tempdir().unwrap();
    fabric_mod(dir.path(), "good.jar", "good", "1.0", "");
    fs::write(dir.path().join("bad.jar"), b"PK\x03\x04 truncated").unwrap();
    write_jar(&dir.path().join("library.jar"), &[("com/example/A.class", "x")]);

    let report = service(Arc::new(MemoryStore::new())).analyze(dir.path()).unwrap();

    assert_eq!(report.mods.len(), 1);
    assert_eq!(report.summary.failed_archives, 2);
    assert!(report.conflicts.is_empty());
}

#[test]
fn graph_is_served_from_the_recorded_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    fabric_mod(dir.path(), "a.jar", "a", "1.0", r#""b": "*""#);
    fabric_mod(dir.path(), "b.jar", "b", "1.0", "");
    let svc = service(Arc::new(MemoryStore::new()));

    assert!(svc.get_graph(dir.path()).is_err());
    svc.scan(dir.path()).unwrap();

    // Changes on disk are not visible until the next scan.
    fs::remove_file(dir.path().join("b.jar")).unwrap();
    let graph = svc.get_graph(dir.path()).unwrap();
    assert!(graph.node("b").unwrap().present);
    assert!(graph.has_edge("a", "b"));

    let refreshed = svc.refresh(dir.path()).unwrap();
    assert_eq!(refreshed.removed_mods.len(), 1);
    assert!(!svc.get_graph(dir.path()).unwrap().node("b").unwrap().present);
}

#[test]
fn json_store_keeps_cache_and_rules_between_runs() {
    let data = tempfile::tempdir().unwrap();
    let pack = tempfile::tempdir().unwrap();
    fabric_mod(pack.path(), "sodium.jar", "sodium", "0.5.3", "");
    fabric_mod(pack.path(), "optifabric.jar", "optifabric", "1.14", "");

    {
        let svc = service(Arc::new(JsonFileStore::open(data.path()).unwrap()));
        svc.add_rule(ConflictRule {
            id: 0,
            mod_id_a: "sodium".into(),
            mod_id_b: "optifabric".into(),
            conflict_type: ConflictType::KnownIncompatible,
            description: "OptiFine and Sodium both replace the renderer".into(),
            severity: Severity::Critical,
        })
        .unwrap();
        let first = svc.analyze(pack.path()).unwrap();
        assert_eq!(first.summary.cache_hit_rate, 0.0);
    }

    let events = Arc::new(Mutex::new(Vec::new()));
    let svc = AnalysisService::new(
        Arc::new(JsonFileStore::open(data.path()).unwrap()),
        ServiceOptions::default(),
        Arc::new(MockProgressReporter {
            events: events.clone(),
        }),
    )
    .unwrap();
    let second = svc.analyze(pack.path()).unwrap();

    assert_eq!(second.summary.cache_hit_rate, 100.0);
    assert_eq!(second.summary.new_mods, 0);
    assert_eq!(second.conflicts.len(), 1);
    assert_eq!(second.conflicts[0].conflict_type, ConflictType::KnownIncompatible);
    assert_eq!(svc.get_mod_metadata("sodium").unwrap().unwrap().version, "0.5.3");

    let events = events.lock().unwrap();
    assert!(events.iter().any(|(op, _, pct)| op == "scan" && *pct == 100));
    assert_eq!(events.last().map(|e| (e.0.as_str(), e.2)), Some(("analyze", 100)));
}
