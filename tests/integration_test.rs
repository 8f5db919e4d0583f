//! Integration tests for callmap
//!
//! These tests verify the end-to-end workflow: analyzer output on disk is
//! ingested into a file-backed index, queried, and incrementally rebuilt.

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use callmap::db::Database;
use callmap::error::Lookup;
use callmap::graph::{Graph, TreeOptions};
use callmap::impact::ImpactAnalyzer;
use callmap::ingest::{CommandAnalyzer, JsonAnalyzer};
use callmap::reindex::{ReindexMode, Reindexer};
use callmap::types::{NodeKind, RiskLevel};
use tempfile::tempdir;

const ANALYSIS_V1: &str = r#"{
    "units": [
        {"key": "cmd.main", "kind": "function", "name": "cmd.main", "module": "cmd", "file": "cmd/main.go", "line": 5},
        {"key": "app.run", "kind": "function", "name": "app.run", "module": "app", "file": "app/run.go", "line": 10,
         "signature": "func run() error"},
        {"key": "app.run$1", "kind": "function", "name": "app.run$1", "module": "app", "enclosing": "app.run"},
        {"key": "store.Open", "kind": "function", "name": "store.Open", "module": "store", "file": "store/db.go", "line": 20},
        {"key": "store.Query", "kind": "function", "name": "store.Query", "module": "store", "file": "store/db.go", "line": 40},
        {"key": "store.MaxConns", "kind": "constant", "name": "store.MaxConns", "module": "store", "file": "store/db.go", "line": 3},
        {"key": "store.Store", "kind": "interface", "name": "store.Store", "module": "store", "file": "store/store.go", "line": 1},
        {"key": "store.DB", "kind": "type", "name": "store.DB", "module": "store", "file": "store/db.go", "line": 8}
    ],
    "relations": [
        {"from": "cmd.main", "to": "app.run", "kind": "calls", "file": "cmd/main.go", "line": 7},
        {"from": "app.run$1", "to": "store.Open", "kind": "calls"},
        {"from": "app.run$1", "to": "app.run", "kind": "calls"},
        {"from": "app.run", "to": "store.Query", "kind": "calls"},
        {"from": "store.Open", "to": "store.MaxConns", "kind": "references"},
        {"from": "store.Query", "to": "store.MaxConns", "kind": "references"},
        {"from": "store.DB", "to": "store.Store", "kind": "implements"}
    ]
}"#;

/// store.Open is gone, store.Close is new and called from app
const ANALYSIS_V2: &str = r#"{
    "units": [
        {"key": "cmd.main", "kind": "function", "name": "cmd.main", "module": "cmd", "file": "cmd/main.go", "line": 5},
        {"key": "app.run", "kind": "function", "name": "app.run", "module": "app", "file": "app/run.go", "line": 10},
        {"key": "store.Query", "kind": "function", "name": "store.Query", "module": "store", "file": "store/db.go", "line": 40},
        {"key": "store.Close", "kind": "function", "name": "store.Close", "module": "store", "file": "store/db.go", "line": 60},
        {"key": "store.MaxConns", "kind": "constant", "name": "store.MaxConns", "module": "store", "file": "store/db.go", "line": 3}
    ],
    "relations": [
        {"from": "cmd.main", "to": "app.run", "kind": "calls"},
        {"from": "app.run", "to": "store.Query", "kind": "calls"},
        {"from": "app.run", "to": "store.Close", "kind": "calls"},
        {"from": "store.Query", "to": "store.MaxConns", "kind": "references"}
    ]
}"#;

fn write_analysis(path: &Path, content: &str) {
    fs::write(path, content).unwrap();
}

fn names(nodes: &[callmap::types::Node]) -> BTreeSet<String> {
    nodes.iter().map(|n| n.name.clone()).collect()
}

#[test]
fn test_end_to_end_index_and_query() {
    let dir = tempdir().unwrap();
    let analysis = dir.path().join("analysis.json");
    write_analysis(&analysis, ANALYSIS_V1);

    let mut db = Database::open(dir.path().join("index.db")).unwrap();
    let outcome = Reindexer::new(JsonAnalyzer::new(&analysis))
        .full(&mut db)
        .unwrap();
    assert_eq!(outcome.mode, ReindexMode::Full);
    assert_eq!(outcome.build.nodes, 7);
    assert_eq!(outcome.build.closures, 1);

    // The closure never becomes an entity; its call is attributed to app.run
    assert!(db.find_node_by_name("app.run$1").unwrap().is_none());
    let run = db.find_node_by_name("app.run").unwrap().unwrap();
    let graph = Graph::new(&db);
    assert_eq!(
        names(&graph.direct_callees(run.id).unwrap()),
        BTreeSet::from(["store.Open".to_string(), "store.Query".to_string()])
    );
    // app.run$1 -> app.run collapses to a self-loop and is dropped
    assert!(graph.direct_callers(run.id).unwrap().iter().all(|n| n.id != run.id));

    let open = db.find_node_by_name("store.Open").unwrap().unwrap();
    assert_eq!(
        names(&graph.upstream(open.id, 0).unwrap()),
        BTreeSet::from(["app.run".to_string(), "cmd.main".to_string()])
    );

    let tree = graph.upstream_tree(open.id, TreeOptions::default()).unwrap().unwrap();
    assert_eq!(tree.root.size(), 3);
    assert!(!tree.truncated);

    let db_iface = db.find_node_by_name("store.Store").unwrap().unwrap();
    assert_eq!(
        names(&graph.implementations(db_iface.id).unwrap()),
        BTreeSet::from(["store.DB".to_string()])
    );
}

#[test]
fn test_end_to_end_impact_analysis() {
    let dir = tempdir().unwrap();
    let analysis = dir.path().join("analysis.json");
    write_analysis(&analysis, ANALYSIS_V1);

    let mut db = Database::open(dir.path().join("index.db")).unwrap();
    Reindexer::new(JsonAnalyzer::new(&analysis))
        .full(&mut db)
        .unwrap();
    let analyzer = ImpactAnalyzer::new(&db);

    let report = analyzer
        .analyze_impact("store.Query", 2, 2)
        .unwrap()
        .found()
        .unwrap();
    assert_eq!(names(&report.direct_callers), BTreeSet::from(["app.run".to_string()]));
    assert_eq!(names(&report.indirect_callers), BTreeSet::from(["cmd.main".to_string()]));
    assert!(report.direct_callees.is_empty());
    assert_eq!(report.risk, RiskLevel::Low);

    // Values report the functions referencing them
    let report = analyzer
        .analyze_impact("MaxConns", 2, 2)
        .unwrap()
        .found()
        .unwrap();
    assert!(report.is_value_target());
    assert_eq!(
        names(&report.direct_callers),
        BTreeSet::from(["store.Open".to_string(), "store.Query".to_string()])
    );

    // "store.O" is a substring of nothing but store.Open; "store" is ambiguous
    assert!(matches!(
        analyzer.analyze_impact("store.O", 1, 1).unwrap(),
        Lookup::Found(_)
    ));
    match analyzer.analyze_impact("store", 1, 1).unwrap() {
        Lookup::Ambiguous(candidates) => assert!(candidates.len() > 1),
        other => panic!("expected ambiguity, got {:?}", other),
    }
    assert!(matches!(
        analyzer.analyze_impact("nothing.here", 1, 1).unwrap(),
        Lookup::NotFound(_)
    ));
}

#[test]
fn test_incremental_reindex_preserves_other_modules() {
    let dir = tempdir().unwrap();
    let analysis = dir.path().join("analysis.json");
    write_analysis(&analysis, ANALYSIS_V1);

    let mut db = Database::open(dir.path().join("index.db")).unwrap();
    let reindexer = Reindexer::new(JsonAnalyzer::new(&analysis));
    reindexer.full(&mut db).unwrap();
    let run_before = db.find_node_by_name("app.run").unwrap().unwrap();
    let main_before = db.find_node_by_name("cmd.main").unwrap().unwrap();

    write_analysis(&analysis, ANALYSIS_V2);
    let changed = BTreeSet::from(["store".to_string()]);
    let outcome = reindexer.incremental(&mut db, &changed).unwrap();
    assert_eq!(outcome.mode, ReindexMode::Incremental);
    assert_eq!(outcome.modules, vec!["store".to_string()]);

    // Untouched modules keep their ids
    let run_after = db.find_node_by_name("app.run").unwrap().unwrap();
    assert_eq!(run_after.id, run_before.id);
    assert_eq!(
        db.find_node_by_name("cmd.main").unwrap().unwrap().id,
        main_before.id
    );

    assert!(db.find_node_by_name("store.Open").unwrap().is_none());
    assert!(db.find_node_by_name("store.Store").unwrap().is_none());
    let close = db.find_node_by_name("store.Close").unwrap().unwrap();

    // Cross-module edges into the re-ingested module are restored
    let graph = Graph::new(&db);
    assert_eq!(
        names(&graph.direct_callers(close.id).unwrap()),
        BTreeSet::from(["app.run".to_string()])
    );
    assert_eq!(
        names(&graph.direct_callees(run_after.id).unwrap()),
        BTreeSet::from(["store.Close".to_string(), "store.Query".to_string()])
    );

    // No edge points at a deleted node
    for edge in db.get_all_edges().unwrap() {
        assert!(db.get_node(edge.source_id).unwrap().is_some());
        assert!(db.get_node(edge.target_id).unwrap().is_some());
    }
}

#[test]
fn test_database_persistence() {
    let dir = tempdir().unwrap();
    let analysis = dir.path().join("analysis.json");
    let db_path = dir.path().join("index.db");
    write_analysis(&analysis, ANALYSIS_V1);

    {
        let mut db = Database::open(&db_path).unwrap();
        Reindexer::new(JsonAnalyzer::new(&analysis))
            .full(&mut db)
            .unwrap();
    }

    {
        let db = Database::open(&db_path).unwrap();
        let stats = db.get_stats().unwrap();
        assert_eq!(stats.total_nodes, 7);
        assert_eq!(stats.total_modules, 3);
        assert_eq!(
            db.get_modules().unwrap(),
            vec!["app".to_string(), "cmd".to_string(), "store".to_string()]
        );

        let top = ImpactAnalyzer::new(&db).top_risky(1).unwrap();
        assert_eq!(top.len(), 1);
        assert_eq!(top[0].node.kind, NodeKind::Function);
        assert_eq!(top[0].direct_callers, 1);
    }
}

/// Module names are import paths; directories are not
const IMPORT_PATHS_V1: &str = r#"{
    "units": [
        {"key": "api.Serve", "kind": "function", "name": "example.com/app/api.Serve", "module": "example.com/app/api", "file": "api/server.go", "line": 4},
        {"key": "store.Open", "kind": "function", "name": "example.com/app/store.Open", "module": "example.com/app/store", "file": "internal/store/db.go", "line": 9}
    ],
    "relations": [{"from": "api.Serve", "to": "store.Open", "kind": "calls"}]
}"#;

const IMPORT_PATHS_V2: &str = r#"{
    "units": [
        {"key": "api.Serve", "kind": "function", "name": "example.com/app/api.Serve", "module": "example.com/app/api", "file": "api/server.go", "line": 4},
        {"key": "store.Open", "kind": "function", "name": "example.com/app/store.Open", "module": "example.com/app/store", "file": "internal/store/db.go", "line": 9},
        {"key": "store.Ping", "kind": "function", "name": "example.com/app/store.Ping", "module": "example.com/app/store", "file": "internal/store/ping.go", "line": 3}
    ],
    "relations": [
        {"from": "api.Serve", "to": "store.Open", "kind": "calls"},
        {"from": "api.Serve", "to": "store.Ping", "kind": "calls"}
    ]
}"#;

#[test]
fn test_changed_files_reindex_through_command_analyzer() {
    let dir = tempdir().unwrap();
    let out = dir.path().join("out.json");
    write_analysis(&out, IMPORT_PATHS_V1);

    let mut db = Database::open(dir.path().join("index.db")).unwrap();
    let reindexer = Reindexer::new(CommandAnalyzer::new("cat out.json", dir.path()));
    reindexer.full(&mut db).unwrap();
    let serve_before = db
        .find_node_by_name("example.com/app/api.Serve")
        .unwrap()
        .unwrap();

    // A new file in internal/store belongs to example.com/app/store
    write_analysis(&out, IMPORT_PATHS_V2);
    let outcome = reindexer
        .files_changed(
            &mut db,
            dir.path(),
            &BTreeSet::from(["internal/store/ping.go".to_string()]),
        )
        .unwrap();
    assert_eq!(outcome.mode, ReindexMode::Incremental);
    assert_eq!(outcome.modules, vec!["example.com/app/store".to_string()]);

    let ping = db
        .find_node_by_name("example.com/app/store.Ping")
        .unwrap()
        .unwrap();
    assert_eq!(
        db.find_node_by_name("example.com/app/api.Serve").unwrap(),
        Some(serve_before.clone())
    );
    assert_eq!(
        names(&Graph::new(&db).direct_callers(ping.id).unwrap()),
        BTreeSet::from(["example.com/app/api.Serve".to_string()])
    );
}
