//! Full and incremental rebuilds of the store
//!
//! An incremental rebuild deletes the changed modules, sweeps edges left
//! pointing at deleted nodes, then re-ingests only those modules, all in one
//! transaction. If the scoped delete fails the store is cleared and rebuilt
//! from scratch; there is no partial retry.
//!
//! Changed files are mapped to modules through the files recorded on stored
//! nodes, since analyzer module names need not match directory names.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::db::Database;
use crate::error::Result;
use crate::ingest::{Analysis, Analyzer, BuildStats, GraphBuilder};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReindexMode {
    Full,
    Incremental,
    /// Incremental was requested but the scoped delete failed
    FullFallback,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReindexOutcome {
    pub mode: ReindexMode,
    /// Modules that were re-ingested; empty for full rebuilds
    pub modules: Vec<String>,
    pub deleted_nodes: usize,
    pub orphan_edges: usize,
    #[serde(skip)]
    pub build: BuildStats,
}

/// Drives rebuilds of a store from an analyzer
pub struct Reindexer<A> {
    analyzer: A,
}

impl<A: Analyzer> Reindexer<A> {
    pub fn new(analyzer: A) -> Self {
        Self { analyzer }
    }

    pub fn analyzer(&self) -> &A {
        &self.analyzer
    }

    /// Clear the store and ingest everything
    pub fn full(&self, db: &mut Database) -> Result<ReindexOutcome> {
        let analysis = self.analyzer.analyze()?;
        self.rebuild(db, &analysis, ReindexMode::Full)
    }

    /// Re-ingest only `changed` modules, falling back to a full rebuild if
    /// the scoped delete fails
    pub fn incremental(
        &self,
        db: &mut Database,
        changed: &BTreeSet<String>,
    ) -> Result<ReindexOutcome> {
        // Analyze before touching the store so a failing analyzer leaves it intact
        let analysis = self.analyzer.analyze()?;

        let scoped = in_transaction(db, |db| {
            let deleted_nodes = match db.delete_by_modules(changed) {
                Ok(n) => n,
                Err(e) => {
                    warn!("Scoped delete failed ({}), falling back to full rebuild", e);
                    return Ok(None);
                }
            };
            let orphan_edges = db.delete_orphan_edges()?;
            let build = build_graph(db, &analysis, Some(changed))?;
            Ok(Some((deleted_nodes, orphan_edges, build)))
        })?;

        let Some((deleted_nodes, orphan_edges, build)) = scoped else {
            return self.rebuild(db, &analysis, ReindexMode::FullFallback);
        };
        info!(
            "Incremental reindex of {} modules: {} nodes removed, {} nodes and {} edges added",
            changed.len(),
            deleted_nodes,
            build.nodes,
            build.edges
        );

        Ok(ReindexOutcome {
            mode: ReindexMode::Incremental,
            modules: changed.iter().cloned().collect(),
            deleted_nodes,
            orphan_edges,
            build,
        })
    }

    fn rebuild(
        &self,
        db: &mut Database,
        analysis: &Analysis,
        mode: ReindexMode,
    ) -> Result<ReindexOutcome> {
        let before = db.get_stats()?.total_nodes as usize;
        let build = in_transaction(db, |db| {
            db.clear()?;
            build_graph(db, analysis, None)
        })?;
        info!(
            "Full reindex: {} nodes, {} edges ({} closures merged)",
            build.nodes, build.edges, build.closures
        );

        Ok(ReindexOutcome {
            mode,
            modules: Vec::new(),
            deleted_nodes: before,
            orphan_edges: 0,
            build,
        })
    }

    /// Rebuild after `files` (relative to `root`) changed on disk.
    ///
    /// Known files re-ingest the modules their nodes belong to; any file the
    /// store cannot place forces a full rebuild.
    pub fn files_changed(
        &self,
        db: &mut Database,
        root: &Path,
        files: &BTreeSet<String>,
    ) -> Result<ReindexOutcome> {
        match scope_for_files(db, root, files)? {
            ChangeScope::Modules(modules) => self.incremental(db, &modules),
            ChangeScope::Everything => self.full(db),
        }
    }
}

/// Modules affected by a set of changed files
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeScope {
    Modules(BTreeSet<String>),
    /// A file belongs to no module the store knows about
    Everything,
}

/// Map changed files to modules using the files recorded on stored nodes.
///
/// An unknown file falls back to the modules of its siblings in the same
/// directory, so a new file in an existing package stays incremental.
pub fn scope_for_files(
    db: &Database,
    root: &Path,
    files: &BTreeSet<String>,
) -> Result<ChangeScope> {
    let mut by_file: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    let mut by_dir: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    for (file, module) in db.get_file_modules()? {
        let file = normalize(root, &file);
        by_dir
            .entry(parent_dir(&file).to_string())
            .or_default()
            .insert(module.clone());
        by_file.entry(file).or_default().insert(module);
    }

    let mut modules = BTreeSet::new();
    for file in files {
        let file = normalize(root, file);
        let found = by_file
            .get(&file)
            .or_else(|| by_dir.get(parent_dir(&file)));
        match found {
            Some(owners) => modules.extend(owners.iter().cloned()),
            None => {
                debug!("No module owns {}, rebuilding everything", file);
                return Ok(ChangeScope::Everything);
            }
        }
    }
    Ok(ChangeScope::Modules(modules))
}

/// Root-relative, `/`-separated form of a path as analyzers or the watcher report it
fn normalize(root: &Path, file: &str) -> String {
    let path = Path::new(file);
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative
        .components()
        .filter_map(|c| match c {
            std::path::Component::Normal(part) => part.to_str(),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

fn parent_dir(file: &str) -> &str {
    file.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("")
}

/// Run `f` inside one transaction, committing on success
fn in_transaction<T>(
    db: &mut Database,
    f: impl FnOnce(&mut Database) -> Result<T>,
) -> Result<T> {
    db.begin_transaction()?;
    match f(db) {
        Ok(value) => {
            db.commit()?;
            Ok(value)
        }
        Err(e) => {
            if let Err(rollback_err) = db.rollback() {
                warn!("Rollback failed: {}", rollback_err);
            }
            Err(e)
        }
    }
}

fn build_graph(
    db: &mut Database,
    analysis: &Analysis,
    scope: Option<&BTreeSet<String>>,
) -> Result<BuildStats> {
    let mut builder = GraphBuilder::new(db);
    if let Some(modules) = scope {
        builder.set_incremental_scope(modules.iter().cloned());
    }
    builder.build(analysis)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GraphError;
    use crate::ingest::{AnalysisRelation, AnalysisUnit};
    use crate::types::NodeKind;

    fn func(name: &str, module: &str) -> AnalysisUnit {
        AnalysisUnit::new(NodeKind::Function, name, module)
    }

    fn modules(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn program() -> Analysis {
        Analysis {
            units: vec![func("a.A", "a"), func("b.B", "b"), func("c.C", "c")],
            relations: vec![
                AnalysisRelation::calls("a.A", "b.B"),
                AnalysisRelation::calls("b.B", "c.C"),
                AnalysisRelation::calls("a.A", "c.C"),
            ],
        }
    }

    struct Failing;

    impl Analyzer for Failing {
        fn analyze(&self) -> Result<Analysis> {
            Err(GraphError::Analysis("type errors in module b".to_string()))
        }
    }

    #[test]
    fn test_full_rebuild() {
        let mut db = Database::in_memory().unwrap();
        let outcome = Reindexer::new(program()).full(&mut db).unwrap();
        assert_eq!(outcome.mode, ReindexMode::Full);
        assert_eq!(outcome.build.nodes, 3);
        assert_eq!(outcome.build.edges, 3);

        // A second full rebuild starts from an empty store
        Reindexer::new(program()).full(&mut db).unwrap();
        assert_eq!(db.get_stats().unwrap().total_nodes, 3);
    }

    #[test]
    fn test_incremental_leaves_other_modules_untouched() {
        let mut db = Database::in_memory().unwrap();
        Reindexer::new(program()).full(&mut db).unwrap();
        let a_before = db.find_node_by_name("a.A").unwrap().unwrap();
        let c_before = db.find_node_by_name("c.C").unwrap().unwrap();

        let mut changed = program();
        changed.units[1] = func("b.Renamed", "b");
        changed.relations = vec![
            AnalysisRelation::calls("a.A", "b.Renamed"),
            AnalysisRelation::calls("b.Renamed", "c.C"),
            AnalysisRelation::calls("a.A", "c.C"),
        ];

        let outcome = Reindexer::new(changed)
            .incremental(&mut db, &modules(&["b"]))
            .unwrap();
        assert_eq!(outcome.mode, ReindexMode::Incremental);
        assert_eq!(outcome.deleted_nodes, 1);
        assert_eq!(outcome.modules, vec!["b"]);

        assert_eq!(db.find_node_by_name("a.A").unwrap(), Some(a_before.clone()));
        assert_eq!(db.find_node_by_name("c.C").unwrap(), Some(c_before));
        assert!(db.find_node_by_name("b.B").unwrap().is_none());

        let renamed = db.find_node_by_name("b.Renamed").unwrap().unwrap();
        assert_eq!(db.get_callers(renamed.id).unwrap()[0].id, a_before.id);
        assert_eq!(db.get_all_edges().unwrap().len(), 3);
        assert_eq!(db.delete_orphan_edges().unwrap(), 0);
    }

    #[test]
    fn test_failed_scoped_delete_falls_back_to_full() {
        let mut db = Database::in_memory().unwrap();
        Reindexer::new(program()).full(&mut db).unwrap();
        db.conn()
            .execute_batch(
                "CREATE TRIGGER pin_nodes BEFORE DELETE ON nodes
                 BEGIN SELECT RAISE(ABORT, 'nodes are pinned'); END;",
            )
            .unwrap();

        let outcome = Reindexer::new(program())
            .incremental(&mut db, &modules(&["b"]))
            .unwrap();
        assert_eq!(outcome.mode, ReindexMode::FullFallback);
        assert_eq!(outcome.deleted_nodes, 3);

        let stats = db.get_stats().unwrap();
        assert_eq!(stats.total_nodes, 3);
        assert_eq!(stats.total_edges, 3);
        // Ids restart after the clear
        assert_eq!(db.find_node_by_name("a.A").unwrap().unwrap().id, 1);
    }

    #[test]
    fn test_analyzer_failure_leaves_store_intact() {
        let mut db = Database::in_memory().unwrap();
        Reindexer::new(program()).full(&mut db).unwrap();

        let err = Reindexer::new(Failing)
            .incremental(&mut db, &modules(&["b"]))
            .unwrap_err();
        assert!(matches!(err, GraphError::Analysis(_)));
        assert_eq!(db.get_stats().unwrap().total_nodes, 3);
    }

    #[test]
    fn test_failed_ingest_rolls_back() {
        let mut db = Database::in_memory().unwrap();
        Reindexer::new(program()).full(&mut db).unwrap();

        let mut broken = program();
        broken.units.push(AnalysisUnit::closure("b.B$1", "b.B$2", "b"));
        broken.units.push(AnalysisUnit::closure("b.B$2", "b.B$1", "b"));
        broken.units.push(func("b.New", "b"));
        broken.relations.push(AnalysisRelation::calls("b.B$1", "c.C"));

        let err = Reindexer::new(broken)
            .incremental(&mut db, &modules(&["b"]))
            .unwrap_err();
        assert!(matches!(err, GraphError::ClosureCycle(_)));
        // Delete, sweep and ingestion roll back together
        assert!(db.find_node_by_name("b.New").unwrap().is_none());
        assert!(db.find_node_by_name("b.B").unwrap().is_some());
        assert!(db.find_node_by_name("a.A").unwrap().is_some());
        assert_eq!(db.get_all_edges().unwrap().len(), 3);
    }

    fn located(name: &str, module: &str, file: &str) -> AnalysisUnit {
        let mut unit = func(name, module);
        unit.file = file.to_string();
        unit
    }

    /// Go-style program whose module names are import paths, not directories
    fn import_path_program(extra: Option<AnalysisUnit>) -> Analysis {
        let mut units = vec![
            located("example.com/app/api.Serve", "example.com/app/api", "api/server.go"),
            located("example.com/app/store.Open", "example.com/app/store", "store/db.go"),
        ];
        units.extend(extra);
        Analysis {
            units,
            relations: vec![AnalysisRelation::calls(
                "example.com/app/api.Serve",
                "example.com/app/store.Open",
            )],
        }
    }

    fn files(paths: &[&str]) -> BTreeSet<String> {
        paths.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_scope_for_files_uses_stored_modules() {
        let mut db = Database::in_memory().unwrap();
        Reindexer::new(import_path_program(None)).full(&mut db).unwrap();
        let root = Path::new("/src/app");

        assert_eq!(
            scope_for_files(&db, root, &files(&["store/db.go"])).unwrap(),
            ChangeScope::Modules(modules(&["example.com/app/store"]))
        );
        // Absolute and dotted paths resolve to the same file
        assert_eq!(
            scope_for_files(&db, root, &files(&["/src/app/api/server.go", "./store/db.go"]))
                .unwrap(),
            ChangeScope::Modules(modules(&["example.com/app/api", "example.com/app/store"]))
        );
        // A new file next to known ones belongs to their module
        assert_eq!(
            scope_for_files(&db, root, &files(&["store/tx.go"])).unwrap(),
            ChangeScope::Modules(modules(&["example.com/app/store"]))
        );
        assert_eq!(
            scope_for_files(&db, root, &files(&["cache/lru.go", "store/db.go"])).unwrap(),
            ChangeScope::Everything
        );
    }

    #[test]
    fn test_files_changed_reingests_owning_module() {
        let mut db = Database::in_memory().unwrap();
        Reindexer::new(import_path_program(None)).full(&mut db).unwrap();
        let serve = db
            .find_node_by_name("example.com/app/api.Serve")
            .unwrap()
            .unwrap();

        let added = located("example.com/app/store.Close", "example.com/app/store", "store/db.go");
        let outcome = Reindexer::new(import_path_program(Some(added)))
            .files_changed(&mut db, Path::new("/src/app"), &files(&["store/db.go"]))
            .unwrap();
        assert_eq!(outcome.mode, ReindexMode::Incremental);
        assert_eq!(outcome.modules, vec!["example.com/app/store"]);
        assert!(db
            .find_node_by_name("example.com/app/store.Close")
            .unwrap()
            .is_some());
        assert_eq!(
            db.find_node_by_name("example.com/app/api.Serve").unwrap(),
            Some(serve)
        );

        let outcome = Reindexer::new(import_path_program(None))
            .files_changed(&mut db, Path::new("/src/app"), &files(&[".callmap/analysis.json"]))
            .unwrap();
        assert_eq!(outcome.mode, ReindexMode::Full);
        assert!(db
            .find_node_by_name("example.com/app/store.Close")
            .unwrap()
            .is_none());
    }
}
