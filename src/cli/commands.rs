//! Command implementations for CLI operations

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::db::Database;
use crate::error::Lookup;
use crate::export::{ExportOptions, Exporter};
use crate::format;
use crate::graph::{Direction, Graph, TreeOptions};
use crate::impact::ImpactAnalyzer;
use crate::reindex::{ReindexMode, Reindexer};
use crate::types::{Node, NodeKind};
use crate::watch::{watch_tree, WatchConfig};

use super::db_utils::{
    analysis_path, canonicalize_path, open_existing_database, open_project_database,
    project_analyzer, resolve_database_path,
};

/// Default depth for `upstream` and `downstream`
pub const DEFAULT_TREE_DEPTH: u32 = 7;
/// Default number of rows for `risk --top`
pub const DEFAULT_RISK_LIMIT: u32 = 20;
/// Default number of search results
pub const DEFAULT_SEARCH_LIMIT: u32 = 20;

/// Project root and index location shared by every command
#[derive(Debug, Clone)]
pub struct Project {
    pub root: String,
    pub db_path: PathBuf,
}

impl Project {
    pub fn new(path: &str, db_override: Option<&str>) -> Result<Self> {
        let root = canonicalize_path(path)?;
        let db_path = resolve_database_path(&root, db_override);
        Ok(Self { root, db_path })
    }

    fn open(&self) -> Result<Database> {
        open_existing_database(&self.db_path)
    }
}

/// How `impact` prints its report
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Markdown,
    Tree,
    Json,
}

impl OutputFormat {
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "markdown" | "md" => Some(OutputFormat::Markdown),
            "tree" => Some(OutputFormat::Tree),
            "json" => Some(OutputFormat::Json),
            _ => None,
        }
    }
}

/// Resolve a name, printing candidates or a miss instead of failing
fn resolve_or_report(db: &Database, name: &str) -> Result<Option<Node>> {
    match ImpactAnalyzer::new(db).resolve(name)? {
        Lookup::Found(node) => Ok(Some(node)),
        Lookup::Ambiguous(candidates) => {
            println!("{}", format::ambiguous(name, &candidates));
            Ok(None)
        }
        Lookup::NotFound(name) => {
            println!("No entity found matching '{}'", name);
            Ok(None)
        }
    }
}

/// Where analyzer output comes from, for messages
fn analyzer_source(project: &Project, analysis: Option<&str>, command: Option<&str>) -> String {
    match (command, analysis) {
        (Some(command), _) => format!("'{}'", command),
        (None, Some(path)) => path.to_string(),
        (None, None) => analysis_path(&project.root).display().to_string(),
    }
}

/// Ingest analyzer output; a non-empty `modules` list re-ingests only those.
///
/// `analyzer_cmd` runs an external analyzer instead of reading a file.
pub fn index_command(
    project: &Project,
    analysis: Option<&str>,
    analyzer_cmd: Option<&str>,
    modules: &[String],
) -> Result<()> {
    let source = analyzer_source(project, analysis, analyzer_cmd);
    let mut db = open_project_database(&project.db_path)?;
    let reindexer = Reindexer::new(project_analyzer(&project.root, analysis, analyzer_cmd));

    let result = if modules.is_empty() {
        reindexer.full(&mut db)
    } else {
        let changed: BTreeSet<String> = modules.iter().cloned().collect();
        reindexer.incremental(&mut db, &changed)
    };
    let outcome = result.with_context(|| format!("Failed to index from {}", source))?;

    match outcome.mode {
        ReindexMode::Full => println!("\nFull index complete!"),
        ReindexMode::Incremental => {
            println!("\nIncremental index of {} modules complete!", outcome.modules.len())
        }
        ReindexMode::FullFallback => {
            println!("\nScoped delete failed; rebuilt the full index instead.")
        }
    }
    println!("  Nodes added:       {}", outcome.build.nodes);
    println!("  Edges added:       {}", outcome.build.edges);
    println!("  Nodes removed:     {}", outcome.deleted_nodes);
    println!("  Closures merged:   {}", outcome.build.closures);
    if outcome.build.duplicates > 0 {
        println!("  Duplicate edges:   {}", outcome.build.duplicates);
    }
    if outcome.build.unresolved + outcome.build.rejected > 0 {
        println!(
            "  Skipped relations: {}",
            outcome.build.unresolved + outcome.build.rejected
        );
    }

    Ok(())
}

/// Show index statistics, optionally listing modules or one module's nodes
pub fn status_command(project: &Project, list_modules: bool, module: Option<&str>) -> Result<()> {
    let db = project.open()?;
    let stats = db.get_stats()?;

    println!("Database: {}", project.db_path.display());
    print!("{}", format::stats(&stats));

    if list_modules {
        println!("\n**Module List:**");
        for module in db.get_modules()? {
            println!("- {}", module);
        }
    }

    if let Some(module) = module {
        let modules = BTreeSet::from([module.to_string()]);
        let nodes = db.get_nodes_by_modules(&modules)?;
        println!();
        print!(
            "{}",
            format::node_list(
                &format!("Nodes in {}", module),
                &nodes,
                &format!("No nodes in module '{}'", module)
            )
        );
    }

    Ok(())
}

/// Search for entities by name
pub fn search_command(
    project: &Project,
    query: &str,
    kind: Option<NodeKind>,
    limit: u32,
) -> Result<()> {
    let db = project.open()?;
    let results = db.search_nodes(query, kind, Some(limit))?;

    if results.is_empty() {
        println!("No entities found matching '{}'", query);
        return Ok(());
    }

    println!("Found {} entities matching '{}':\n", results.len(), query);
    for node in &results {
        print!("{}", format::node_with_signature(node));
    }

    Ok(())
}

fn walk_command(
    project: &Project,
    name: &str,
    depth: u32,
    flat: bool,
    direction: Direction,
) -> Result<()> {
    let db = project.open()?;
    let node = match resolve_or_report(&db, name)? {
        Some(node) => node,
        None => return Ok(()),
    };
    let graph = Graph::new(&db);

    if flat {
        let (nodes, heading) = match direction {
            Direction::Upstream => (graph.upstream(node.id, depth)?, "Callers"),
            Direction::Downstream => (graph.downstream(node.id, depth)?, "Callees"),
        };
        print!(
            "{}",
            format::node_list(
                &format!("{} of {}", heading, format::display_name(&node.name)),
                &nodes,
                "None"
            )
        );
        return Ok(());
    }

    if let Some(tree) = graph.call_tree(node.id, direction, TreeOptions::with_depth(depth))? {
        print!("{}", format::call_tree(&tree));
    }
    Ok(())
}

/// Callers of an entity, as a tree or a flat list
pub fn upstream_command(project: &Project, name: &str, depth: u32, flat: bool) -> Result<()> {
    walk_command(project, name, depth, flat, Direction::Upstream)
}

/// Callees of an entity, as a tree or a flat list
pub fn downstream_command(project: &Project, name: &str, depth: u32, flat: bool) -> Result<()> {
    walk_command(project, name, depth, flat, Direction::Downstream)
}

/// Change impact report
pub fn impact_command(
    project: &Project,
    name: &str,
    upstream_depth: u32,
    downstream_depth: u32,
    output: OutputFormat,
) -> Result<()> {
    let db = project.open()?;
    let analyzer = ImpactAnalyzer::new(&db);

    let report = match analyzer.analyze_impact(name, upstream_depth, downstream_depth)? {
        Lookup::Found(report) => report,
        Lookup::Ambiguous(candidates) => {
            println!("{}", format::ambiguous(name, &candidates));
            return Ok(());
        }
        Lookup::NotFound(name) => {
            println!("No entity found matching '{}'", name);
            return Ok(());
        }
    };

    match output {
        OutputFormat::Markdown => print!("{}", format::impact_markdown(&report)),
        OutputFormat::Tree => print!("{}", format::impact_tree(&report)),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
    }
    Ok(())
}

/// Risk of one entity, or the riskiest functions when no name is given.
///
/// `transitive` adds the exact, depth-bounded caller count.
pub fn risk_command(
    project: &Project,
    name: Option<&str>,
    limit: u32,
    transitive: Option<u32>,
) -> Result<()> {
    let db = project.open()?;
    let analyzer = ImpactAnalyzer::new(&db);

    let name = match name {
        Some(name) => name,
        None => {
            print!("{}", format::top_risky(&analyzer.top_risky(limit)?));
            return Ok(());
        }
    };

    let node = match resolve_or_report(&db, name)? {
        Some(node) => node,
        None => return Ok(()),
    };
    if let Some(score) = analyzer.risk_of(node.id)? {
        print!("{}", format::risk(&score));
    }
    if let Some(depth) = transitive {
        if let Some(exact) = analyzer.transitive_risk(node.id, depth)? {
            print!("\n{}", format::transitive_risk(&exact));
        }
    }
    Ok(())
}

/// Implementations of an interface, interfaces of a type, or every interface
pub fn implements_command(project: &Project, name: Option<&str>) -> Result<()> {
    let db = project.open()?;
    let graph = Graph::new(&db);

    let name = match name {
        Some(name) => name,
        None => {
            let interfaces = db.get_nodes_by_kind(NodeKind::Interface)?;
            if interfaces.is_empty() {
                println!("No interfaces in the index");
            }
            for iface in interfaces {
                let count = graph.implementations(iface.id)?.len();
                println!("{}  ({} implementations)", format::display_name(&iface.name), count);
            }
            return Ok(());
        }
    };

    let node = match resolve_or_report(&db, name)? {
        Some(node) => node,
        None => return Ok(()),
    };
    let display = format::display_name(&node.name);
    let listing = match node.kind {
        NodeKind::Interface => format::node_list(
            &format!("Implementations of {}", display),
            &graph.implementations(node.id)?,
            &format!("No types implement {}", display),
        ),
        NodeKind::Type => format::node_list(
            &format!("Interfaces implemented by {}", display),
            &graph.implemented_interfaces(node.id)?,
            &format!("{} implements no interfaces", display),
        ),
        kind => format!("{} is a {}, not an interface or type\n", display, kind),
    };
    print!("{}", listing);
    Ok(())
}

/// Entities of one kind grouped by module; `limit` 0 lists all of them
pub fn list_command(project: &Project, kind: NodeKind, limit: usize) -> Result<()> {
    let db = project.open()?;
    let nodes = db.get_nodes_by_kind(kind)?;
    print!("{}", format::grouped_nodes(kind, &nodes, limit));
    Ok(())
}

/// Markdown export of the index, whole or limited to `modules`.
///
/// Writes to `output` when given, otherwise to stdout.
pub fn export_command(
    project: &Project,
    modules: &[String],
    include_mermaid: bool,
    output: Option<&str>,
) -> Result<()> {
    let db = project.open()?;
    let exporter = Exporter::new(&db);

    let document = if modules.is_empty() {
        let project_name = std::path::Path::new(&project.root)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| project.root.clone());
        exporter.export(&ExportOptions {
            project_name,
            include_mermaid,
            ..ExportOptions::default()
        })?
    } else {
        exporter.export_modules(modules)?
    };

    match output {
        Some(path) if path != "-" => {
            std::fs::write(path, &document)
                .with_context(|| format!("Failed to write {}", path))?;
            eprintln!("Wrote {} bytes to {}", document.len(), path);
        }
        _ => print!("{}", document),
    }
    Ok(())
}

/// Watch the project tree and re-index until Ctrl-C.
///
/// With `analyzer_cmd` every batch of source changes re-runs the analyzer and
/// re-ingests the modules owning the changed files. Without it the analysis
/// file is watched and re-read in full whenever it is rewritten.
#[tokio::main]
pub async fn watch_command(
    project: &Project,
    analysis: Option<&str>,
    analyzer_cmd: Option<&str>,
    debounce: Option<Duration>,
) -> Result<()> {
    let db = Arc::new(Mutex::new(open_project_database(&project.db_path)?));
    let reindexer = Reindexer::new(project_analyzer(&project.root, analysis, analyzer_cmd));

    let mut config = WatchConfig {
        root: PathBuf::from(&project.root),
        ..WatchConfig::default()
    };
    if analyzer_cmd.is_none() {
        config.tracked_files.push(
            analysis
                .map(PathBuf::from)
                .unwrap_or_else(|| analysis_path(&project.root)),
        );
    }
    if let Some(debounce) = debounce {
        config.debounce = debounce;
    }

    let root = PathBuf::from(&project.root);
    let rebuild = move |files: BTreeSet<String>| -> crate::error::Result<()> {
        let mut db = db.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let outcome = reindexer.files_changed(&mut db, &root, &files)?;
        info!(
            "Reindexed ({:?}): +{} nodes, +{} edges",
            outcome.mode, outcome.build.nodes, outcome.build.edges
        );
        Ok(())
    };

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Shutting down...");
        on_signal.cancel();
    });

    println!("Watching {} (Ctrl-C to stop)", project.root);
    watch_tree(config, cancel, rebuild).await?;
    Ok(())
}
