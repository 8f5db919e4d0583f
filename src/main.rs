//! callmap: call graph store and change-impact engine
//!
//! Usage:
//!   callmap index [path]          Ingest analyzer output into the index
//!   callmap status [path]         Show index statistics
//!   callmap search <query>        Search for entities
//!   callmap upstream <name>       Caller tree of a function
//!   callmap downstream <name>     Callee tree of a function
//!   callmap impact <name>         What breaks if <name> changes
//!   callmap risk [name]           Fan-in risk, or the riskiest functions
//!   callmap implements [name]     Interface implementations
//!   callmap list                  Entities grouped by module
//!   callmap export                Markdown export of the graph
//!   callmap watch [path]          Re-index changed modules as files change
//!   callmap serve                 Start the MCP server (stdio transport)
//!   callmap serve --port 8080     Start the MCP server and JSON API (HTTP)

mod server;

use std::env;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use tracing::Level;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use callmap::cli::{
    downstream_command, export_command, impact_command, implements_command, index_command,
    list_command, risk_command, search_command, status_command, upstream_command, watch_command,
    OutputFormat, Project,
    DEFAULT_RISK_LIMIT, DEFAULT_SEARCH_LIMIT, DEFAULT_TREE_DEPTH,
};
use callmap::types::NodeKind;

/// Flags that consume the following argument
const VALUE_FLAGS: &[&str] = &[
    "--db",
    "--root",
    "--depth",
    "--up",
    "--down",
    "--format",
    "--top",
    "--limit",
    "--kind",
    "--analysis",
    "--analyzer-cmd",
    "--modules",
    "--module",
    "--debounce",
    "--port",
    "--output",
];

const DEFAULT_IMPACT_DEPTH: u32 = 2;

fn main() -> Result<()> {
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        print_usage();
        return Ok(());
    }

    let rest = &args[2..];
    let positional = positionals(rest);
    let db = flag_value(rest, "--db");

    match args[1].as_str() {
        "serve" => {
            setup_logging(Level::DEBUG);
            let options = server::ServeOptions {
                in_memory: has_flag(rest, "--in-memory"),
                db_path: db.map(str::to_string),
            };
            match parsed_flag::<u16>(rest, "--port")? {
                Some(port) => server::start_http(port, options)?,
                None => server::start_stdio(options)?,
            }
        }
        "index" => {
            setup_logging(Level::INFO);
            let project = Project::new(positional.first().copied().unwrap_or("."), db)?;
            let modules: Vec<String> = flag_value(rest, "--modules")
                .map(|m| m.split(',').map(|s| s.trim().to_string()).collect())
                .unwrap_or_default();
            index_command(
                &project,
                flag_value(rest, "--analysis"),
                flag_value(rest, "--analyzer-cmd"),
                &modules,
            )?;
        }
        "status" => {
            let project = Project::new(positional.first().copied().unwrap_or("."), db)?;
            status_command(
                &project,
                has_flag(rest, "--list-modules"),
                flag_value(rest, "--module"),
            )?;
        }
        "search" => {
            let Some(query) = positional.first() else {
                eprintln!("Usage: callmap search <query> [--kind <kind>] [--limit <n>]");
                return Ok(());
            };
            let kind = match flag_value(rest, "--kind") {
                Some(k) => Some(
                    NodeKind::from_str(k).with_context(|| format!("Unknown kind: {}", k))?,
                ),
                None => None,
            };
            let limit = parsed_flag(rest, "--limit")?.unwrap_or(DEFAULT_SEARCH_LIMIT);
            search_command(&query_project(rest, db)?, query, kind, limit)?;
        }
        cmd @ ("upstream" | "downstream") => {
            let Some(name) = positional.first() else {
                eprintln!("Usage: callmap {} <name> [--depth <n>] [--flat]", cmd);
                return Ok(());
            };
            let depth = parsed_flag(rest, "--depth")?.unwrap_or(DEFAULT_TREE_DEPTH);
            let flat = has_flag(rest, "--flat");
            let project = query_project(rest, db)?;
            if cmd == "upstream" {
                upstream_command(&project, name, depth, flat)?;
            } else {
                downstream_command(&project, name, depth, flat)?;
            }
        }
        "impact" => {
            let Some(name) = positional.first() else {
                eprintln!("Usage: callmap impact <name> [--up <n>] [--down <n>] [--format markdown|tree|json]");
                return Ok(());
            };
            let depth = parsed_flag(rest, "--depth")?.unwrap_or(DEFAULT_IMPACT_DEPTH);
            let up = parsed_flag(rest, "--up")?.unwrap_or(depth);
            let down = parsed_flag(rest, "--down")?.unwrap_or(depth);
            let output = match flag_value(rest, "--format") {
                Some(f) => OutputFormat::from_str(f)
                    .with_context(|| format!("Unknown format: {}", f))?,
                None => OutputFormat::Markdown,
            };
            impact_command(&query_project(rest, db)?, name, up, down, output)?;
        }
        "risk" => {
            let limit = match parsed_flag(rest, "--top")? {
                Some(n) => n,
                None => parsed_flag(rest, "--limit")?.unwrap_or(DEFAULT_RISK_LIMIT),
            };
            let transitive = if has_flag(rest, "--transitive") {
                Some(parsed_flag(rest, "--depth")?.unwrap_or(0))
            } else {
                None
            };
            risk_command(
                &query_project(rest, db)?,
                positional.first().copied(),
                limit,
                transitive,
            )?;
        }
        "implements" => {
            implements_command(&query_project(rest, db)?, positional.first().copied())?;
        }
        "list" => {
            let kind = match flag_value(rest, "--kind") {
                Some(k) => NodeKind::from_str(k).with_context(|| format!("Unknown kind: {}", k))?,
                None => NodeKind::Function,
            };
            let limit = parsed_flag(rest, "--limit")?.unwrap_or(0);
            list_command(&query_project(rest, db)?, kind, limit)?;
        }
        "export" => {
            let modules: Vec<String> = flag_value(rest, "--modules")
                .map(|m| m.split(',').map(|s| s.trim().to_string()).collect())
                .unwrap_or_default();
            export_command(
                &query_project(rest, db)?,
                &modules,
                !has_flag(rest, "--no-mermaid"),
                flag_value(rest, "--output"),
            )?;
        }
        "watch" => {
            setup_logging(Level::INFO);
            let project = Project::new(positional.first().copied().unwrap_or("."), db)?;
            let debounce = parsed_flag::<u64>(rest, "--debounce")?.map(Duration::from_millis);
            watch_command(
                &project,
                flag_value(rest, "--analysis"),
                flag_value(rest, "--analyzer-cmd"),
                debounce,
            )?;
        }
        "help" | "--help" | "-h" => {
            print_usage();
        }
        "--version" | "-V" | "version" => {
            print_version();
        }
        cmd => {
            eprintln!("Unknown command: {}", cmd);
            print_usage();
        }
    }

    Ok(())
}

/// Query commands take the project root from `--root`, defaulting to `.`
fn query_project(args: &[String], db: Option<&str>) -> Result<Project> {
    Project::new(flag_value(args, "--root").unwrap_or("."), db)
}

fn has_flag(args: &[String], flag: &str) -> bool {
    args.iter().any(|a| a == flag)
}

fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .map(String::as_str)
}

fn parsed_flag<T: std::str::FromStr>(args: &[String], flag: &str) -> Result<Option<T>> {
    match flag_value(args, flag) {
        Some(raw) => match raw.parse::<T>() {
            Ok(v) => Ok(Some(v)),
            Err(_) => bail!("Invalid value for {}: {}", flag, raw),
        },
        None => Ok(None),
    }
}

/// Arguments that are neither flags nor flag values
fn positionals(args: &[String]) -> Vec<&str> {
    let mut out = Vec::new();
    let mut skip = false;
    for arg in args {
        if skip {
            skip = false;
            continue;
        }
        if VALUE_FLAGS.contains(&arg.as_str()) {
            skip = true;
        } else if !arg.starts_with("--") {
            out.push(arg.as_str());
        }
    }
    out
}

fn print_usage() {
    println!(
        r#"callmap: call graph store and change-impact engine

USAGE:
    callmap <COMMAND> [OPTIONS]

COMMANDS:
    index [path]           Ingest .callmap/analysis.json (or --analysis <file>)
                           --analyzer-cmd <cmd> runs an analyzer printing JSON instead
                           --modules a,b re-ingests only those modules
    status [path]          Show index statistics (--list-modules, --module <m>)
    search <query>         Search entities by name (--kind, --limit)
    upstream <name>        Caller tree (--depth <n>, 0 = unbounded; --flat)
    downstream <name>      Callee tree (--depth <n>, 0 = unbounded; --flat)
    impact <name>          Change impact (--up <n> --down <n>, --format markdown|tree|json)
    risk [name]            Risk of one entity, or the top --top <n> functions
                           --transitive adds exact caller counts (--depth <n>)
    implements [name]      Implementations of an interface or interfaces of a type
    list                   Entities grouped by module (--kind, --limit <n>, 0 = all)
    export                 Markdown export (--output <file>, --no-mermaid)
                           --modules a,b reports only callers into those modules
    watch [path]           Re-index on file changes (--debounce <ms>)
                           --analyzer-cmd <cmd> re-analyzes and re-ingests the modules
                           owning changed files; otherwise the analysis file is watched
    serve                  Start the MCP server (stdio transport)
    serve --port <PORT>    Start the MCP server and JSON API (HTTP transport)
    help                   Show this help message

OPTIONS:
    --db <path>            Use an index other than <root>/.callmap/index.db
    --root <path>          Project root for query commands (default: .)

ENVIRONMENT:
    CALLMAP_LOG            Log filter, e.g. debug or callmap=trace
    CALLMAP_ROOT           Project root for serve
    CALLMAP_IN_MEMORY=1    Serve from an in-memory index
    CALLMAP_ANALYZER_CMD   Analyzer command used by the callmap_reindex tool

EXAMPLES:
    callmap index                        # Ingest .callmap/analysis.json
    callmap impact store.Open            # What breaks if store.Open changes
    callmap upstream "(*DB).Query" --depth 3
    callmap risk --top 10
    callmap watch --analyzer-cmd ./scripts/analyze.sh
    callmap export --output docs/callgraph.md
    callmap serve --port 8080            # MCP on /mcp, JSON on /api
"#
    );
}

fn print_version() {
    println!("callmap {}", env!("CARGO_PKG_VERSION"));
}

fn setup_logging(default_level: Level) {
    let filter = EnvFilter::try_from_env("CALLMAP_LOG")
        .unwrap_or_else(|_| EnvFilter::new(default_level.to_string().to_lowercase()));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber).ok();
}
