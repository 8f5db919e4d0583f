//! Database path and initialization utilities

use std::env;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use tracing::info;

use crate::db::Database;
use crate::ingest::{Analyzer, CommandAnalyzer, JsonAnalyzer};

pub const DB_DIR: &str = ".callmap";
pub const DB_FILE: &str = "index.db";
/// Default location of the analyzer output, inside `DB_DIR`
pub const ANALYSIS_FILE: &str = "analysis.json";

/// Get the database path for a project root
pub fn database_path(project_root: &str) -> PathBuf {
    PathBuf::from(project_root).join(DB_DIR).join(DB_FILE)
}

/// Database path, honouring an explicit `--db` override
pub fn resolve_database_path(project_root: &str, db_override: Option<&str>) -> PathBuf {
    match db_override {
        Some(path) => PathBuf::from(path),
        None => database_path(project_root),
    }
}

/// Default analysis file for a project root
pub fn analysis_path(project_root: &str) -> PathBuf {
    PathBuf::from(project_root).join(DB_DIR).join(ANALYSIS_FILE)
}

/// Environment variable naming the analyzer command for `serve`
pub const ANALYZER_CMD_ENV: &str = "CALLMAP_ANALYZER_CMD";

/// Analyzer for a project: `command` runs in the root and prints analysis
/// JSON; otherwise `analysis` (or the default file) is read.
pub fn project_analyzer(
    project_root: &str,
    analysis: Option<&str>,
    command: Option<&str>,
) -> Box<dyn Analyzer + Send + Sync> {
    match command {
        Some(command) => Box::new(CommandAnalyzer::new(command, project_root)),
        None => {
            let path = analysis
                .map(PathBuf::from)
                .unwrap_or_else(|| analysis_path(project_root));
            Box::new(JsonAnalyzer::new(path))
        }
    }
}

/// Ensure the directory holding `db_path` exists
pub fn ensure_database_directory(db_path: &Path) -> Result<()> {
    if let Some(dir) = db_path.parent() {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;
    }
    Ok(())
}

/// Open or create the database at `db_path`
pub fn open_project_database(db_path: &Path) -> Result<Database> {
    ensure_database_directory(db_path)?;
    Database::open(db_path).with_context(|| format!("Failed to open {}", db_path.display()))
}

/// Open a database that must already exist
pub fn open_existing_database(db_path: &Path) -> Result<Database> {
    if !db_path.exists() {
        bail!(
            "No index found at {}. Run 'callmap index' first.",
            db_path.display()
        );
    }
    Database::open(db_path).with_context(|| format!("Failed to open {}", db_path.display()))
}

/// Canonicalize and validate a path
pub fn canonicalize_path(path: &str) -> Result<String> {
    let canonical = Path::new(path)
        .canonicalize()
        .with_context(|| format!("Invalid path: {}", path))?;
    Ok(canonical.display().to_string())
}

/// Initialize database for server mode.
///
/// The project root comes from `CALLMAP_ROOT` or the working directory;
/// `CALLMAP_IN_MEMORY=1` selects an in-memory store.
pub fn initialize_server_database(
    in_memory: bool,
    db_override: Option<&str>,
) -> Result<(String, Database)> {
    let in_memory = in_memory || env::var("CALLMAP_IN_MEMORY").map_or(false, |v| v == "1");

    let project_root = env::var("CALLMAP_ROOT")
        .or_else(|_| env::current_dir().map(|p| p.display().to_string()))
        .context("Could not determine project root")?;
    let project_root = canonicalize_path(&project_root)?;

    let db = if in_memory {
        info!("Using in-memory database (no filesystem writes)");
        Database::in_memory()?
    } else {
        open_project_database(&resolve_database_path(&project_root, db_override))?
    };

    let stats = db.get_stats()?;
    if stats.total_nodes == 0 {
        info!("Index is empty, consider running 'callmap index' first");
    } else {
        info!(
            "Index loaded: {} nodes, {} edges in {} modules",
            stats.total_nodes, stats.total_edges, stats.total_modules
        );
    }

    Ok((project_root, db))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths() {
        assert_eq!(
            database_path("/work/app"),
            PathBuf::from("/work/app/.callmap/index.db")
        );
        assert_eq!(
            resolve_database_path("/work/app", Some("/tmp/other.db")),
            PathBuf::from("/tmp/other.db")
        );
        assert_eq!(
            analysis_path("/work/app"),
            PathBuf::from("/work/app/.callmap/analysis.json")
        );
    }

    #[test]
    fn test_open_existing_requires_index() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DB_DIR).join(DB_FILE);
        assert!(open_existing_database(&path).is_err());

        open_project_database(&path).unwrap();
        assert!(open_existing_database(&path).is_ok());
    }

    #[test]
    fn test_project_analyzer_sources() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().display().to_string();
        std::fs::create_dir_all(dir.path().join(DB_DIR)).unwrap();
        std::fs::write(
            analysis_path(&root),
            r#"{"units": [{"key": "a.F", "kind": "function", "name": "a.F", "module": "a"}]}"#,
        )
        .unwrap();

        let from_file = project_analyzer(&root, None, None).analyze().unwrap();
        assert_eq!(from_file.units.len(), 1);

        let from_command = project_analyzer(&root, None, Some("echo '{\"units\": []}'"))
            .analyze()
            .unwrap();
        assert!(from_command.units.is_empty());
    }
}
