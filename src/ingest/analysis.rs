//! Analyzer output model and the `Analyzer` seam
//!
//! An external static analyzer describes a program as a flat list of units
//! (addressable entities plus anonymous closures) and relations between them.
//! Units refer to each other by an analyzer-local `key`; store ids are only
//! assigned once the builder persists them.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{GraphError, Result};
use crate::types::{EdgeKind, Node, NodeKind};

/// A candidate unit emitted by the analyzer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisUnit {
    pub key: String,
    pub kind: NodeKind,
    /// Fully qualified name
    pub name: String,
    pub module: String,
    #[serde(default)]
    pub file: String,
    #[serde(default)]
    pub line: u32,
    #[serde(default)]
    pub signature: Option<String>,
    #[serde(default)]
    pub doc: Option<String>,
    /// Key of the lexically enclosing unit; set only for closures
    #[serde(default)]
    pub enclosing: Option<String>,
}

impl AnalysisUnit {
    pub fn new(kind: NodeKind, name: impl Into<String>, module: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            key: name.clone(),
            kind,
            name,
            module: module.into(),
            file: String::new(),
            line: 0,
            signature: None,
            doc: None,
            enclosing: None,
        }
    }

    /// A closure nested inside `enclosing`
    pub fn closure(key: impl Into<String>, enclosing: impl Into<String>, module: impl Into<String>) -> Self {
        let key = key.into();
        Self {
            enclosing: Some(enclosing.into()),
            ..Self::new(NodeKind::Function, key, module)
        }
    }

    pub fn is_closure(&self) -> bool {
        self.enclosing.is_some()
    }

    pub fn to_node(&self) -> Node {
        Node {
            id: 0,
            kind: self.kind,
            name: self.name.clone(),
            module: self.module.clone(),
            file_path: self.file.clone(),
            line: self.line,
            signature: self.signature.clone(),
            docstring: self.doc.clone(),
        }
    }
}

/// A directed relation between two unit keys
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisRelation {
    pub from: String,
    pub to: String,
    pub kind: EdgeKind,
    #[serde(default)]
    pub file: Option<String>,
    #[serde(default)]
    pub line: Option<u32>,
}

impl AnalysisRelation {
    pub fn new(from: impl Into<String>, to: impl Into<String>, kind: EdgeKind) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            kind,
            file: None,
            line: None,
        }
    }

    pub fn calls(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self::new(from, to, EdgeKind::Calls)
    }
}

/// Complete analyzer output for one program
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Analysis {
    #[serde(default)]
    pub units: Vec<AnalysisUnit>,
    #[serde(default)]
    pub relations: Vec<AnalysisRelation>,
}

/// Source of analyzer output.
///
/// Implementations always describe the whole program; restricting what gets
/// persisted is the builder's job (see `GraphBuilder::set_incremental_scope`).
pub trait Analyzer {
    fn analyze(&self) -> Result<Analysis>;
}

impl Analyzer for Analysis {
    fn analyze(&self) -> Result<Analysis> {
        Ok(self.clone())
    }
}

impl<T: Analyzer + ?Sized> Analyzer for Box<T> {
    fn analyze(&self) -> Result<Analysis> {
        (**self).analyze()
    }
}

/// Reads analyzer output previously written as JSON
#[derive(Debug, Clone)]
pub struct JsonAnalyzer {
    path: PathBuf,
}

impl JsonAnalyzer {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Analyzer for JsonAnalyzer {
    fn analyze(&self) -> Result<Analysis> {
        let content =
            fs::read_to_string(&self.path).map_err(|e| GraphError::io(&self.path, e))?;
        let analysis: Analysis = serde_json::from_str(&content)?;
        debug!(
            "Loaded {} units and {} relations from {}",
            analysis.units.len(),
            analysis.relations.len(),
            self.path.display()
        );
        Ok(analysis)
    }
}

/// Runs an external analyzer through the shell and reads the analysis it
/// prints on stdout.
///
/// The command runs in `cwd` on every call, so each rebuild sees the current
/// source tree.
#[derive(Debug, Clone)]
pub struct CommandAnalyzer {
    command: String,
    cwd: PathBuf,
}

impl CommandAnalyzer {
    pub fn new(command: impl Into<String>, cwd: impl AsRef<Path>) -> Self {
        Self {
            command: command.into(),
            cwd: cwd.as_ref().to_path_buf(),
        }
    }

    pub fn command(&self) -> &str {
        &self.command
    }
}

impl Analyzer for CommandAnalyzer {
    fn analyze(&self) -> Result<Analysis> {
        debug!("Running analyzer: {}", self.command);
        let output = Command::new("sh")
            .arg("-c")
            .arg(&self.command)
            .current_dir(&self.cwd)
            .output()
            .map_err(|e| GraphError::io(&self.cwd, e))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(GraphError::Analysis(format!(
                "'{}' exited with {}: {}",
                self.command,
                output.status.code().unwrap_or(-1),
                stderr.trim()
            )));
        }

        let analysis: Analysis = serde_json::from_slice(&output.stdout)?;
        debug!(
            "Analyzer produced {} units and {} relations",
            analysis.units.len(),
            analysis.relations.len()
        );
        Ok(analysis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_analyzer_reads_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("analysis.json");
        fs::write(
            &path,
            r#"{
                "units": [
                    {"key": "app.main", "kind": "function", "name": "app.main", "module": "app"},
                    {"key": "app.main$1", "kind": "function", "name": "app.main$1",
                     "module": "app", "enclosing": "app.main"}
                ],
                "relations": [{"from": "app.main$1", "to": "app.main", "kind": "calls", "line": 7}]
            }"#,
        )
        .unwrap();

        let analysis = JsonAnalyzer::new(&path).analyze().unwrap();
        assert_eq!(analysis.units.len(), 2);
        assert!(!analysis.units[0].is_closure());
        assert!(analysis.units[1].is_closure());
        assert_eq!(analysis.units[0].line, 0);
        assert_eq!(analysis.relations[0].line, Some(7));
        assert_eq!(analysis.relations[0].file, None);
    }

    #[test]
    fn test_json_analyzer_missing_file() {
        let err = JsonAnalyzer::new("/nonexistent/analysis.json")
            .analyze()
            .unwrap_err();
        assert!(matches!(err, GraphError::Io { .. }));
    }

    #[test]
    fn test_command_analyzer_reads_stdout() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("out.json"),
            r#"{"units": [{"key": "app.run", "kind": "function", "name": "app.run", "module": "app"}]}"#,
        )
        .unwrap();

        let analysis = CommandAnalyzer::new("cat out.json", dir.path()).analyze().unwrap();
        assert_eq!(analysis.units.len(), 1);
        assert_eq!(analysis.units[0].name, "app.run");
        assert!(analysis.relations.is_empty());
    }

    #[test]
    fn test_command_analyzer_failure() {
        let dir = tempfile::tempdir().unwrap();
        let err = CommandAnalyzer::new("echo 'type error' >&2; exit 3", dir.path())
            .analyze()
            .unwrap_err();
        match err {
            GraphError::Analysis(message) => {
                assert!(message.contains("exited with 3"));
                assert!(message.contains("type error"));
            }
            other => panic!("unexpected error: {:?}", other),
        }

        let err = CommandAnalyzer::new("echo not json", dir.path())
            .analyze()
            .unwrap_err();
        assert!(matches!(err, GraphError::Json(_)));
    }
}
