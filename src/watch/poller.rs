//! Polling change source
//!
//! Fingerprints every source file under the root with SHA-256 and reports the
//! files added, modified or removed since the last poll, as `/`-separated
//! paths relative to the root. Which module a file belongs to is decided by
//! the store, not by the directory layout.

use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

use ignore::WalkBuilder;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use super::WatchConfig;
use crate::error::{GraphError, Result};

/// `file` relative to `root`, joined with `/`
pub fn relative_path(root: &Path, file: &Path) -> String {
    let rel = file.strip_prefix(root).unwrap_or(file);
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

pub fn hash_file(path: &Path) -> Result<String> {
    let bytes = fs::read(path).map_err(|e| GraphError::io(path, e))?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(hex::encode(hasher.finalize()))
}

/// Snapshot-diffing poller over a source tree
pub struct ChangePoller {
    config: WatchConfig,
    fingerprints: HashMap<PathBuf, String>,
}

impl ChangePoller {
    pub fn new(config: WatchConfig) -> Self {
        Self {
            config,
            fingerprints: HashMap::new(),
        }
    }

    pub fn config(&self) -> &WatchConfig {
        &self.config
    }

    /// Record the current tree as the baseline without reporting anything
    pub fn prime(&mut self) -> Result<usize> {
        self.fingerprints = self.scan()?;
        Ok(self.fingerprints.len())
    }

    /// Files with changes since the previous poll
    pub fn poll(&mut self) -> Result<BTreeSet<String>> {
        let current = self.scan()?;
        let mut changed = BTreeSet::new();

        for (path, hash) in &current {
            if self.fingerprints.get(path) != Some(hash) {
                debug!("Changed: {}", path.display());
                changed.insert(relative_path(&self.config.root, path));
            }
        }
        for path in self.fingerprints.keys() {
            if !current.contains_key(path) {
                debug!("Removed: {}", path.display());
                changed.insert(relative_path(&self.config.root, path));
            }
        }

        self.fingerprints = current;
        Ok(changed)
    }

    fn scan(&self) -> Result<HashMap<PathBuf, String>> {
        let root = &self.config.root;
        let mut walker = WalkBuilder::new(root);
        walker
            .hidden(true)
            .git_ignore(self.config.respect_gitignore)
            .git_global(self.config.respect_gitignore)
            .git_exclude(self.config.respect_gitignore);

        let mut fingerprints = HashMap::new();
        for entry in walker.build() {
            let entry = match entry {
                Ok(e) => e,
                Err(err) => {
                    warn!("Error walking directory: {}", err);
                    continue;
                }
            };

            let path = entry.path();
            if !path.is_file() || !self.wants(root, path) {
                continue;
            }

            match hash_file(path) {
                Ok(hash) => {
                    fingerprints.insert(path.to_path_buf(), hash);
                }
                // Deleted between the walk and the read
                Err(e) => debug!("Skipping {}", e),
            }
        }

        // Tracked files bypass the walker's filters, hidden directories included
        for tracked in &self.config.tracked_files {
            let path = if tracked.is_absolute() {
                tracked.clone()
            } else {
                root.join(tracked)
            };
            if path.is_file() {
                if let Ok(hash) = hash_file(&path) {
                    fingerprints.insert(path, hash);
                }
            }
        }
        Ok(fingerprints)
    }

    fn wants(&self, root: &Path, path: &Path) -> bool {
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        if !self.config.extensions.is_empty() && !self.config.extensions.iter().any(|e| e == ext) {
            return false;
        }
        let rel = path.strip_prefix(root).unwrap_or(path);
        !rel.components().any(|c| {
            self.config
                .exclude_dirs
                .iter()
                .any(|d| c.as_os_str() == d.as_str())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(root: &Path) -> WatchConfig {
        WatchConfig {
            root: root.to_path_buf(),
            extensions: vec!["go".to_string()],
            ..WatchConfig::default()
        }
    }

    #[test]
    fn test_relative_path() {
        let root = Path::new("/src/app");
        assert_eq!(relative_path(root, Path::new("/src/app/main.go")), "main.go");
        assert_eq!(
            relative_path(root, Path::new("/src/app/internal/store/db.go")),
            "internal/store/db.go"
        );
    }

    #[test]
    fn test_poll_reports_changed_files() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("store")).unwrap();
        fs::create_dir_all(root.join("api")).unwrap();
        fs::write(root.join("main.go"), "package main").unwrap();
        fs::write(root.join("store/db.go"), "package store").unwrap();
        fs::write(root.join("api/http.go"), "package api").unwrap();
        fs::write(root.join("README.md"), "docs").unwrap();

        let mut poller = ChangePoller::new(config(root));
        assert_eq!(poller.prime().unwrap(), 3);
        assert!(poller.poll().unwrap().is_empty());

        fs::write(root.join("store/db.go"), "package store // edited").unwrap();
        fs::remove_file(root.join("api/http.go")).unwrap();
        fs::write(root.join("README.md"), "more docs").unwrap();

        let changed = poller.poll().unwrap();
        assert_eq!(
            changed.into_iter().collect::<Vec<_>>(),
            vec!["api/http.go".to_string(), "store/db.go".to_string()]
        );
        assert!(poller.poll().unwrap().is_empty());
    }

    #[test]
    fn test_tracked_files_inside_hidden_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join(".callmap")).unwrap();
        fs::write(root.join(".callmap/analysis.json"), "{}").unwrap();
        fs::write(root.join(".callmap/notes.go"), "package notes").unwrap();
        fs::write(root.join("main.go"), "package main").unwrap();

        let mut poller = ChangePoller::new(WatchConfig {
            tracked_files: vec![PathBuf::from(".callmap/analysis.json")],
            ..config(root)
        });
        assert_eq!(poller.prime().unwrap(), 2);

        fs::write(root.join(".callmap/analysis.json"), r#"{"units": []}"#).unwrap();
        fs::write(root.join(".callmap/notes.go"), "package notes // v2").unwrap();
        assert_eq!(
            poller.poll().unwrap().into_iter().collect::<Vec<_>>(),
            vec![".callmap/analysis.json".to_string()]
        );
    }

    #[test]
    fn test_excluded_dirs_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("vendor/lib")).unwrap();
        fs::write(root.join("vendor/lib/lib.go"), "package lib").unwrap();
        fs::write(root.join("main.go"), "package main").unwrap();

        let mut poller = ChangePoller::new(config(root));
        assert_eq!(poller.prime().unwrap(), 1);
    }

    #[test]
    fn test_hash_file_is_stable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.go");
        fs::write(&path, "package a").unwrap();
        let first = hash_file(&path).unwrap();
        assert_eq!(first.len(), 64);
        assert_eq!(first, hash_file(&path).unwrap());
        assert!(matches!(
            hash_file(&dir.path().join("missing.go")),
            Err(GraphError::Io { .. })
        ));
    }
}
