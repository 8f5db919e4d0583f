//! Ingestion of analyzer output into the store
//!
//! The builder persists addressable units as nodes and relations as edges.
//! Closures never become nodes: each one is resolved, through any number of
//! nesting levels, to its nearest enclosing addressable unit before an edge
//! touching it is recorded. Edges are deduplicated on their resolved endpoints.

mod analysis;

use std::collections::{BTreeSet, HashMap, HashSet};

use tracing::{debug, warn};

use crate::db::Database;
use crate::error::{GraphError, Result};
use crate::types::{Edge, EdgeKind};

pub use analysis::{
    Analysis, AnalysisRelation, AnalysisUnit, Analyzer, CommandAnalyzer, JsonAnalyzer,
};

/// Counters from one build
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BuildStats {
    pub nodes: u64,
    pub edges: u64,
    /// Closure units merged into their enclosing unit
    pub closures: u64,
    /// Edges dropped because closure merging made both ends the same unit
    pub merged_self_loops: u64,
    /// Edges collapsed onto an already recorded (from, to, kind)
    pub duplicates: u64,
    /// Relations with an endpoint that could not be resolved to a stored node
    pub unresolved: u64,
    /// Relations whose kind cannot connect the resolved endpoints
    pub rejected: u64,
}

/// Persists an `Analysis` into a `Database`
pub struct GraphBuilder<'a> {
    db: &'a Database,
    /// Modules whose units may be inserted; `None` inserts everything
    scope: Option<BTreeSet<String>>,
    /// Unit key -> stored node id
    node_map: HashMap<String, i64>,
}

impl<'a> GraphBuilder<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self {
            db,
            scope: None,
            node_map: HashMap::new(),
        }
    }

    /// Restrict subsequent inserts to these modules. An empty set clears the scope.
    pub fn set_incremental_scope<I, S>(&mut self, modules: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let modules: BTreeSet<String> = modules.into_iter().map(Into::into).collect();
        self.scope = if modules.is_empty() { None } else { Some(modules) };
    }

    pub fn in_scope(&self, module: &str) -> bool {
        match &self.scope {
            Some(scope) => scope.contains(module),
            None => true,
        }
    }

    /// Insert one addressable unit, honouring the incremental scope.
    ///
    /// Returns `None` when the unit's module is outside the scope.
    pub fn insert_unit(&mut self, unit: &AnalysisUnit) -> Result<Option<i64>> {
        if !self.in_scope(&unit.module) {
            return Ok(None);
        }
        let id = self.db.insert_node(&unit.to_node())?;
        self.node_map.insert(unit.key.clone(), id);
        Ok(Some(id))
    }

    /// Persist a full analysis: nodes first, then resolved and deduplicated edges
    pub fn build(&mut self, analysis: &Analysis) -> Result<BuildStats> {
        let mut stats = BuildStats::default();

        // First pass: closures and the unit index
        let closure_parent: HashMap<&str, &str> = analysis
            .units
            .iter()
            .filter_map(|u| u.enclosing.as_deref().map(|p| (u.key.as_str(), p)))
            .collect();
        let units: HashMap<&str, &AnalysisUnit> =
            analysis.units.iter().map(|u| (u.key.as_str(), u)).collect();
        stats.closures = closure_parent.len() as u64;

        // Second pass: addressable units in scope become nodes
        for unit in analysis.units.iter().filter(|u| !u.is_closure()) {
            if self.insert_unit(unit)?.is_some() {
                stats.nodes += 1;
            }
        }

        // Third pass: edges between resolved endpoints
        let mut seen: HashSet<(i64, i64, EdgeKind)> = HashSet::new();

        for relation in &analysis.relations {
            let from_key = resolve_closure(&closure_parent, &relation.from)?;
            let to_key = resolve_closure(&closure_parent, &relation.to)?;

            let merged = from_key != relation.from || to_key != relation.to;
            if merged && from_key == to_key {
                stats.merged_self_loops += 1;
                continue;
            }

            let (from_unit, to_unit) = match (units.get(from_key), units.get(to_key)) {
                (Some(f), Some(t)) => (*f, *t),
                _ => {
                    debug!("Unknown unit in relation {} -> {}", relation.from, relation.to);
                    stats.unresolved += 1;
                    continue;
                }
            };

            // Relations entirely outside the scope are already in the store
            if !self.in_scope(&from_unit.module) && !self.in_scope(&to_unit.module) {
                continue;
            }

            let (from_id, to_id) = match (self.stored_id(from_unit)?, self.stored_id(to_unit)?) {
                (Some(f), Some(t)) => (f, t),
                _ => {
                    debug!("No stored node for relation {} -> {}", from_key, to_key);
                    stats.unresolved += 1;
                    continue;
                }
            };

            if !seen.insert((from_id, to_id, relation.kind)) {
                stats.duplicates += 1;
                continue;
            }

            let edge = Edge {
                id: 0,
                source_id: from_id,
                target_id: to_id,
                kind: relation.kind,
                file_path: relation.file.clone(),
                line: relation.line,
            };
            match self.db.insert_edge(&edge) {
                Ok(_) => stats.edges += 1,
                Err(GraphError::InvalidEdge { kind, from_kind, to_kind }) => {
                    warn!(
                        "Skipping {} edge {} -> {}: {} to {}",
                        kind, from_key, to_key, from_kind, to_kind
                    );
                    stats.rejected += 1;
                }
                Err(e) => return Err(e),
            }
        }

        Ok(stats)
    }

    /// Store id for a unit: inserted by this builder, or already present from
    /// an earlier build when the unit is outside the scope
    fn stored_id(&mut self, unit: &AnalysisUnit) -> Result<Option<i64>> {
        if let Some(&id) = self.node_map.get(&unit.key) {
            return Ok(Some(id));
        }
        if self.in_scope(&unit.module) {
            return Ok(None);
        }
        let found = self.db.find_node(&unit.name, &unit.module, unit.kind)?;
        if let Some(node) = &found {
            self.node_map.insert(unit.key.clone(), node.id);
        }
        Ok(found.map(|n| n.id))
    }

    /// Number of units this builder has mapped to stored nodes
    pub fn node_count(&self) -> usize {
        self.node_map.len()
    }
}

/// Follow the closure chain from `key` to the first addressable unit
fn resolve_closure<'k>(parents: &HashMap<&'k str, &'k str>, key: &'k str) -> Result<&'k str> {
    let mut current = key;
    let mut hops = 0;
    while let Some(&parent) = parents.get(current) {
        hops += 1;
        if hops > parents.len() {
            return Err(GraphError::ClosureCycle(key.to_string()));
        }
        current = parent;
    }
    Ok(current)
}
