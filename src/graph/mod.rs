//! Graph traversal and query operations
//!
//! Provides:
//! - Single-hop callers/callees and references
//! - Transitive upstream/downstream walks (flat, deduplicated by node id)
//! - Interface implementation lookups
//! - Path-sensitive call trees (see [`tree`])

pub mod tree;

use std::collections::{HashSet, VecDeque};

use serde::Serialize;

use crate::db::Database;
use crate::error::Result;
use crate::types::{EdgeKind, Node};

pub use tree::{CallTree, Direction, TreeOptions};

/// Direct neighbours plus everything else reachable, without overlap
#[derive(Debug, Clone, Default, Serialize)]
pub struct Reach {
    pub direct: Vec<Node>,
    pub indirect: Vec<Node>,
}

impl Reach {
    pub fn total(&self) -> usize {
        self.direct.len() + self.indirect.len()
    }

    pub fn is_empty(&self) -> bool {
        self.direct.is_empty() && self.indirect.is_empty()
    }
}

/// Read-only graph operations on the call graph store
pub struct Graph<'a> {
    db: &'a Database,
}

impl<'a> Graph<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    pub fn db(&self) -> &'a Database {
        self.db
    }

    /// Functions that call `id`
    pub fn direct_callers(&self, id: i64) -> Result<Vec<Node>> {
        self.db.get_callers(id)
    }

    /// Functions that `id` calls
    pub fn direct_callees(&self, id: i64) -> Result<Vec<Node>> {
        self.db.get_callees(id)
    }

    /// Every transitive caller of `id` up to `max_depth` hops (0 = unbounded)
    pub fn upstream(&self, id: i64, max_depth: u32) -> Result<Vec<Node>> {
        self.walk(id, max_depth, |n| self.db.get_callers(n))
    }

    /// Every transitive callee of `id` up to `max_depth` hops (0 = unbounded)
    pub fn downstream(&self, id: i64, max_depth: u32) -> Result<Vec<Node>> {
        self.walk(id, max_depth, |n| self.db.get_callees(n))
    }

    /// Callers split into depth-1 and the rest of the transitive set
    pub fn upstream_reach(&self, id: i64, max_depth: u32) -> Result<Reach> {
        let direct = self.direct_callers(id)?;
        let all = self.upstream(id, max_depth)?;
        Ok(split_reach(id, direct, all))
    }

    /// Callees split into depth-1 and the rest of the transitive set
    pub fn downstream_reach(&self, id: i64, max_depth: u32) -> Result<Reach> {
        let direct = self.direct_callees(id)?;
        let all = self.downstream(id, max_depth)?;
        Ok(split_reach(id, direct, all))
    }

    /// Functions reading or writing a variable or constant
    pub fn referencing_units(&self, id: i64) -> Result<Vec<Node>> {
        self.db.get_sources(id, EdgeKind::References)
    }

    /// Types implementing an interface
    pub fn implementations(&self, interface_id: i64) -> Result<Vec<Node>> {
        self.db.get_sources(interface_id, EdgeKind::Implements)
    }

    /// Interfaces a type implements
    pub fn implemented_interfaces(&self, type_id: i64) -> Result<Vec<Node>> {
        self.db.get_targets(type_id, EdgeKind::Implements)
    }

    /// Breadth-first walk with a global visited set.
    ///
    /// The start node is not pre-marked, so it is reported once if a cycle
    /// leads back to it. That keeps depth 1 identical to the direct neighbours.
    fn walk<F>(&self, start: i64, max_depth: u32, neighbours: F) -> Result<Vec<Node>>
    where
        F: Fn(i64) -> Result<Vec<Node>>,
    {
        let mut visited: HashSet<i64> = HashSet::new();
        let mut found = Vec::new();
        let mut queue: VecDeque<(i64, u32)> = VecDeque::new();
        queue.push_back((start, 0));

        while let Some((node_id, depth)) = queue.pop_front() {
            if max_depth != 0 && depth >= max_depth {
                continue;
            }

            for next in neighbours(node_id)? {
                if !visited.insert(next.id) {
                    continue;
                }
                // The start node has already been expanded
                if next.id != start {
                    queue.push_back((next.id, depth + 1));
                }
                found.push(next);
            }
        }

        Ok(found)
    }
}

/// The start node reached back through a cycle is not its own indirect neighbour
fn split_reach(start: i64, direct: Vec<Node>, all: Vec<Node>) -> Reach {
    let direct_ids: HashSet<i64> = direct.iter().map(|n| n.id).collect();
    let indirect = all
        .into_iter()
        .filter(|n| n.id != start && !direct_ids.contains(&n.id))
        .collect();
    Reach { direct, indirect }
}
