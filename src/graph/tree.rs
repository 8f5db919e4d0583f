//! Path-sensitive call trees
//!
//! Unlike the flat walks in the parent module, a tree keeps one branch per
//! call path. A node already on the current root-to-here path becomes a leaf,
//! but the same node may appear again under a different branch.

use std::collections::HashSet;

use serde::Serialize;

use super::Graph;
use crate::error::Result;
use crate::types::{CallTreeNode, Node};

/// Default cap on the number of nodes in one tree
pub const DEFAULT_MAX_TREE_NODES: usize = 2000;

/// Which way a tree expands from its root
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Callers of the root
    Upstream,
    /// Callees of the root
    Downstream,
}

impl Direction {
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "upstream" | "up" | "callers" => Some(Direction::Upstream),
            "downstream" | "down" | "callees" => Some(Direction::Downstream),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct TreeOptions {
    /// Levels below the root to expand; 0 expands every path until it cycles
    pub max_depth: u32,
    /// Total node budget, root included
    pub max_nodes: usize,
}

impl Default for TreeOptions {
    fn default() -> Self {
        Self {
            max_depth: 0,
            max_nodes: DEFAULT_MAX_TREE_NODES,
        }
    }
}

impl TreeOptions {
    pub fn with_depth(max_depth: u32) -> Self {
        Self {
            max_depth,
            ..Self::default()
        }
    }
}

/// A built tree and whether the node budget cut it short
#[derive(Debug, Clone, Serialize)]
pub struct CallTree {
    pub direction: Direction,
    pub root: CallTreeNode,
    pub truncated: bool,
}

struct TreeBuilder<'g, 'a> {
    graph: &'g Graph<'a>,
    direction: Direction,
    options: TreeOptions,
    path: HashSet<i64>,
    remaining: usize,
    truncated: bool,
}

impl<'g, 'a> TreeBuilder<'g, 'a> {
    fn neighbours(&self, id: i64) -> Result<Vec<Node>> {
        match self.direction {
            Direction::Upstream => self.graph.direct_callers(id),
            Direction::Downstream => self.graph.direct_callees(id),
        }
    }

    fn expand(&mut self, node: Node, depth: u32) -> Result<CallTreeNode> {
        if self.options.max_depth != 0 && depth >= self.options.max_depth {
            return Ok(CallTreeNode::leaf(node));
        }

        let neighbours = self.neighbours(node.id)?;
        self.path.insert(node.id);

        let mut children = Vec::with_capacity(neighbours.len());
        for next in neighbours {
            if self.remaining == 0 {
                self.truncated = true;
                break;
            }
            self.remaining -= 1;

            if self.path.contains(&next.id) {
                children.push(CallTreeNode::leaf(next));
            } else {
                children.push(self.expand(next, depth + 1)?);
            }
        }

        self.path.remove(&node.id);
        Ok(CallTreeNode { node, children })
    }
}

impl<'a> Graph<'a> {
    /// Tree of callers rooted at `id`; `None` if the node does not exist
    pub fn upstream_tree(&self, id: i64, options: TreeOptions) -> Result<Option<CallTree>> {
        self.call_tree(id, Direction::Upstream, options)
    }

    /// Tree of callees rooted at `id`; `None` if the node does not exist
    pub fn downstream_tree(&self, id: i64, options: TreeOptions) -> Result<Option<CallTree>> {
        self.call_tree(id, Direction::Downstream, options)
    }

    pub fn call_tree(
        &self,
        id: i64,
        direction: Direction,
        options: TreeOptions,
    ) -> Result<Option<CallTree>> {
        let root = match self.db().get_node(id)? {
            Some(node) => node,
            None => return Ok(None),
        };

        let mut builder = TreeBuilder {
            graph: self,
            direction,
            options,
            path: HashSet::new(),
            remaining: options.max_nodes.saturating_sub(1),
            truncated: false,
        };
        let root = builder.expand(root, 0)?;

        Ok(Some(CallTree {
            direction,
            root,
            truncated: builder.truncated,
        }))
    }
}
