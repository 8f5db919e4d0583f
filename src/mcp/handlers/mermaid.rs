//! Mermaid diagram handler

use super::resolve;
use crate::db::Database;
use crate::format;
use crate::graph::{Direction, Graph, TreeOptions};
use crate::mcp::constants::{DEFAULT_MERMAID_DEPTH, MAX_TREE_NODES};
use crate::mcp::types::MermaidRequest;

const BOTH: &[Direction] = &[Direction::Upstream, Direction::Downstream];

pub fn handle_mermaid(db: &Database, req: &MermaidRequest) -> String {
    let directions: &[Direction] = match req.direction.as_deref() {
        None | Some("both") => BOTH,
        Some(d) => match Direction::from_str(d) {
            Some(Direction::Upstream) => &[Direction::Upstream],
            Some(Direction::Downstream) => &[Direction::Downstream],
            None => {
                return format!(
                    "Error: unknown direction '{}' (expected upstream, downstream or both)",
                    d
                )
            }
        },
    };

    let node = match resolve(db, &req.symbol) {
        Ok(node) => node,
        Err(message) => return message,
    };
    let options = TreeOptions {
        max_depth: req.depth.unwrap_or(DEFAULT_MERMAID_DEPTH),
        max_nodes: MAX_TREE_NODES,
    };

    let graph = Graph::new(db);
    let mut trees = Vec::with_capacity(directions.len());
    for &direction in directions {
        match graph.call_tree(node.id, direction, options) {
            Ok(Some(tree)) => trees.push(tree),
            Ok(None) => return format!("Symbol '{}' not found", req.symbol),
            Err(e) => return format!("Error: {}", e),
        }
    }
    format::mermaid(&node, &trees)
}
