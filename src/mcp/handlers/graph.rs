//! Graph traversal handlers (upstream, downstream, impact)

use super::resolve;
use crate::db::Database;
use crate::error::Lookup;
use crate::format;
use crate::graph::{Direction, Graph, TreeOptions};
use crate::impact::ImpactAnalyzer;
use crate::mcp::constants::{
    DEFAULT_DOWNSTREAM_DEPTH, DEFAULT_TREE_DEPTH, DEFAULT_UPSTREAM_DEPTH, MAX_TREE_NODES,
};
use crate::mcp::types::{ImpactRequest, TraversalRequest};

pub fn handle_traversal(db: &Database, req: &TraversalRequest, direction: Direction) -> String {
    let node = match resolve(db, &req.symbol) {
        Ok(node) => node,
        Err(message) => return message,
    };
    let depth = req.depth.unwrap_or(DEFAULT_TREE_DEPTH);
    let graph = Graph::new(db);

    if req.flat.unwrap_or(false) {
        let (nodes, heading) = match direction {
            Direction::Upstream => (graph.upstream(node.id, depth), "Callers"),
            Direction::Downstream => (graph.downstream(node.id, depth), "Callees"),
        };
        return match nodes {
            Ok(nodes) => format::node_list(
                &format!("{} of '{}'", heading, req.symbol),
                &nodes,
                &format!("No {} found for '{}'", heading.to_lowercase(), req.symbol),
            ),
            Err(e) => format!("Error: {}", e),
        };
    }

    let options = TreeOptions {
        max_depth: depth,
        max_nodes: MAX_TREE_NODES,
    };
    match graph.call_tree(node.id, direction, options) {
        Ok(Some(tree)) => format!("```\n{}```\n", format::call_tree(&tree)),
        Ok(None) => format!("Symbol '{}' not found", req.symbol),
        Err(e) => format!("Error: {}", e),
    }
}

pub fn handle_impact(db: &Database, req: &ImpactRequest) -> String {
    let analyzer = ImpactAnalyzer::new(db);
    let report = match analyzer.analyze_impact(
        &req.symbol,
        req.upstream_depth.unwrap_or(DEFAULT_UPSTREAM_DEPTH),
        req.downstream_depth.unwrap_or(DEFAULT_DOWNSTREAM_DEPTH),
    ) {
        Ok(Lookup::Found(report)) => report,
        Ok(Lookup::Ambiguous(candidates)) => return format::ambiguous(&req.symbol, &candidates),
        Ok(Lookup::NotFound(_)) => return format!("Symbol '{}' not found", req.symbol),
        Err(e) => return format!("Error: {}", e),
    };

    format::impact_markdown(&report)
}
