//! Handler modules for MCP tools

pub mod graph;
pub mod implementations;
pub mod mermaid;
pub mod reindex;
pub mod risk;
pub mod search;
pub mod status;

use crate::db::Database;
use crate::error::Lookup;
use crate::format;
use crate::impact::ImpactAnalyzer;
use crate::types::Node;

/// Resolve a tool argument to one node, or the message to return instead
pub(crate) fn resolve(db: &Database, symbol: &str) -> Result<Node, String> {
    match ImpactAnalyzer::new(db).resolve(symbol) {
        Ok(Lookup::Found(node)) => Ok(node),
        Ok(Lookup::Ambiguous(candidates)) => Err(format::ambiguous(symbol, &candidates)),
        Ok(Lookup::NotFound(name)) => Err(format!("Symbol '{}' not found", name)),
        Err(e) => Err(format!("Error: {}", e)),
    }
}
