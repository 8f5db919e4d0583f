//! Search handler

use crate::db::Database;
use crate::format::node_with_signature;
use crate::mcp::constants::DEFAULT_SEARCH_LIMIT;
use crate::mcp::types::SearchRequest;
use crate::types::NodeKind;

pub fn handle_search(db: &Database, req: &SearchRequest) -> String {
    let kind = match req.kind.as_deref() {
        Some(k) => match NodeKind::from_str(k) {
            Some(kind) => Some(kind),
            None => return format!("Error: unknown kind '{}'", k),
        },
        None => None,
    };
    let limit = req.limit.unwrap_or(DEFAULT_SEARCH_LIMIT);

    let results = match db.search_nodes(&req.query, kind, Some(limit)) {
        Ok(r) => r,
        Err(e) => return format!("Error: {}", e),
    };

    if results.is_empty() {
        return format!("No symbols found matching '{}'", req.query);
    }

    let mut output = format!(
        "Found {} symbols matching '{}':\n\n",
        results.len(),
        req.query
    );

    for node in results {
        output.push_str(&node_with_signature(&node));
    }

    output
}
