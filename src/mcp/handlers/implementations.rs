//! Handler for implements tool

use super::resolve;
use crate::db::Database;
use crate::format;
use crate::graph::Graph;
use crate::mcp::types::ImplementsRequest;
use crate::types::NodeKind;

pub fn handle_implements(db: &Database, req: &ImplementsRequest) -> String {
    let graph = Graph::new(db);

    let symbol = match req.symbol.as_deref() {
        Some(symbol) => symbol,
        None => return list_interfaces(db, &graph),
    };

    let node = match resolve(db, symbol) {
        Ok(node) => node,
        Err(message) => return message,
    };

    let (related, heading) = match node.kind {
        NodeKind::Interface => (graph.implementations(node.id), "Implementations of"),
        NodeKind::Type => (graph.implemented_interfaces(node.id), "Interfaces implemented by"),
        kind => return format!("'{}' is a {}, not an interface or type", symbol, kind),
    };

    match related {
        Ok(nodes) => {
            let mut output = format!("# {} '{}'\n\n", heading, symbol);
            if nodes.is_empty() {
                output.push_str("None found\n");
            }
            for node in nodes {
                output.push_str(&format::node_details(&node));
                output.push('\n');
            }
            output
        }
        Err(e) => format!("Error: {}", e),
    }
}

fn list_interfaces(db: &Database, graph: &Graph) -> String {
    let interfaces = match db.get_nodes_by_kind(NodeKind::Interface) {
        Ok(nodes) => nodes,
        Err(e) => return format!("Error: {}", e),
    };
    if interfaces.is_empty() {
        return "No interfaces in the index".to_string();
    }

    let mut output = format!("# Interfaces ({})\n\n", interfaces.len());
    for iface in interfaces {
        let count = match graph.implementations(iface.id) {
            Ok(nodes) => nodes.len(),
            Err(e) => return format!("Error: {}", e),
        };
        output.push_str(&format!(
            "- `{}` - {} implementation(s)\n",
            format::display_name(&iface.name),
            count
        ));
    }
    output
}
