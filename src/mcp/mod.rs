//! MCP (Model Context Protocol) server implementation
//!
//! Exposes the call graph as MCP tools:
//! - callmap_search: Find entities by name
//! - callmap_upstream: Caller tree of a function
//! - callmap_downstream: Callee tree of a function
//! - callmap_impact: Direct and indirect callers/callees of an entity
//! - callmap_risk: Fan-in risk of an entity, or the riskiest functions
//! - callmap_implements: Interface implementations
//! - callmap_mermaid: Mermaid flowchart of the calls around a function
//! - callmap_status: Index statistics
//! - callmap_reindex: Rebuild the index from analyzer output

pub mod constants;
mod handlers;
pub mod types;

use std::sync::{Arc, Mutex};

use rmcp::{
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::{ServerCapabilities, ServerInfo},
    tool, tool_handler, tool_router, ServerHandler,
};

use crate::db::Database;
use crate::graph::Direction;

pub use types::*;

/// MCP server handler for callmap
#[derive(Clone)]
pub struct CallMapHandler {
    tool_router: ToolRouter<Self>,
    db: Arc<Mutex<Database>>,
    project_root: String,
}

#[tool_router]
impl CallMapHandler {
    pub fn new(db: Database, project_root: String) -> Self {
        Self {
            tool_router: Self::tool_router(),
            db: Arc::new(Mutex::new(db)),
            project_root,
        }
    }

    /// Create a handler with a pre-wrapped database (for sharing across HTTP sessions)
    pub fn new_shared(db: Arc<Mutex<Database>>, project_root: String) -> Self {
        Self {
            tool_router: Self::tool_router(),
            db,
            project_root,
        }
    }

    #[tool(description = "Search functions, variables, constants, interfaces and types by name. Returns locations and signatures.")]
    fn callmap_search(&self, Parameters(req): Parameters<SearchRequest>) -> String {
        let db = match self.db.lock() {
            Ok(db) => db,
            Err(e) => return format!("Error: {}", e),
        };
        handlers::search::handle_search(&db, &req)
    }

    #[tool(description = "Show who calls a function, transitively, as a tree. Cycles are cut where a function reappears on its own path.")]
    fn callmap_upstream(&self, Parameters(req): Parameters<TraversalRequest>) -> String {
        let db = match self.db.lock() {
            Ok(db) => db,
            Err(e) => return format!("Error: {}", e),
        };
        handlers::graph::handle_traversal(&db, &req, Direction::Upstream)
    }

    #[tool(description = "Show what a function calls, transitively, as a tree.")]
    fn callmap_downstream(&self, Parameters(req): Parameters<TraversalRequest>) -> String {
        let db = match self.db.lock() {
            Ok(db) => db,
            Err(e) => return format!("Error: {}", e),
        };
        handlers::graph::handle_traversal(&db, &req, Direction::Downstream)
    }

    #[tool(description = "Analyze what breaks if an entity changes: direct and indirect callers, callees and a risk level. For variables and constants the callers are the functions that reference them.")]
    fn callmap_impact(&self, Parameters(req): Parameters<ImpactRequest>) -> String {
        let db = match self.db.lock() {
            Ok(db) => db,
            Err(e) => return format!("Error: {}", e),
        };
        handlers::graph::handle_impact(&db, &req)
    }

    #[tool(description = "Score the change risk of an entity from its fan-in, or list the riskiest functions when no symbol is given.")]
    fn callmap_risk(&self, Parameters(req): Parameters<RiskRequest>) -> String {
        let db = match self.db.lock() {
            Ok(db) => db,
            Err(e) => return format!("Error: {}", e),
        };
        handlers::risk::handle_risk(&db, &req)
    }

    #[tool(description = "List the types implementing an interface, the interfaces a type implements, or all interfaces.")]
    fn callmap_implements(&self, Parameters(req): Parameters<ImplementsRequest>) -> String {
        let db = match self.db.lock() {
            Ok(db) => db,
            Err(e) => return format!("Error: {}", e),
        };
        handlers::implementations::handle_implements(&db, &req)
    }

    #[tool(description = "Draw the callers and callees around a function as a Mermaid flowchart. Use it to visualize a call chain or to embed one in documentation.")]
    fn callmap_mermaid(&self, Parameters(req): Parameters<MermaidRequest>) -> String {
        let db = match self.db.lock() {
            Ok(db) => db,
            Err(e) => return format!("Error: {}", e),
        };
        handlers::mermaid::handle_mermaid(&db, &req)
    }

    #[tool(description = "Get the status of the callmap index: entity and relation counts by kind and the indexed modules.")]
    fn callmap_status(&self) -> String {
        let db = match self.db.lock() {
            Ok(db) => db,
            Err(e) => return format!("Error: {}", e),
        };
        handlers::status::handle_status(&db)
    }

    #[tool(description = "Rebuild the index from .callmap/analysis.json. Pass modules to re-ingest only those; omit them for a full rebuild.")]
    fn callmap_reindex(&self, Parameters(req): Parameters<ReindexRequest>) -> String {
        let mut db = match self.db.lock() {
            Ok(db) => db,
            Err(e) => return format!("Error: {}", e),
        };
        handlers::reindex::handle_reindex(&mut db, &self.project_root, &req)
    }
}

#[tool_handler]
impl ServerHandler for CallMapHandler {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(
                "callmap answers 'what breaks if I change this'. \
                Use callmap_search to find an entity, callmap_impact for its blast radius, \
                callmap_upstream/downstream for call trees and callmap_risk to rank hot spots."
                    .into(),
            ),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Edge, EdgeKind, Node, NodeKind};

    fn seeded() -> Database {
        let db = Database::in_memory().unwrap();
        let serve = db
            .insert_node(&Node::new(NodeKind::Function, "app.serve", "app").at("app/serve.go", 10))
            .unwrap();
        let handle = db
            .insert_node(&Node::new(NodeKind::Function, "app.handle", "app").at("app/serve.go", 30))
            .unwrap();
        let parse = db
            .insert_node(&Node::new(NodeKind::Function, "util.parse", "util").at("util/parse.go", 5))
            .unwrap();
        let limit = db
            .insert_node(&Node::new(NodeKind::Constant, "util.Limit", "util").at("util/parse.go", 1))
            .unwrap();
        db.insert_edge(&Edge::new(serve, handle, EdgeKind::Calls)).unwrap();
        db.insert_edge(&Edge::new(handle, parse, EdgeKind::Calls)).unwrap();
        db.insert_edge(&Edge::new(parse, limit, EdgeKind::References)).unwrap();
        db
    }

    #[test]
    fn test_search_handler() {
        let db = seeded();
        let out = handlers::search::handle_search(
            &db,
            &SearchRequest {
                query: "parse".to_string(),
                kind: None,
                limit: None,
            },
        );
        assert!(out.contains("Found 1 symbols"));
        assert!(out.contains("util.parse"));

        let out = handlers::search::handle_search(
            &db,
            &SearchRequest {
                query: "parse".to_string(),
                kind: Some("widget".to_string()),
                limit: None,
            },
        );
        assert!(out.starts_with("Error: unknown kind"));
    }

    #[test]
    fn test_traversal_handler() {
        let db = seeded();
        let tree = handlers::graph::handle_traversal(
            &db,
            &TraversalRequest {
                symbol: "util.parse".to_string(),
                depth: None,
                flat: None,
            },
            Direction::Upstream,
        );
        assert!(tree.contains("app.handle"));
        assert!(tree.contains("app.serve"));

        let flat = handlers::graph::handle_traversal(
            &db,
            &TraversalRequest {
                symbol: "app.serve".to_string(),
                depth: Some(1),
                flat: Some(true),
            },
            Direction::Downstream,
        );
        assert!(flat.contains("app.handle"));
        assert!(!flat.contains("util.parse"));

        let missing = handlers::graph::handle_traversal(
            &db,
            &TraversalRequest {
                symbol: "nothing".to_string(),
                depth: None,
                flat: None,
            },
            Direction::Upstream,
        );
        assert_eq!(missing, "Symbol 'nothing' not found");
    }

    #[test]
    fn test_impact_and_risk_handlers() {
        let db = seeded();
        let out = handlers::graph::handle_impact(
            &db,
            &ImpactRequest {
                symbol: "util.Limit".to_string(),
                upstream_depth: None,
                downstream_depth: None,
            },
        );
        assert!(out.contains("util.parse"));

        let out = handlers::risk::handle_risk(
            &db,
            &RiskRequest {
                symbol: Some("util.parse".to_string()),
                limit: None,
                transitive: Some(true),
            },
        );
        assert!(out.contains("Risk Level: low"));
        assert!(out.contains("Transitive risk"));

        let out = handlers::risk::handle_risk(
            &db,
            &RiskRequest {
                symbol: None,
                limit: Some(2),
                transitive: None,
            },
        );
        assert!(out.contains("app.handle") || out.contains("util.parse"));
    }

    #[test]
    fn test_mermaid_handler() {
        let db = seeded();
        let out = handlers::mermaid::handle_mermaid(
            &db,
            &MermaidRequest {
                symbol: "app.handle".to_string(),
                direction: None,
                depth: None,
            },
        );
        assert!(out.contains("```mermaid\nflowchart TB\n"));
        assert!(out.contains("n1 --> n2"));
        assert!(out.contains("n2 --> n3"));

        let up = handlers::mermaid::handle_mermaid(
            &db,
            &MermaidRequest {
                symbol: "app.handle".to_string(),
                direction: Some("upstream".to_string()),
                depth: Some(1),
            },
        );
        assert!(up.contains("n1 --> n2"));
        assert!(!up.contains("util.parse"));

        let bad = handlers::mermaid::handle_mermaid(
            &db,
            &MermaidRequest {
                symbol: "app.handle".to_string(),
                direction: Some("sideways".to_string()),
                depth: None,
            },
        );
        assert!(bad.starts_with("Error: unknown direction"));

        let missing = handlers::mermaid::handle_mermaid(
            &db,
            &MermaidRequest {
                symbol: "nothing".to_string(),
                direction: None,
                depth: None,
            },
        );
        assert_eq!(missing, "Symbol 'nothing' not found");
    }

    #[test]
    fn test_status_handler() {
        let db = seeded();
        let out = handlers::status::handle_status(&db);
        assert!(out.contains("- app"));
        assert!(out.contains("- util"));

        let empty = Database::in_memory().unwrap();
        assert!(handlers::status::handle_status(&empty).contains("Index is empty"));
    }

    #[test]
    fn test_reindex_handler_missing_analysis() {
        let dir = tempfile::tempdir().unwrap();
        let mut db = seeded();
        let out = handlers::reindex::handle_reindex(
            &mut db,
            &dir.path().display().to_string(),
            &ReindexRequest { modules: None },
        );
        assert!(out.starts_with("Reindex failed"));
        assert_eq!(db.get_stats().unwrap().total_nodes, 4);
    }
}
