//! callmap: call graph store and change-impact engine
//!
//! Answers "what breaks if I change this" for a codebase whose call graph
//! has been extracted by an external analyzer. The graph lives in SQLite;
//! queries walk it on demand.
//!
//! ## Features
//!
//! - Persistent entity store: functions, variables, constants, interfaces, types
//! - Closure collapse at ingestion so anonymous functions never appear as entities
//! - Transitive upstream/downstream traversal and cycle-safe call trees
//! - Impact reports split into direct and indirect callers and callees
//! - Fan-in risk levels, with opt-in exact transitive counts
//! - Incremental, module-scoped reindexing driven by a debounced watcher
//! - Markdown export of the whole graph or of changed modules
//!
//! ## MCP Tools
//!
//! - `callmap_search` - Find entities by name
//! - `callmap_upstream` / `callmap_downstream` - Call trees
//! - `callmap_impact` - Change impact analysis
//! - `callmap_risk` - Risk of one entity or the riskiest functions
//! - `callmap_implements` - Interface implementations
//! - `callmap_mermaid` - Mermaid flowchart around a function
//! - `callmap_status` - Index statistics
//! - `callmap_reindex` - Rebuild from analyzer output

pub mod api;
pub mod cli;
pub mod db;
pub mod error;
pub mod export;
pub mod format;
pub mod graph;
pub mod impact;
pub mod ingest;
pub mod mcp;
pub mod reindex;
pub mod types;
pub mod watch;

pub use error::{GraphError, Lookup, Result};
