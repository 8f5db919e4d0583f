//! Configuration constants for MCP tools

/// Default maximum number of search results
pub const DEFAULT_SEARCH_LIMIT: u32 = 10;

/// Default depth for upstream/downstream trees
pub const DEFAULT_TREE_DEPTH: u32 = 3;

/// Node budget for trees returned to a client
pub const MAX_TREE_NODES: usize = 200;

/// Default depth of each tree in a Mermaid diagram
pub const DEFAULT_MERMAID_DEPTH: u32 = 2;

/// Default impact analysis depths
pub const DEFAULT_UPSTREAM_DEPTH: u32 = 2;
pub const DEFAULT_DOWNSTREAM_DEPTH: u32 = 2;

/// Default number of functions in the risk ranking
pub const DEFAULT_RISK_LIMIT: u32 = 20;
