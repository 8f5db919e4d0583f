//! Request types for MCP tools

use rmcp::schemars;
use serde::Deserialize;

/// Request for search tool
#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct SearchRequest {
    #[schemars(description = "Name or partial name to search for (case-insensitive)")]
    pub query: String,
    #[schemars(description = "Optional: restrict to one kind (function, variable, constant, interface, type)")]
    pub kind: Option<String>,
    #[schemars(description = "Maximum number of results (default: 10)")]
    pub limit: Option<u32>,
}

/// Request for upstream/downstream tools
#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct TraversalRequest {
    #[schemars(description = "Function name, short or fully qualified")]
    pub symbol: String,
    #[schemars(description = "Levels to expand (default: 3, 0 = unbounded)")]
    pub depth: Option<u32>,
    #[schemars(description = "Return a flat deduplicated list instead of a tree")]
    pub flat: Option<bool>,
}

/// Request for impact tool
#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct ImpactRequest {
    #[schemars(description = "Function, variable or constant name")]
    pub symbol: String,
    #[schemars(description = "Caller levels to include (default: 2, 0 = unbounded)")]
    pub upstream_depth: Option<u32>,
    #[schemars(description = "Callee levels to include (default: 2, 0 = unbounded)")]
    pub downstream_depth: Option<u32>,
}

/// Request for mermaid tool
#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct MermaidRequest {
    #[schemars(description = "Function at the center of the diagram")]
    pub symbol: String,
    #[schemars(description = "upstream (callers), downstream (callees) or both (default)")]
    pub direction: Option<String>,
    #[schemars(description = "Levels to expand in each direction (default: 2)")]
    pub depth: Option<u32>,
}

/// Request for risk tool
#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct RiskRequest {
    #[schemars(description = "Optional: entity to score. Omit to list the riskiest functions.")]
    pub symbol: Option<String>,
    #[schemars(description = "Number of functions to list when no symbol is given (default: 20)")]
    pub limit: Option<u32>,
    #[schemars(description = "Also count transitive callers (slower, depth-bounded)")]
    pub transitive: Option<bool>,
}

/// Request for implements tool
#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct ImplementsRequest {
    #[schemars(description = "Optional: interface or type name. Omit to list all interfaces.")]
    pub symbol: Option<String>,
}

/// Request for reindex tool
#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct ReindexRequest {
    #[schemars(
        description = "Optional: modules to re-ingest. If empty or omitted, rebuilds the whole index."
    )]
    pub modules: Option<Vec<String>>,
}
