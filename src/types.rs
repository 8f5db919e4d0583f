//! Core type definitions for callmap
//!
//! Defines the fundamental types for representing the call graph:
//! - Nodes: code entities (functions, variables, constants, interfaces, types)
//! - Edges: relationships between nodes (calls, implements, references)
//! - Risk: fan-in based change-risk classification
//! - Call trees: path-sensitive expansions used for presentation

use serde::{Deserialize, Serialize};

/// Direct callers at or above which a node is `critical`
pub const CRITICAL_CALLERS: u64 = 50;
/// Direct callers at or above which a node is `high`
pub const HIGH_CALLERS: u64 = 20;
/// Direct callers at or above which a node is `medium`
pub const MEDIUM_CALLERS: u64 = 5;

/// Transitive caller thresholds used only by the opt-in exact risk
pub const CRITICAL_TOTAL_CALLERS: u64 = 200;
pub const HIGH_TOTAL_CALLERS: u64 = 100;
pub const MEDIUM_TOTAL_CALLERS: u64 = 30;

/// Represents the kind of code entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Function,
    Variable,
    Constant,
    Interface,
    Type,
}

impl NodeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Function => "function",
            NodeKind::Variable => "variable",
            NodeKind::Constant => "constant",
            NodeKind::Interface => "interface",
            NodeKind::Type => "type",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "function" | "func" => Some(NodeKind::Function),
            "variable" | "var" => Some(NodeKind::Variable),
            "constant" | "const" => Some(NodeKind::Constant),
            "interface" => Some(NodeKind::Interface),
            "type" | "struct" => Some(NodeKind::Type),
            _ => None,
        }
    }

    /// Callable units participate in `calls` edges on both ends
    pub fn is_callable(&self) -> bool {
        matches!(self, NodeKind::Function)
    }

    /// Value entities are only ever the target of `references` edges
    pub fn is_value(&self) -> bool {
        matches!(self, NodeKind::Variable | NodeKind::Constant)
    }

    /// The edge kind whose incoming count is this node's fan-in.
    ///
    /// Types only ever appear as the source of `implements`, so they have none.
    pub fn fan_in_kind(&self) -> Option<EdgeKind> {
        match self {
            NodeKind::Function => Some(EdgeKind::Calls),
            NodeKind::Variable | NodeKind::Constant => Some(EdgeKind::References),
            NodeKind::Interface => Some(EdgeKind::Implements),
            NodeKind::Type => None,
        }
    }
}

impl std::fmt::Display for NodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Represents the kind of relationship between nodes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    /// Source function calls target function
    Calls,
    /// Source type implements target interface
    Implements,
    /// Source function reads or writes target variable/constant
    References,
}

impl EdgeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EdgeKind::Calls => "calls",
            EdgeKind::Implements => "implements",
            EdgeKind::References => "references",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "calls" => Some(EdgeKind::Calls),
            "implements" => Some(EdgeKind::Implements),
            "references" => Some(EdgeKind::References),
            _ => None,
        }
    }

    /// Whether an edge of this kind may connect `from` to `to`
    pub fn accepts(&self, from: NodeKind, to: NodeKind) -> bool {
        match self {
            EdgeKind::Calls => from.is_callable() && to.is_callable(),
            EdgeKind::References => from.is_callable() && to.is_value(),
            EdgeKind::Implements => from == NodeKind::Type && to == NodeKind::Interface,
        }
    }
}

impl std::fmt::Display for EdgeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A code entity.
///
/// `id` is assigned by the store on insertion; pass `0` when constructing a
/// node to insert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub id: i64,
    pub kind: NodeKind,
    /// Fully qualified name, e.g. `example.com/app/store.(*DB).Open`
    pub name: String,
    pub module: String,
    pub file_path: String,
    pub line: u32,
    pub signature: Option<String>,
    pub docstring: Option<String>,
}

impl Node {
    pub fn new(kind: NodeKind, name: impl Into<String>, module: impl Into<String>) -> Self {
        Self {
            id: 0,
            kind,
            name: name.into(),
            module: module.into(),
            file_path: String::new(),
            line: 0,
            signature: None,
            docstring: None,
        }
    }

    pub fn at(mut self, file_path: impl Into<String>, line: u32) -> Self {
        self.file_path = file_path.into();
        self.line = line;
        self
    }

    /// Name after the last `.` or `/`, e.g. `(*DB).Open` -> `Open`
    pub fn short_name(&self) -> &str {
        short_name(&self.name)
    }
}

/// Strip package path and receiver from a qualified name
pub fn short_name(name: &str) -> &str {
    let tail = name.rsplit('/').next().unwrap_or(name);
    tail.rsplit('.').next().unwrap_or(tail)
}

/// A directed relationship between two nodes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    pub id: i64,
    pub source_id: i64,
    pub target_id: i64,
    pub kind: EdgeKind,
    /// File of the call expression (only meaningful for `calls`)
    pub file_path: Option<String>,
    pub line: Option<u32>,
}

impl Edge {
    pub fn new(source_id: i64, target_id: i64, kind: EdgeKind) -> Self {
        Self {
            id: 0,
            source_id,
            target_id,
            kind,
            file_path: None,
            line: None,
        }
    }
}

/// Coarse classification of how disruptive a change is likely to be
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    /// Classify from direct fan-in
    pub fn from_direct_callers(direct: u64) -> Self {
        if direct >= CRITICAL_CALLERS {
            RiskLevel::Critical
        } else if direct >= HIGH_CALLERS {
            RiskLevel::High
        } else if direct >= MEDIUM_CALLERS {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }

    /// Classify from direct and transitive fan-in; either may raise the level
    pub fn from_caller_counts(direct: u64, total: u64) -> Self {
        if direct >= CRITICAL_CALLERS || total >= CRITICAL_TOTAL_CALLERS {
            RiskLevel::Critical
        } else if direct >= HIGH_CALLERS || total >= HIGH_TOTAL_CALLERS {
            RiskLevel::High
        } else if direct >= MEDIUM_CALLERS || total >= MEDIUM_TOTAL_CALLERS {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
            RiskLevel::Critical => "critical",
        }
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fast risk estimate from direct fan-in
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskScore {
    pub node: Node,
    pub direct_callers: u64,
    pub level: RiskLevel,
}

/// Exact (bounded) risk; computed only on request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitiveRisk {
    pub node: Node,
    pub direct_callers: u64,
    pub total_callers: u64,
    /// Depth the transitive walk was capped at
    pub depth: u32,
    pub level: RiskLevel,
}

/// One node of a call tree; an empty `children` list marks a leaf
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallTreeNode {
    pub node: Node,
    pub children: Vec<CallTreeNode>,
}

impl CallTreeNode {
    pub fn leaf(node: Node) -> Self {
        Self {
            node,
            children: Vec::new(),
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// Number of nodes in this subtree, root included
    pub fn size(&self) -> usize {
        1 + self.children.iter().map(CallTreeNode::size).sum::<usize>()
    }

    /// Longest root-to-leaf distance in edges
    pub fn depth(&self) -> usize {
        self.children
            .iter()
            .map(|c| c.depth() + 1)
            .max()
            .unwrap_or(0)
    }
}

/// Store statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreStats {
    pub total_nodes: u64,
    pub total_edges: u64,
    pub total_modules: u64,
    pub db_size_bytes: u64,
    pub node_kinds: Vec<(NodeKind, u64)>,
    pub edge_kinds: Vec<(EdgeKind, u64)>,
}
