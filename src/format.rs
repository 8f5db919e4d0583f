//! Text rendering shared by the CLI and the MCP tools

use std::collections::{BTreeMap, HashSet};

use crate::graph::{CallTree, Direction};
use crate::impact::ImpactReport;
use crate::types::{
    CallTreeNode, Node, NodeKind, RiskLevel, RiskScore, StoreStats, TransitiveRisk,
};

/// Drop the import path but keep the package and any receiver,
/// e.g. `(*example.com/app/store.DB).Open` -> `(*store.DB).Open`
pub fn display_name(name: &str) -> String {
    let (prefix, rest) = if let Some(rest) = name.strip_prefix("(*") {
        ("(*", rest)
    } else if let Some(rest) = name.strip_prefix('(') {
        ("(", rest)
    } else {
        ("", name)
    };
    let tail = rest.rsplit('/').next().unwrap_or(rest);
    format!("{}{}", prefix, tail)
}

/// Last two path components, e.g. `internal/store/db.go` -> `store/db.go`
pub fn short_path(path: &str) -> &str {
    let path = path.trim_start_matches("./");
    match path.rmatch_indices('/').nth(1) {
        Some((idx, _)) => &path[idx + 1..],
        None => path,
    }
}

fn location(node: &Node) -> String {
    format!("{}:{}", node.file_path, node.line)
}

/// Format a single node as a list item with location
pub fn node_list_item(node: &Node) -> String {
    format!(
        "- **{}** `{}` - {}",
        node.kind.as_str(),
        display_name(&node.name),
        location(node)
    )
}

/// Format a node with its signature on a second line
pub fn node_with_signature(node: &Node) -> String {
    let mut output = node_list_item(node);
    if let Some(ref sig) = node.signature {
        output.push_str(&format!("\n  `{}`", sig));
    }
    output.push('\n');
    output
}

/// Format a node with full details
pub fn node_details(node: &Node) -> String {
    let mut output = format!("**{}** `{}`\n", node.kind.as_str(), node.name);
    output.push_str(&format!("- Module: {}\n", node.module));
    output.push_str(&format!("- Location: {}\n", location(node)));
    if let Some(ref sig) = node.signature {
        output.push_str(&format!("- Signature: `{}`\n", sig));
    }
    if let Some(ref doc) = node.docstring {
        output.push_str(&format!("- Doc: {}\n", doc));
    }
    output
}

/// Heading plus one list item per node, or `empty` when there are none
pub fn node_list(heading: &str, nodes: &[Node], empty: &str) -> String {
    if nodes.is_empty() {
        return format!("{}\n", empty);
    }
    let mut output = format!("{} ({}):\n\n", heading, nodes.len());
    for node in nodes {
        output.push_str(&node_list_item(node));
        output.push('\n');
    }
    output
}

/// Nodes grouped by module, at most `limit` rows in total (0 = all)
pub fn grouped_nodes(kind: NodeKind, nodes: &[Node], limit: usize) -> String {
    if nodes.is_empty() {
        return format!("No {} entities in the index\n", kind);
    }

    let mut by_module: BTreeMap<&str, Vec<&Node>> = BTreeMap::new();
    for node in nodes {
        by_module.entry(node.module.as_str()).or_default().push(node);
    }

    let mut output = format!(
        "{} {} entities in {} modules\n",
        nodes.len(),
        kind,
        by_module.len()
    );
    let mut shown = 0;
    'modules: for (module, members) in &by_module {
        if limit != 0 && shown == limit {
            break;
        }
        output.push_str(&format!("\n{} ({})\n", module, members.len()));
        for node in members {
            if limit != 0 && shown == limit {
                break 'modules;
            }
            output.push_str(&format!("  {}  {}\n", display_name(&node.name), location(node)));
            shown += 1;
        }
    }
    if shown < nodes.len() {
        output.push_str(&format!("\n... {} more\n", nodes.len() - shown));
    }
    output
}

/// Candidate list for a name that matched more than one entity
pub fn ambiguous(query: &str, candidates: &[Node]) -> String {
    let mut output = format!(
        "'{}' is ambiguous, {} matches. Use a qualified name:\n\n",
        query,
        candidates.len()
    );
    for node in candidates {
        output.push_str(&format!("- `{}` ({})\n", node.name, location(node)));
    }
    output
}

// =========================================================================
// Call trees
// =========================================================================

/// Render a call tree with box-drawing branches, names aligned in one column
pub fn call_tree(tree: &CallTree) -> String {
    let header = match tree.direction {
        Direction::Upstream => "callers of",
        Direction::Downstream => "callees of",
    };
    let root = &tree.root;
    let mut output = format!(
        "{} {}  {}\n",
        header,
        display_name(&root.node.name),
        location(&root.node)
    );

    if root.is_leaf() {
        output.push_str("└── (none)\n");
        return output;
    }

    let width = tree_width(&root.children, 0);
    render_branches(&root.children, "", 0, width, &mut output);

    if tree.truncated {
        output.push_str(&format!("... truncated at {} nodes\n", root.size()));
    }
    output
}

/// Widest `indent + name` over the subtree, in characters
fn tree_width(nodes: &[CallTreeNode], depth: usize) -> usize {
    nodes
        .iter()
        .map(|n| {
            let own = depth * 4 + display_name(&n.node.name).chars().count();
            own.max(tree_width(&n.children, depth + 1))
        })
        .max()
        .unwrap_or(0)
}

fn render_branches(
    nodes: &[CallTreeNode],
    indent: &str,
    depth: usize,
    width: usize,
    output: &mut String,
) {
    for (i, node) in nodes.iter().enumerate() {
        let last = i == nodes.len() - 1;
        let branch = if last { "└──" } else { "├──" };
        let name = display_name(&node.node.name);
        let padding = width.saturating_sub(depth * 4);

        output.push_str(&format!(
            "{}{} {:<padding$}  {}\n",
            indent,
            branch,
            name,
            location(&node.node),
            padding = padding
        ));

        if !node.is_leaf() {
            let child_indent = format!("{}{}", indent, if last { "    " } else { "│   " });
            render_branches(&node.children, &child_indent, depth + 1, width, output);
        }
    }
}

// =========================================================================
// Mermaid
// =========================================================================

/// Mermaid node id; store ids keep it unique and free of punctuation
pub fn mermaid_id(node: &Node) -> String {
    format!("n{}", node.id)
}

/// Quoted Mermaid label for a qualified name
pub fn mermaid_label(name: &str) -> String {
    format!("\"{}\"", display_name(name).replace('"', "#quot;"))
}

/// Mermaid flowchart of the bounded trees around `center`.
///
/// Edges always point from caller to callee, whichever way a tree was walked.
pub fn mermaid(center: &Node, trees: &[CallTree]) -> String {
    let mut nodes = vec![center];
    let mut seen = HashSet::from([center.id]);
    let mut edges = Vec::new();
    let mut seen_edges = HashSet::new();
    let mut truncated = false;

    for tree in trees {
        truncated |= tree.truncated;
        collect_flow(
            &tree.root,
            tree.direction,
            &mut seen,
            &mut nodes,
            &mut seen_edges,
            &mut edges,
        );
    }

    let mut output = format!(
        "## Call graph of `{}`\n\n```mermaid\nflowchart TB\n",
        display_name(&center.name)
    );
    for node in &nodes {
        output.push_str(&format!(
            "    {}[{}]\n",
            mermaid_id(node),
            mermaid_label(&node.name)
        ));
    }
    output.push_str(&format!(
        "    style {} fill:#f96,stroke:#333,stroke-width:2px\n",
        mermaid_id(center)
    ));
    for (from, to) in &edges {
        output.push_str(&format!("    {} --> {}\n", mermaid_id(from), mermaid_id(to)));
    }
    output.push_str("```\n");

    if truncated {
        output.push_str(&format!("\n_Truncated at {} nodes_\n", nodes.len()));
    }
    output
}

fn collect_flow<'t>(
    parent: &'t CallTreeNode,
    direction: Direction,
    seen: &mut HashSet<i64>,
    nodes: &mut Vec<&'t Node>,
    seen_edges: &mut HashSet<(i64, i64)>,
    edges: &mut Vec<(&'t Node, &'t Node)>,
) {
    for child in &parent.children {
        if seen.insert(child.node.id) {
            nodes.push(&child.node);
        }
        let edge = match direction {
            Direction::Upstream => (&child.node, &parent.node),
            Direction::Downstream => (&parent.node, &child.node),
        };
        if seen_edges.insert((edge.0.id, edge.1.id)) {
            edges.push(edge);
        }
        collect_flow(child, direction, seen, nodes, seen_edges, edges);
    }
}

// =========================================================================
// Impact and risk
// =========================================================================

fn node_table(nodes: &[Node], output: &mut String) {
    output.push_str("| Function | File | Line |\n");
    output.push_str("|----------|------|------|\n");
    for node in nodes {
        output.push_str(&format!(
            "| {} | {} | {} |\n",
            display_name(&node.name),
            node.file_path,
            node.line
        ));
    }
    output.push('\n');
}

/// Markdown impact report
pub fn impact_markdown(report: &ImpactReport) -> String {
    let target = &report.target;
    let mut output = format!("## Impact Analysis for `{}`\n\n", display_name(&target.name));
    output.push_str(&format!("**Location:** {}\n\n", location(target)));
    if let Some(ref sig) = target.signature {
        output.push_str(&format!("**Signature:** `{}`\n\n", sig));
    }
    if let Some(ref doc) = target.docstring {
        output.push_str(&format!("**Doc:** {}\n\n", doc));
    }
    output.push_str(&format!(
        "**Risk:** {} ({} direct)\n\n",
        report.risk, report.fan_in
    ));

    if report.is_value_target() {
        output.push_str("### Referenced By\n\n");
        if report.direct_callers.is_empty() {
            output.push_str("_No functions reference this value_\n\n");
        } else {
            node_table(&report.direct_callers, &mut output);
        }
        return output;
    }

    output.push_str("### Direct Callers\n\n");
    if report.direct_callers.is_empty() {
        output.push_str("_No direct callers_\n\n");
    } else {
        node_table(&report.direct_callers, &mut output);
    }

    if !report.indirect_callers.is_empty() {
        output.push_str("### Indirect Callers\n\n");
        node_table(&report.indirect_callers, &mut output);
    }

    output.push_str("### Direct Callees\n\n");
    if report.direct_callees.is_empty() {
        output.push_str("_No direct callees_\n\n");
    } else {
        node_table(&report.direct_callees, &mut output);
    }

    if !report.indirect_callees.is_empty() {
        output.push_str("### Indirect Callees\n\n");
        node_table(&report.indirect_callees, &mut output);
    }

    output
}

/// Compact impact view with aligned locations
pub fn impact_tree(report: &ImpactReport) -> String {
    let callers: Vec<&Node> = report
        .direct_callers
        .iter()
        .chain(&report.indirect_callers)
        .collect();
    let callees: Vec<&Node> = report
        .direct_callees
        .iter()
        .chain(&report.indirect_callees)
        .collect();

    let loc = |n: &Node| format!("{}:{}", short_path(&n.file_path), n.line);
    let width = callers
        .iter()
        .chain(&callees)
        .map(|n| loc(n).chars().count())
        .chain(std::iter::once(loc(&report.target).chars().count()))
        .max()
        .unwrap_or(0);

    let mut output = String::from("Target\n");
    output.push_str(&format!(
        "{:<width$}  {}\n",
        loc(&report.target),
        display_name(&report.target.name),
        width = width
    ));
    if let Some(ref sig) = report.target.signature {
        output.push_str(&format!("   {}\n", sig));
    }
    output.push('\n');

    let caller_label = if report.is_value_target() {
        "Referenced by"
    } else {
        "Callers"
    };
    for (label, nodes) in [(caller_label, &callers), ("Callees", &callees)] {
        if nodes.is_empty() {
            output.push_str(&format!("{}\n└── (none)\n\n", label));
            continue;
        }
        output.push_str(&format!("{} ({})\n", label, nodes.len()));
        for (i, node) in nodes.iter().enumerate() {
            let branch = if i == nodes.len() - 1 { "└──" } else { "├──" };
            output.push_str(&format!(
                "{} {:<width$}  {}\n",
                branch,
                loc(node),
                display_name(&node.name),
                width = width
            ));
        }
        output.push('\n');
    }

    output
}

fn risk_advice(level: RiskLevel) -> &'static [&'static str] {
    match level {
        RiskLevel::Critical => &[
            "Heavily used: change with extreme care",
            "Run `callmap impact` to see the full blast radius first",
            "Consider adding a new function instead of changing this one",
        ],
        RiskLevel::High => &[
            "Many callers: review each call site after the change",
            "Run `callmap upstream` to list them",
        ],
        RiskLevel::Medium => &["Check whether call sites need matching updates"],
        RiskLevel::Low => &["Small blast radius"],
    }
}

/// Single-node risk report
pub fn risk(score: &RiskScore) -> String {
    let node = &score.node;
    let mut output = format!("## Change Risk: `{}`\n\n", display_name(&node.name));
    output.push_str(&format!("**Location:** {}\n", location(node)));
    if let Some(ref sig) = node.signature {
        output.push_str(&format!("**Signature:** `{}`\n", sig));
    }
    output.push_str(&format!("\n### Risk Level: {}\n\n", score.level));
    output.push_str(&format!("Direct callers: {}\n\n", score.direct_callers));
    output.push_str("**Advice:**\n");
    for line in risk_advice(score.level) {
        output.push_str(&format!("- {}\n", line));
    }
    output
}

/// Exact risk computed from a bounded transitive walk
pub fn transitive_risk(risk: &TransitiveRisk) -> String {
    format!(
        "Transitive risk for `{}`: {} ({} direct, {} total within {} levels)\n",
        display_name(&risk.node.name),
        risk.level,
        risk.direct_callers,
        risk.total_callers,
        risk.depth
    )
}

/// Ranking of the riskiest functions
pub fn top_risky(scores: &[RiskScore]) -> String {
    if scores.is_empty() {
        return "No functions in the index\n".to_string();
    }
    let mut output = format!("Highest risk functions (top {})\n\n", scores.len());
    for score in scores {
        output.push_str(&format!(
            "{:<8}  {}\n          callers: {}  {}\n",
            score.level.as_str(),
            display_name(&score.node.name),
            score.direct_callers,
            location(&score.node)
        ));
    }
    output.push_str("\nLevels: critical(>=50) high(>=20) medium(>=5) low\n");
    output
}

/// Index statistics
pub fn stats(stats: &StoreStats) -> String {
    let mut output = String::from("## callmap Index Status\n\n");
    output.push_str(&format!("**Total Nodes:** {}\n", stats.total_nodes));
    output.push_str(&format!("**Total Edges:** {}\n", stats.total_edges));
    output.push_str(&format!("**Modules:** {}\n", stats.total_modules));
    output.push_str(&format!(
        "**Database Size:** {:.2} KB\n",
        stats.db_size_bytes as f64 / 1024.0
    ));

    if !stats.node_kinds.is_empty() {
        output.push_str("\n**Node Kinds:**\n");
        for (kind, count) in &stats.node_kinds {
            output.push_str(&format!("- {}: {}\n", kind.as_str(), count));
        }
    }
    if !stats.edge_kinds.is_empty() {
        output.push_str("\n**Edge Kinds:**\n");
        for (kind, count) in &stats.edge_kinds {
            output.push_str(&format!("- {}: {}\n", kind.as_str(), count));
        }
    }
    output
}
