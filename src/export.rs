//! Markdown export of the call graph for retrieval-augmented prompts
//!
//! A full export describes the project layout, an optional module-level
//! Mermaid diagram, one section per module and a change-impact table. A
//! module export only covers the given modules and lists who calls into them.

use std::collections::{BTreeMap, BTreeSet};

use crate::db::Database;
use crate::error::Result;
use crate::format::{display_name, mermaid_label};
use crate::impact::ImpactAnalyzer;
use crate::types::{EdgeKind, Node, NodeKind, RiskLevel};

/// Longest doc excerpt shown in a module table
const DOC_EXCERPT_CHARS: usize = 40;

#[derive(Debug, Clone)]
pub struct ExportOptions {
    pub project_name: String,
    pub include_mermaid: bool,
    /// Rows in the change-impact table
    pub impact_limit: u32,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            project_name: "project".to_string(),
            include_mermaid: true,
            impact_limit: 30,
        }
    }
}

pub struct Exporter<'a> {
    db: &'a Database,
    analyzer: ImpactAnalyzer<'a>,
}

/// Per-function fan-in and fan-out
struct Counts {
    callers: u64,
    callees: usize,
}

impl<'a> Exporter<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self {
            db,
            analyzer: ImpactAnalyzer::new(db),
        }
    }

    /// Whole-project document
    pub fn export(&self, options: &ExportOptions) -> Result<String> {
        let stats = self.db.get_stats()?;
        let modules: BTreeSet<String> = self.db.get_modules()?.into_iter().collect();
        let nodes = self.db.get_nodes_by_modules(&modules)?;

        let mut output = format!("# {} call graph\n\n", options.project_name);
        output.push_str(&format!(
            "> Entities: {} | Relations: {} | Modules: {}\n\n",
            stats.total_nodes, stats.total_edges, stats.total_modules
        ));

        output.push_str(&self.project_structure()?);
        if options.include_mermaid && !nodes.is_empty() {
            output.push_str(&self.module_diagram(&nodes)?);
        }

        output.push_str("---\n\n## Modules\n\n");
        for (module, functions) in group_functions(&nodes) {
            output.push_str(&self.module_section(module, functions)?);
        }

        output.push_str(&self.impact_table(options.impact_limit)?);
        Ok(output)
    }

    /// Document for `requested` modules only. A name matches a stored module
    /// exactly or as a trailing path, so `store` matches `example.com/app/store`.
    pub fn export_modules(&self, requested: &[String]) -> Result<String> {
        if requested.is_empty() {
            return Ok("# Change report\n\n> No changed modules\n".to_string());
        }

        let modules: BTreeSet<String> = self
            .db
            .get_modules()?
            .into_iter()
            .filter(|m| requested.iter().any(|r| module_matches(m, r)))
            .collect();
        let nodes = self.db.get_nodes_by_modules(&modules)?;
        let functions: Vec<&Node> = nodes
            .iter()
            .filter(|n| n.kind == NodeKind::Function)
            .collect();

        let mut output = String::from("# Change report\n\n");
        output.push_str(&format!(
            "> Changed modules: {} | Functions: {}\n\n",
            modules.len(),
            functions.len()
        ));
        output.push_str("## Changed Modules\n\n");
        for module in &modules {
            output.push_str(&format!("- `{}`\n", module));
        }
        output.push('\n');

        if functions.is_empty() {
            output.push_str("_No functions affected_\n");
            return Ok(output);
        }

        output.push_str("## Impact\n\n");
        for function in functions {
            let callers = self.db.get_callers(function.id)?;
            if callers.is_empty() {
                continue;
            }
            let level = RiskLevel::from_direct_callers(callers.len() as u64);
            output.push_str(&format!("### `{}`\n\n", display_name(&function.name)));
            output.push_str(&format!(
                "**Location:** `{}:{}`  **Risk:** {}\n\n",
                function.file_path, function.line, level
            ));
            output.push_str(&format!(
                "{} callers may need checking:\n\n",
                callers.len()
            ));
            output.push_str("| Caller | File | Line |\n");
            output.push_str("|--------|------|------|\n");
            for caller in &callers {
                output.push_str(&format!(
                    "| `{}` | {} | {} |\n",
                    display_name(&caller.name),
                    caller.file_path,
                    caller.line
                ));
            }
            output.push('\n');
        }
        Ok(output)
    }

    fn counts(&self, node: &Node) -> Result<Counts> {
        Ok(Counts {
            callers: self.db.count_incoming(node.id, EdgeKind::Calls)?,
            callees: self.db.get_callees(node.id)?.len(),
        })
    }

    /// Directory tree of the indexed files, annotated with their modules
    fn project_structure(&self) -> Result<String> {
        let mut dirs: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for (file, module) in self.db.get_file_modules()? {
            let file = file.trim_start_matches("./");
            let Some((dir, _)) = file.rsplit_once('/') else {
                continue;
            };
            let parts: Vec<&str> = dir.split('/').filter(|p| !p.is_empty()).collect();
            for i in 1..parts.len() {
                dirs.entry(parts[..i].join("/")).or_default();
            }
            dirs.entry(parts.join("/")).or_default().insert(module);
        }

        let mut output = String::from("## Project Structure\n\n```\n");
        for (dir, modules) in &dirs {
            if dir.is_empty() {
                continue;
            }
            let depth = dir.matches('/').count();
            let name = dir.rsplit('/').next().unwrap_or(dir);
            output.push_str(&format!("{}├── {}/", "│   ".repeat(depth), name));
            if !modules.is_empty() {
                let names: Vec<&str> = modules.iter().map(String::as_str).collect();
                output.push_str(&format!("  ({})", names.join(", ")));
            }
            output.push('\n');
        }
        output.push_str("```\n\n");
        Ok(output)
    }

    /// One Mermaid node per module, edges weighted by cross-module calls
    fn module_diagram(&self, nodes: &[Node]) -> Result<String> {
        let module_of: BTreeMap<i64, &str> =
            nodes.iter().map(|n| (n.id, n.module.as_str())).collect();
        let ids: BTreeMap<&str, usize> = module_of
            .values()
            .copied()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .enumerate()
            .map(|(i, m)| (m, i))
            .collect();

        let mut calls: BTreeMap<(usize, usize), usize> = BTreeMap::new();
        for edge in self.db.get_all_edges()? {
            if edge.kind != EdgeKind::Calls {
                continue;
            }
            let from = module_of.get(&edge.source_id).and_then(|m| ids.get(m));
            let to = module_of.get(&edge.target_id).and_then(|m| ids.get(m));
            if let (Some(&from), Some(&to)) = (from, to) {
                if from != to {
                    *calls.entry((from, to)).or_default() += 1;
                }
            }
        }

        let mut output = String::from("## Architecture\n\n```mermaid\nflowchart TB\n");
        for (module, id) in &ids {
            output.push_str(&format!("    m{}[{}]\n", id, mermaid_label(module)));
        }
        for ((from, to), count) in &calls {
            output.push_str(&format!("    m{} -->|{}| m{}\n", from, count, to));
        }
        output.push_str("```\n\n");
        Ok(output)
    }

    fn module_section(&self, module: &str, mut functions: Vec<&Node>) -> Result<String> {
        functions.sort_by(|a, b| {
            is_exported(&b.name)
                .cmp(&is_exported(&a.name))
                .then_with(|| a.name.cmp(&b.name))
        });

        let mut output = format!("### {}\n\n", module);
        output.push_str("| Function | Doc | Callers | Callees |\n");
        output.push_str("|----------|-----|---------|---------|\n");
        for function in &functions {
            let counts = self.counts(function)?;
            let doc = function
                .docstring
                .as_deref()
                .map(doc_excerpt)
                .filter(|d| !d.is_empty())
                .unwrap_or_else(|| "-".to_string());
            output.push_str(&format!(
                "| `{}` | {} | {} | {} |\n",
                display_name(&function.name),
                doc,
                counts.callers,
                counts.callees
            ));
        }
        output.push('\n');

        for function in functions.iter().filter(|f| is_exported(&f.name)) {
            output.push_str(&format!("#### `{}`\n\n", display_name(&function.name)));
            output.push_str(&format!(
                "- **Location:** `{}:{}`\n",
                function.file_path, function.line
            ));
            if let Some(ref sig) = function.signature {
                output.push_str(&format!("- **Signature:** `{}`\n", sig));
            }
            if let Some(ref doc) = function.docstring {
                output.push_str(&format!("- **Doc:** {}\n", doc.trim()));
            }
            let callers = self.db.get_callers(function.id)?;
            if !callers.is_empty() {
                output.push_str(&format!("- **Called by:** {}\n", code_list(&callers)));
            }
            let callees = self.db.get_callees(function.id)?;
            if !callees.is_empty() {
                output.push_str(&format!("- **Calls:** {}\n", code_list(&callees)));
            }
            output.push('\n');
        }
        Ok(output)
    }

    fn impact_table(&self, limit: u32) -> Result<String> {
        let mut output = String::from("---\n\n## Change Impact\n\n");
        output.push_str("| Function | Location | Callers | Callees | Risk |\n");
        output.push_str("|----------|----------|---------|---------|------|\n");
        for score in self.analyzer.top_risky(limit)? {
            if score.direct_callers == 0 {
                break;
            }
            let counts = self.counts(&score.node)?;
            output.push_str(&format!(
                "| `{}` | {}:{} | {} | {} | {} |\n",
                display_name(&score.node.name),
                score.node.file_path,
                score.node.line,
                counts.callers,
                counts.callees,
                score.level
            ));
        }
        Ok(output)
    }
}

/// Functions per module, modules in name order
fn group_functions(nodes: &[Node]) -> BTreeMap<&str, Vec<&Node>> {
    let mut groups: BTreeMap<&str, Vec<&Node>> = BTreeMap::new();
    for node in nodes.iter().filter(|n| n.kind == NodeKind::Function) {
        groups.entry(node.module.as_str()).or_default().push(node);
    }
    groups
}

fn module_matches(module: &str, requested: &str) -> bool {
    let requested = requested.trim_start_matches("./").trim_end_matches('/');
    !requested.is_empty()
        && (module == requested
            || module
                .strip_suffix(requested)
                .map_or(false, |prefix| prefix.ends_with('/')))
}

/// Exported Go identifiers start with an upper-case letter; for methods the
/// method name decides
fn is_exported(name: &str) -> bool {
    if name.contains('$') {
        return false;
    }
    let short = display_name(name);
    let ident = short.rsplit('.').next().unwrap_or(&short);
    ident.chars().next().map_or(false, char::is_uppercase)
}

fn doc_excerpt(doc: &str) -> String {
    let first = doc.trim().lines().next().unwrap_or("");
    if first.chars().count() > DOC_EXCERPT_CHARS {
        let cut: String = first.chars().take(DOC_EXCERPT_CHARS - 3).collect();
        format!("{}...", cut)
    } else {
        first.to_string()
    }
}

fn code_list(nodes: &[Node]) -> String {
    nodes
        .iter()
        .map(|n| format!("`{}`", display_name(&n.name)))
        .collect::<Vec<_>>()
        .join(", ")
}
