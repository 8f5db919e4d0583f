//! Reindexing handler

use std::collections::BTreeSet;

use crate::cli::{project_analyzer, ANALYZER_CMD_ENV};
use crate::db::Database;
use crate::mcp::types::ReindexRequest;
use crate::reindex::{ReindexMode, Reindexer};

pub fn handle_reindex(db: &mut Database, project_root: &str, req: &ReindexRequest) -> String {
    let command = std::env::var(ANALYZER_CMD_ENV).ok();
    let reindexer = Reindexer::new(project_analyzer(project_root, None, command.as_deref()));

    let modules: BTreeSet<String> = req
        .modules
        .iter()
        .flatten()
        .map(|m| m.trim_start_matches("./").to_string())
        .collect();

    let result = if modules.is_empty() {
        reindexer.full(db)
    } else {
        reindexer.incremental(db, &modules)
    };

    match result {
        Ok(outcome) => {
            let mode = match outcome.mode {
                ReindexMode::Full => "full",
                ReindexMode::Incremental => "incremental",
                ReindexMode::FullFallback => "full (scoped delete failed)",
            };
            let mut output = format!(
                "## Reindex Complete\n\n**Mode:** {}\n**Nodes added:** {}\n**Edges added:** {}\n**Nodes removed:** {}\n**Closures merged:** {}\n",
                mode,
                outcome.build.nodes,
                outcome.build.edges,
                outcome.deleted_nodes,
                outcome.build.closures
            );
            if !outcome.modules.is_empty() {
                output.push_str(&format!("**Modules:** {}\n", outcome.modules.join(", ")));
            }
            output
        }
        Err(e) => format!("Reindex failed: {}", e),
    }
}
