//! CLI command implementations
//!
//! Handles all command-line interface operations:
//! - index: Ingest analyzer output, fully or for changed modules
//! - status: Show index statistics
//! - search: Search for entities
//! - upstream / downstream: Call trees
//! - impact / risk: Change impact and risk
//! - implements: Interface implementations
//! - list: Entities of one kind grouped by module
//! - export: Markdown documentation of the graph
//! - watch: Re-index as files change

mod commands;
mod db_utils;

pub use commands::*;
pub use db_utils::*;
