//! Error and lookup outcome types

use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

use crate::types::{EdgeKind, Node, NodeKind};

/// Errors raised by the store, ingestion and reindexing
#[derive(Debug, Error)]
pub enum GraphError {
    #[error("edge endpoint does not exist: {from} -> {to}")]
    UnknownEndpoint { from: i64, to: i64 },

    #[error("{kind} edge cannot connect {from_kind} to {to_kind}")]
    InvalidEdge {
        kind: EdgeKind,
        from_kind: NodeKind,
        to_kind: NodeKind,
    },

    #[error("closure chain for '{0}' never reaches an addressable unit")]
    ClosureCycle(String),

    #[error("analysis failed: {0}")]
    Analysis(String),

    #[error("IO error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
}

impl GraphError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        GraphError::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, GraphError>;

/// Outcome of resolving a user-supplied name to a single entity
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", content = "result", rename_all = "snake_case")]
pub enum Lookup<T> {
    Found(T),
    /// More than one candidate; callers re-query with a disambiguated name
    Ambiguous(Vec<Node>),
    NotFound(String),
}

impl<T> Lookup<T> {
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Lookup<U> {
        match self {
            Lookup::Found(v) => Lookup::Found(f(v)),
            Lookup::Ambiguous(nodes) => Lookup::Ambiguous(nodes),
            Lookup::NotFound(name) => Lookup::NotFound(name),
        }
    }

    pub fn found(self) -> Option<T> {
        match self {
            Lookup::Found(v) => Some(v),
            _ => None,
        }
    }
}
