//! JSON HTTP API over the call graph
//!
//! Served next to the MCP endpoint by `callmap serve --port`:
//! - `GET /api/search?q=&kind=&limit=`
//! - `GET /api/impact?name=&up=&down=`
//! - `GET /api/tree?name=&direction=&depth=`
//! - `GET /api/risk?name=&limit=&transitive=`
//! - `GET /api/stats`
//!
//! Name lookups return a tagged `Lookup` so clients can tell a miss from an
//! ambiguous name.

use std::sync::{Arc, Mutex, MutexGuard};

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::db::Database;
use crate::error::{GraphError, Lookup};
use crate::graph::{CallTree, Direction, Graph, TreeOptions};
use crate::impact::{ImpactAnalyzer, ImpactReport};
use crate::types::{Node, NodeKind, RiskScore, StoreStats, TransitiveRisk};

const DEFAULT_LIMIT: u32 = 20;
const DEFAULT_DEPTH: u32 = 2;
const MAX_TREE_NODES: usize = 500;

/// Shared state for API handlers
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Mutex<Database>>,
}

/// Build the `/api` router
pub fn router(db: Arc<Mutex<Database>>) -> Router {
    Router::new()
        .route("/api/search", get(api_search))
        .route("/api/impact", get(api_impact))
        .route("/api/tree", get(api_tree))
        .route("/api/risk", get(api_risk))
        .route("/api/stats", get(api_stats))
        .with_state(AppState { db })
}

/// Error body returned with a non-2xx status
#[derive(Debug, Serialize)]
pub struct ApiError {
    #[serde(skip)]
    status: StatusCode,
    error: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            error: message.into(),
        }
    }
}

impl From<GraphError> for ApiError {
    fn from(e: GraphError) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            error: e.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self)).into_response()
    }
}

type ApiResult<T> = std::result::Result<Json<T>, ApiError>;

fn lock(state: &AppState) -> std::result::Result<MutexGuard<'_, Database>, ApiError> {
    state.db.lock().map_err(|e| ApiError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        error: e.to_string(),
    })
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub q: String,
    pub kind: Option<String>,
    pub limit: Option<u32>,
}

/// GET `/api/search`
pub async fn api_search(
    State(state): State<AppState>,
    Query(params): Query<SearchQuery>,
) -> ApiResult<Vec<Node>> {
    let kind = match params.kind.as_deref() {
        Some(k) => Some(
            NodeKind::from_str(k)
                .ok_or_else(|| ApiError::bad_request(format!("unknown kind '{}'", k)))?,
        ),
        None => None,
    };
    let db = lock(&state)?;
    let nodes = db.search_nodes(&params.q, kind, Some(params.limit.unwrap_or(DEFAULT_LIMIT)))?;
    Ok(Json(nodes))
}

#[derive(Debug, Deserialize)]
pub struct ImpactQuery {
    pub name: String,
    pub up: Option<u32>,
    pub down: Option<u32>,
}

/// GET `/api/impact`
pub async fn api_impact(
    State(state): State<AppState>,
    Query(params): Query<ImpactQuery>,
) -> ApiResult<Lookup<ImpactReport>> {
    let db = lock(&state)?;
    let report = ImpactAnalyzer::new(&db).analyze_impact(
        &params.name,
        params.up.unwrap_or(DEFAULT_DEPTH),
        params.down.unwrap_or(DEFAULT_DEPTH),
    )?;
    Ok(Json(report))
}

#[derive(Debug, Deserialize)]
pub struct TreeQuery {
    pub name: String,
    pub direction: Option<String>,
    pub depth: Option<u32>,
}

/// GET `/api/tree`; direction defaults to upstream
pub async fn api_tree(
    State(state): State<AppState>,
    Query(params): Query<TreeQuery>,
) -> ApiResult<Lookup<CallTree>> {
    let direction = match params.direction.as_deref() {
        Some(d) => Direction::from_str(d)
            .ok_or_else(|| ApiError::bad_request(format!("unknown direction '{}'", d)))?,
        None => Direction::Upstream,
    };
    let options = TreeOptions {
        max_depth: params.depth.unwrap_or(DEFAULT_DEPTH),
        max_nodes: MAX_TREE_NODES,
    };

    let db = lock(&state)?;
    let graph = Graph::new(&db);
    let lookup = match ImpactAnalyzer::new(&db).resolve(&params.name)? {
        Lookup::Found(node) => match graph.call_tree(node.id, direction, options)? {
            Some(tree) => Lookup::Found(tree),
            None => Lookup::NotFound(params.name.clone()),
        },
        Lookup::Ambiguous(candidates) => Lookup::Ambiguous(candidates),
        Lookup::NotFound(name) => Lookup::NotFound(name),
    };
    Ok(Json(lookup))
}

#[derive(Debug, Deserialize)]
pub struct RiskQuery {
    pub name: Option<String>,
    pub limit: Option<u32>,
    pub transitive: Option<bool>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum RiskResponse {
    Ranking(Vec<RiskScore>),
    Single {
        risk: Lookup<RiskScore>,
        #[serde(skip_serializing_if = "Option::is_none")]
        transitive: Option<TransitiveRisk>,
    },
}

/// GET `/api/risk`; without a name returns the riskiest functions
pub async fn api_risk(
    State(state): State<AppState>,
    Query(params): Query<RiskQuery>,
) -> ApiResult<RiskResponse> {
    let db = lock(&state)?;
    let analyzer = ImpactAnalyzer::new(&db);

    let name = match params.name {
        Some(name) => name,
        None => {
            let ranking = analyzer.top_risky(params.limit.unwrap_or(DEFAULT_LIMIT))?;
            return Ok(Json(RiskResponse::Ranking(ranking)));
        }
    };

    let (risk, transitive) = match analyzer.resolve(&name)? {
        Lookup::Found(node) => {
            let transitive = if params.transitive.unwrap_or(false) {
                analyzer.transitive_risk(node.id, 0)?
            } else {
                None
            };
            let risk = match analyzer.risk_of(node.id)? {
                Some(score) => Lookup::Found(score),
                None => Lookup::NotFound(name),
            };
            (risk, transitive)
        }
        Lookup::Ambiguous(candidates) => (Lookup::Ambiguous(candidates), None),
        Lookup::NotFound(name) => (Lookup::NotFound(name), None),
    };
    Ok(Json(RiskResponse::Single { risk, transitive }))
}

/// GET `/api/stats`
pub async fn api_stats(State(state): State<AppState>) -> ApiResult<StoreStats> {
    let db = lock(&state)?;
    Ok(Json(db.get_stats()?))
}
