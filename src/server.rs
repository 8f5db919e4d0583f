//! MCP server initialization and startup
//!
//! Handles both stdio and HTTP transport modes for the MCP server. HTTP mode
//! also serves the JSON API under `/api`.

use anyhow::Result;
use rmcp::{
    transport::stdio,
    transport::streamable_http_server::{
        session::local::LocalSessionManager, StreamableHttpServerConfig, StreamableHttpService,
    },
    ServiceExt,
};
use std::sync::{Arc, Mutex};
use tracing::info;

use callmap::api;
use callmap::cli::initialize_server_database;
use callmap::mcp::CallMapHandler;

/// Options shared by both transports
#[derive(Debug, Clone, Default)]
pub struct ServeOptions {
    pub in_memory: bool,
    pub db_path: Option<String>,
}

/// Start MCP server with stdio transport
#[tokio::main]
pub async fn start_stdio(options: ServeOptions) -> Result<()> {
    info!("Starting callmap MCP server (stdio)");

    let (project_root, db) =
        initialize_server_database(options.in_memory, options.db_path.as_deref())?;
    info!("Project root: {}", project_root);

    let handler = CallMapHandler::new(db, project_root);
    let service = handler.serve(stdio()).await?;

    info!("MCP server running on stdio");
    service.waiting().await?;

    Ok(())
}

/// Start MCP server with HTTP transport
#[tokio::main]
pub async fn start_http(port: u16, options: ServeOptions) -> Result<()> {
    info!("Starting callmap MCP server (HTTP on port {})", port);

    let (project_root, db) =
        initialize_server_database(options.in_memory, options.db_path.as_deref())?;
    info!("Project root: {}", project_root);

    // Shared by every MCP session and the JSON API
    let db = Arc::new(Mutex::new(db));
    let cancellation_token = tokio_util::sync::CancellationToken::new();

    let mcp_db = db.clone();
    let service = StreamableHttpService::new(
        move || Ok(CallMapHandler::new_shared(mcp_db.clone(), project_root.clone())),
        LocalSessionManager::default().into(),
        StreamableHttpServerConfig {
            cancellation_token: cancellation_token.child_token(),
            ..Default::default()
        },
    );

    let router = axum::Router::new()
        .nest_service("/mcp", service)
        .merge(api::router(db));

    let bind_addr = format!("127.0.0.1:{}", port);
    info!("Listening on http://{}/mcp (JSON API under /api)", bind_addr);

    let tcp_listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(tcp_listener, router)
        .with_graceful_shutdown(async move {
            tokio::signal::ctrl_c().await.ok();
            info!("Shutting down...");
            cancellation_token.cancel();
        })
        .await?;

    Ok(())
}
