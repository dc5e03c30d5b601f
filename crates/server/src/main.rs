//! webctx server entry point.
//!
//! This is the main binary that boots the MCP server on stdio transport.
//! Logging goes to stderr to avoid interfering with the JSON-RPC protocol on stdout.

use std::sync::Arc;

use anyhow::Result;
use rmcp::service::serve_server;
use rmcp::transport::io::stdio;
use tracing_subscriber::EnvFilter;
use webctx_client::ContextEngine;
use webctx_core::AppConfig;

mod handler;
mod tools;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = AppConfig::load()?;
    tracing::info!(
        context_sets = %config.context_sets_path.display(),
        cache_backend = ?config.cache_backend,
        "Starting webctx server on stdio transport"
    );

    let engine = Arc::new(ContextEngine::from_config(&config).await?);

    if let Some(interval) = config.sweep_interval() {
        spawn_sweeper(engine.clone(), interval);
    }

    let handler = handler::WebContextServer::new(engine);
    let transport = stdio();
    let server = serve_server(handler, transport).await?;

    server.waiting().await?;

    Ok(())
}

/// Periodically reclaim expired cache entries and rate windows.
fn spawn_sweeper(engine: Arc<ContextEngine>, interval: std::time::Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // the first tick completes immediately
        ticker.tick().await;
        loop {
            ticker.tick().await;
            if let Err(e) = engine.sweep().await {
                tracing::warn!(error = %e, "background sweep failed");
            }
        }
    });
}
