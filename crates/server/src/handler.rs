//! MCP server handler implementation.
//!
//! This module defines the main server handler that
//! routes tool calls to the appropriate implementations.
use std::sync::Arc;

use crate::tools::cache::{CacheClearTagParams, clear_impl, clear_tag_impl, stats_impl, sweep_impl};
use crate::tools::context_sets::{ContextSetsReloadParams, list_impl, reload_impl};
use crate::tools::gather::{GatherContextParams, gather_impl};
use crate::tools::health::health_impl;

use rmcp::{
    ErrorData as McpError, ServerHandler,
    handler::server::{
        tool::{ToolCallContext, ToolRouter},
        wrapper::Parameters,
    },
    model::{
        CallToolRequestParam, CallToolResult, Implementation, ListToolsResult, PaginatedRequestParam, ProtocolVersion,
        ServerCapabilities, ServerInfo,
    },
    service::{RequestContext, RoleServer},
    tool, tool_router,
};
use webctx_client::ContextEngine;

/// The main MCP server handler for webctx.
#[derive(Clone)]
pub struct WebContextServer {
    tool_router: ToolRouter<Self>,
    engine: Arc<ContextEngine>,
}

/// Tool router implementation using the #[tool_router] macro.
///
/// This macro generates the routing logic that maps tool names to handler methods.
#[tool_router]
impl WebContextServer {
    pub fn new(engine: Arc<ContextEngine>) -> Self {
        Self { tool_router: Self::tool_router(), engine }
    }

    #[tool(
        description = "Gather web context for @tags. Pass a chat message (tags are extracted from it) and/or explicit tags. Returns the assembled context block, the enriched message and per-URL diagnostics."
    )]
    async fn gather_context(&self, params: Parameters<GatherContextParams>) -> Result<CallToolResult, McpError> {
        gather_impl(&self.engine, params.0).await
    }

    #[tool(description = "List the configured context sets with their URLs.")]
    async fn context_sets_list(&self) -> Result<CallToolResult, McpError> {
        list_impl(&self.engine).await
    }

    #[tool(
        description = "Reload the context sets from the configured file, or from the given JSON document. A rejected document leaves the current sets active."
    )]
    async fn context_sets_reload(
        &self, params: Parameters<ContextSetsReloadParams>,
    ) -> Result<CallToolResult, McpError> {
        reload_impl(&self.engine, params.0).await
    }

    #[tool(description = "Show cache statistics: entry count, size, entry ages, stale and failed counts.")]
    async fn cache_stats(&self) -> Result<CallToolResult, McpError> {
        stats_impl(&self.engine).await
    }

    #[tool(description = "Remove every cached page.")]
    async fn cache_clear(&self) -> Result<CallToolResult, McpError> {
        clear_impl(&self.engine).await
    }

    #[tool(description = "Remove the cached pages of one context set.")]
    async fn cache_clear_tag(&self, params: Parameters<CacheClearTagParams>) -> Result<CallToolResult, McpError> {
        clear_tag_impl(&self.engine, params.0).await
    }

    #[tool(description = "Reclaim expired cache entries and elapsed rate limit windows.")]
    async fn cache_sweep(&self) -> Result<CallToolResult, McpError> {
        sweep_impl(&self.engine).await
    }

    #[tool(description = "Report registry load state and cache reachability.")]
    async fn health(&self) -> Result<CallToolResult, McpError> {
        health_impl(&self.engine).await
    }
}

impl ServerHandler for WebContextServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: Implementation {
                name: "webctx".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                ..Default::default()
            },
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            instructions: Some(
                "Call gather_context with the user's message before answering; prepend enriched_message context when it is not empty.".into(),
            ),
            ..Default::default()
        }
    }

    async fn list_tools(
        &self, _request: Option<PaginatedRequestParam>, _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, rmcp::model::ErrorData> {
        Ok(ListToolsResult { meta: None, tools: self.tool_router.list_all(), next_cursor: None })
    }

    async fn call_tool(
        &self, request: CallToolRequestParam, context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, rmcp::model::ErrorData> {
        self.tool_router
            .call(ToolCallContext::new(self, request, context))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::testing::engine;

    #[test]
    fn test_router_lists_all_tools() {
        let (engine, _) = engine();
        let server = WebContextServer::new(engine);

        let mut names: Vec<String> = server.tool_router.list_all().into_iter().map(|t| t.name.to_string()).collect();
        names.sort();
        assert_eq!(
            names,
            vec![
                "cache_clear",
                "cache_clear_tag",
                "cache_stats",
                "cache_sweep",
                "context_sets_list",
                "context_sets_reload",
                "gather_context",
                "health"
            ]
        );
    }

    #[test]
    fn test_server_info() {
        let (engine, _) = engine();
        let info = WebContextServer::new(engine).get_info();
        assert_eq!(info.server_info.name, "webctx");
        assert!(info.capabilities.tools.is_some());
    }
}
