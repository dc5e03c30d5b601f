//! MCP tool implementations.
//!
//! This module contains all tools exposed by the webctx server. Each tool
//! returns its output as pretty-printed JSON text content.

pub mod cache;
pub mod context_sets;
pub mod gather;
pub mod health;

use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, Content},
};
use serde::Serialize;
use webctx_core::Error;

pub(crate) fn json_result<T: Serialize>(output: &T) -> Result<CallToolResult, McpError> {
    let json = serde_json::to_string_pretty(output)
        .map_err(|e| Error::InvalidInput(format!("Failed to serialize output: {e}")))?;
    Ok(CallToolResult::success(vec![Content::text(json)]))
}
