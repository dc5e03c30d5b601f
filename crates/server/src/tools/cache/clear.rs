//! cache_clear, cache_clear_tag and cache_sweep tool implementations.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use webctx_client::ContextEngine;

use crate::tools::json_result;

/// Output from the cache_clear tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheClearOutput {
    /// Number of entries deleted.
    pub deleted: u64,
}

/// Parameters for the cache_clear_tag tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheClearTagParams {
    /// Tag whose URLs should be dropped from the cache, with or without `@`.
    pub tag: String,
}

pub async fn clear_impl(engine: &ContextEngine) -> Result<CallToolResult, McpError> {
    let deleted = engine.clear_cache().await?;
    json_result(&CacheClearOutput { deleted })
}

/// Implementation of the cache_clear_tag tool. Unknown tags clear nothing.
pub async fn clear_tag_impl(engine: &ContextEngine, params: CacheClearTagParams) -> Result<CallToolResult, McpError> {
    let summary = engine.clear_cache_for_tag(&params.tag).await?;
    json_result(&summary)
}

/// Implementation of the cache_sweep tool: reclaims expired entries now
/// instead of waiting for the background sweep.
pub async fn sweep_impl(engine: &ContextEngine) -> Result<CallToolResult, McpError> {
    let summary = engine.sweep().await?;
    json_result(&summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::testing::{engine, output_json};
    use webctx_core::CacheStore;

    #[tokio::test]
    async fn test_clear_all() {
        let (engine, cache) = engine();
        cache.put("https://example.com/karte", "Flammkuchen").await.unwrap();
        cache.put("https://example.com/bar", "Negroni").await.unwrap();

        let json = output_json(&clear_impl(&engine).await.unwrap());
        assert_eq!(json["deleted"], 2);
        assert_eq!(cache.stats().await.unwrap().entry_count, 0);
    }

    #[tokio::test]
    async fn test_clear_tag() {
        let (engine, cache) = engine();
        cache.put("https://example.com/karte", "Flammkuchen").await.unwrap();
        cache.put("https://example.com/bar", "Negroni").await.unwrap();

        let params = CacheClearTagParams { tag: "@bar".into() };
        let json = output_json(&clear_tag_impl(&engine, params).await.unwrap());

        assert_eq!(json["tag"], "bar");
        assert_eq!(json["removed"], 1);
        assert!(cache.get("https://example.com/karte").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_clear_unknown_tag() {
        let (engine, _) = engine();
        let params = CacheClearTagParams { tag: "unknowntag".into() };
        let json = output_json(&clear_tag_impl(&engine, params).await.unwrap());

        assert_eq!(json["known"], false);
        assert_eq!(json["removed"], 0);
    }

    #[tokio::test]
    async fn test_sweep_nothing_expired() {
        let (engine, cache) = engine();
        cache.put("https://example.com/karte", "Flammkuchen").await.unwrap();

        let json = output_json(&sweep_impl(&engine).await.unwrap());
        assert_eq!(json["cache_entries_removed"], 0);
    }
}
