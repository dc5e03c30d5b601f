//! cache_stats tool implementation.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use webctx_client::ContextEngine;
use webctx_core::CacheStats;

use crate::tools::json_result;

/// Output from the cache_stats tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheStatsOutput {
    #[serde(flatten)]
    pub stats: CacheStats,
    pub total_size_mb: f64,
    pub oldest_age_hours: Option<f64>,
    pub newest_age_hours: Option<f64>,
}

pub async fn stats_impl(engine: &ContextEngine) -> Result<CallToolResult, McpError> {
    let stats = engine.cache_stats().await?;
    let (oldest_age_hours, newest_age_hours) = stats.age_hours(engine.now());

    let output = CacheStatsOutput {
        total_size_mb: (stats.total_size_bytes as f64 / (1024.0 * 1024.0) * 100.0).round() / 100.0,
        oldest_age_hours,
        newest_age_hours,
        stats,
    };

    json_result(&output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::testing::{engine, output_json};
    use webctx_core::CacheStore;

    #[tokio::test]
    async fn test_stats_empty() {
        let (engine, _) = engine();
        let json = output_json(&stats_impl(&engine).await.unwrap());

        assert_eq!(json["entry_count"], 0);
        assert!(json["oldest_age_hours"].is_null());
    }

    #[tokio::test]
    async fn test_stats_counts_entries() {
        let (engine, cache) = engine();
        cache.put("https://example.com/karte", "Flammkuchen").await.unwrap();
        cache.put_failed("https://example.com/wein", "status 500").await.unwrap();

        let json = output_json(&stats_impl(&engine).await.unwrap());

        assert_eq!(json["entry_count"], 2);
        assert_eq!(json["failed_count"], 1);
        assert_eq!(json["total_size_bytes"], 11);
        assert_eq!(json["oldest_age_hours"], 0.0);
    }
}
