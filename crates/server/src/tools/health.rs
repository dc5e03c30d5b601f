//! health tool implementation.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use webctx_client::ContextEngine;

use super::json_result;

/// Reports registry load state and cache reachability. Never fails: a
/// degraded component shows up in the report.
pub async fn health_impl(engine: &ContextEngine) -> Result<CallToolResult, McpError> {
    json_result(&engine.health().await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::testing::{engine, output_json};

    #[tokio::test]
    async fn test_health_healthy() {
        let (engine, _) = engine();
        let json = output_json(&health_impl(&engine).await.unwrap());

        assert_eq!(json["status"], "healthy");
        assert_eq!(json["cache_reachable"], true);
        assert_eq!(json["registry"]["set_count"], 2);
    }
}
