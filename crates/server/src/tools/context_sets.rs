//! context_sets_list and context_sets_reload tool implementations.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use webctx_client::ContextEngine;
use webctx_core::{ContextSet, RegistrySource};

use super::json_result;

/// One context set as reported to admins.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ContextSetSummary {
    pub tag: String,
    pub name: Option<String>,
    pub language: Option<String>,
    pub url_count: usize,
    pub urls: Vec<String>,
}

impl From<ContextSet> for ContextSetSummary {
    fn from(set: ContextSet) -> Self {
        Self { tag: set.tag, name: set.name, language: set.language, url_count: set.urls.len(), urls: set.urls }
    }
}

/// Output structure for the context_sets_list and context_sets_reload tools.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ContextSetsOutput {
    pub count: usize,
    /// Sets in tag order.
    pub sets: Vec<ContextSetSummary>,
}

impl From<Vec<ContextSet>> for ContextSetsOutput {
    fn from(sets: Vec<ContextSet>) -> Self {
        Self { count: sets.len(), sets: sets.into_iter().map(ContextSetSummary::from).collect() }
    }
}

/// Parameters for the context_sets_reload tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct ContextSetsReloadParams {
    /// Context set document to load instead of the configured file.
    #[serde(default)]
    pub json: Option<String>,
}

pub async fn list_impl(engine: &ContextEngine) -> Result<CallToolResult, McpError> {
    json_result(&ContextSetsOutput::from(engine.list_context_sets()))
}

/// Implementation of the context_sets_reload tool.
///
/// A rejected document leaves the active sets in place and surfaces as a
/// `REGISTRY_PARSE` or `REGISTRY_IO` error.
pub async fn reload_impl(engine: &ContextEngine, params: ContextSetsReloadParams) -> Result<CallToolResult, McpError> {
    let source = params.json.map(RegistrySource::Inline);
    let sets = engine.reload_context_sets(source)?;
    json_result(&ContextSetsOutput::from(sets))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::testing::{engine, output_json};

    #[tokio::test]
    async fn test_list_sets() {
        let (engine, _) = engine();
        let json = output_json(&list_impl(&engine).await.unwrap());

        assert_eq!(json["count"], 2);
        assert_eq!(json["sets"][0]["tag"], "bar");
        assert_eq!(json["sets"][0]["url_count"], 1);
        assert_eq!(json["sets"][1]["name"], "Gastronomie");
        assert_eq!(json["sets"][1]["url_count"], 2);
    }

    #[tokio::test]
    async fn test_reload_inline() {
        let (engine, _) = engine();
        let params = ContextSetsReloadParams { json: Some(r#"{"@neu": ["https://example.org/"]}"#.into()) };
        let json = output_json(&reload_impl(&engine, params).await.unwrap());

        assert_eq!(json["count"], 1);
        assert_eq!(json["sets"][0]["tag"], "neu");
    }

    #[tokio::test]
    async fn test_reload_rejected_keeps_sets() {
        let (engine, _) = engine();
        let params = ContextSetsReloadParams { json: Some(r#"{"bar": ["@fehlt"]}"#.into()) };

        let err = reload_impl(&engine, params).await.unwrap_err();
        assert_eq!(err.code.0, -32013);
        assert_eq!(engine.list_context_sets().len(), 2);
    }

    #[tokio::test]
    async fn test_reload_configured_source() {
        let (engine, _) = engine();
        engine.reload_context_sets(Some(RegistrySource::Inline(r#"{"neu": ["https://example.org/"]}"#.into()))).unwrap();

        // without a document the configured source is read again
        let json = output_json(&reload_impl(&engine, ContextSetsReloadParams::default()).await.unwrap());
        assert_eq!(json["count"], 2);
    }
}
