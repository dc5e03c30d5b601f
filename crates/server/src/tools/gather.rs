//! gather_context tool implementation.
//!
//! Resolves tags (given directly or found in a chat message) to cached or
//! freshly fetched page text and returns the assembled context block.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use webctx_client::{ContextEngine, Diagnostics, GatherOptions};
use webctx_core::tags::strip_sigil;
use webctx_core::{Error, extract_tags};

use super::json_result;

/// Input parameters for the gather_context tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct GatherContextParams {
    /// Chat message to scan for `@tags`. When set, the output also carries
    /// the message with the context block prepended.
    #[serde(default)]
    pub message: Option<String>,

    /// Tags to gather, with or without `@`. Combined with tags found in `message`.
    #[serde(default)]
    pub tags: Option<Vec<String>>,

    /// Bypass cached content and failure markers.
    #[serde(default)]
    pub force_refresh: bool,
}

/// Output structure for the gather_context tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct GatherContextOutput {
    /// Tags that were gathered, without `@`.
    pub tags: Vec<String>,
    /// The context block; empty when no tag produced content.
    pub context: String,
    /// `message` with the context block in front, when a message was given.
    pub enriched_message: Option<String>,
    pub diagnostics: Diagnostics,
}

/// Implementation of the gather_context tool.
pub async fn gather_impl(engine: &ContextEngine, params: GatherContextParams) -> Result<CallToolResult, McpError> {
    if params.message.is_none() && params.tags.is_none() {
        return Err(Error::InvalidInput("one of message or tags must be given".to_string()).into());
    }

    let mut tags = params.tags.unwrap_or_default();
    if let Some(message) = &params.message {
        tags.extend(extract_tags(message));
    }

    let options = GatherOptions { force_refresh: params.force_refresh };
    let context = engine.gather_context(&tags, options).await;

    let output = GatherContextOutput {
        tags: context_tags(&tags),
        enriched_message: params.message.as_deref().map(|m| context.enrich(m)),
        context: context.text,
        diagnostics: context.diagnostics,
    };

    json_result(&output)
}

fn context_tags(tags: &[String]) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    tags.iter()
        .map(|t| strip_sigil(t.trim()).to_string())
        .filter(|t| !t.is_empty() && seen.insert(t.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::testing::{engine, output_json};
    use webctx_core::CacheStore;

    #[tokio::test]
    async fn test_gather_requires_message_or_tags() {
        let (engine, _) = engine();
        let result = gather_impl(&engine, GatherContextParams::default()).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_gather_from_message_uses_cache() {
        let (engine, cache) = engine();
        cache.put("https://example.com/karte", "Flammkuchen").await.unwrap();
        cache.put("https://example.com/wein", "Riesling").await.unwrap();

        let params = GatherContextParams {
            message: Some("Was empfiehlst du zu @gastronomie?".into()),
            ..Default::default()
        };
        let json = output_json(&gather_impl(&engine, params).await.unwrap());

        assert_eq!(json["tags"], serde_json::json!(["gastronomie"]));
        let context = json["context"].as_str().unwrap();
        assert!(context.starts_with("## Web Context"));
        assert!(context.contains("Riesling"));
        let enriched = json["enriched_message"].as_str().unwrap();
        assert!(enriched.ends_with("Was empfiehlst du zu @gastronomie?"));
        assert_eq!(json["diagnostics"]["served_from_cache"], 2);
    }

    #[tokio::test]
    async fn test_gather_unknown_tag_in_diagnostics() {
        let (engine, _) = engine();
        let params = GatherContextParams { tags: Some(vec!["@unknowntag".into()]), ..Default::default() };
        let json = output_json(&gather_impl(&engine, params).await.unwrap());

        assert_eq!(json["context"], "");
        assert!(json["enriched_message"].is_null());
        assert_eq!(json["diagnostics"]["empty_tags"][0]["reason"], "unknown_tag");
    }

    #[test]
    fn test_context_tags_dedup() {
        let tags = vec!["@bar".to_string(), "bar".to_string(), " gastronomie ".to_string()];
        assert_eq!(context_tags(&tags), vec!["bar".to_string(), "gastronomie".to_string()]);
    }
}
