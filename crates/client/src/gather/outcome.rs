//! Per-URL and per-tag results of a gather operation.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// What happened to one URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FetchOutcome {
    /// Content available, either cached or fetched during this call.
    Served { content: String, from_cache: bool },
    /// The domain's window was full; nothing was fetched or cached.
    RateLimited,
    NetworkError { reason: String },
    /// The per-fetch timeout elapsed.
    Timeout,
    /// A failure marker from an earlier fetch is still live.
    RecentlyFailed { reason: String },
    /// Still in flight when the gather deadline passed.
    Abandoned,
}

impl FetchOutcome {
    pub fn content(&self) -> Option<&str> {
        match self {
            FetchOutcome::Served { content, .. } => Some(content),
            _ => None,
        }
    }

    pub fn is_served(&self) -> bool {
        matches!(self, FetchOutcome::Served { .. })
    }

    /// Whether the network was hit during this call.
    pub fn was_fetched(&self) -> bool {
        matches!(
            self,
            FetchOutcome::Served { from_cache: false, .. } | FetchOutcome::NetworkError { .. } | FetchOutcome::Timeout
        )
    }

    /// One-line description for diagnostics.
    pub fn describe(&self) -> String {
        match self {
            FetchOutcome::Served { from_cache: true, .. } => "served from cache".into(),
            FetchOutcome::Served { from_cache: false, .. } => "fetched".into(),
            FetchOutcome::RateLimited => "rate limited".into(),
            FetchOutcome::NetworkError { reason } => format!("fetch failed: {reason}"),
            FetchOutcome::Timeout => "timed out".into(),
            FetchOutcome::RecentlyFailed { reason } => format!("recently failed: {reason}"),
            FetchOutcome::Abandoned => "abandoned at deadline".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct UrlResult {
    pub url: String,
    pub outcome: FetchOutcome,
}

/// Results for one requested tag, in the set's URL order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct TagResult {
    /// Tag without the leading `@`.
    pub tag: String,
    /// Whether the registry knew the tag.
    pub known: bool,
    /// Display name of the set.
    pub name: Option<String>,
    pub results: Vec<UrlResult>,
}

impl TagResult {
    pub fn served(&self) -> impl Iterator<Item = (&str, &str)> {
        self.results.iter().filter_map(|r| r.outcome.content().map(|c| (r.url.as_str(), c)))
    }

    pub fn has_content(&self) -> bool {
        self.results.iter().any(|r| r.outcome.is_served())
    }
}

/// Everything one gather call produced, tags in request order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct GatherReport {
    pub tags: Vec<TagResult>,
}

impl GatherReport {
    pub fn outcomes(&self) -> impl Iterator<Item = (&str, &UrlResult)> {
        self.tags.iter().flat_map(|t| t.results.iter().map(move |r| (t.tag.as_str(), r)))
    }

    pub fn unknown_tags(&self) -> impl Iterator<Item = &str> {
        self.tags.iter().filter(|t| !t.known).map(|t| t.tag.as_str())
    }
}
