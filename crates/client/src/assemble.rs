//! Context block assembly.
//!
//! Turns a [`GatherReport`] into the text prepended to the user's message:
//!
//! ```text
//! ## Web Context
//!
//! ### @gastronomie (Gastronomie)
//! Source: https://example.com/karte
//! <page text>
//! ```
//!
//! Each page is cut to the per-URL budget. The section that crosses the total
//! budget is cut at the budget and every later section is dropped; both are
//! reported in [`Diagnostics::truncated_tags`].

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use webctx_core::AppConfig;
use webctx_core::text::truncate_chars;

use crate::gather::{FetchOutcome, GatherReport, TagResult};

const HEADER: &str = "## Web Context";

/// Character budgets for the assembled block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssembleBudget {
    pub per_url_chars: usize,
    pub total_chars: usize,
}

impl Default for AssembleBudget {
    fn default() -> Self {
        Self { per_url_chars: 2_000, total_chars: 16_000 }
    }
}

impl From<&AppConfig> for AssembleBudget {
    fn from(config: &AppConfig) -> Self {
        Self { per_url_chars: config.per_url_chars, total_chars: config.total_context_chars }
    }
}

/// Why a requested tag contributed nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum NoContentReason {
    UnknownTag,
    /// The set exists but lists no URLs.
    NoUrls,
    /// Every URL was refused by the rate limiter.
    RateLimited,
    FetchError,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct TagDiagnostic {
    pub tag: String,
    pub reason: NoContentReason,
}

/// A URL that produced no content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct UrlFailure {
    pub tag: String,
    pub url: String,
    pub outcome: FetchOutcome,
    pub detail: String,
}

/// What the caller should know about a gather besides the text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Diagnostics {
    pub empty_tags: Vec<TagDiagnostic>,
    pub url_failures: Vec<UrlFailure>,
    /// Tags cut or dropped by the total budget.
    pub truncated_tags: Vec<String>,
    pub served_from_cache: usize,
    pub fetched: usize,
}

impl Diagnostics {
    pub fn unresolved_tags(&self) -> impl Iterator<Item = &str> {
        self.empty_tags
            .iter()
            .filter(|d| d.reason == NoContentReason::UnknownTag)
            .map(|d| d.tag.as_str())
    }

    pub fn is_clean(&self) -> bool {
        self.empty_tags.is_empty() && self.url_failures.is_empty() && self.truncated_tags.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct AssembledContext {
    /// The context block; empty when no tag produced content.
    pub text: String,
    pub diagnostics: Diagnostics,
}

impl AssembledContext {
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// `message` with the context block in front of it.
    pub fn enrich(&self, message: &str) -> String {
        if self.text.is_empty() { message.to_string() } else { format!("{}\n\n{}", self.text, message) }
    }
}

/// Build the context block for `report` within `budget`.
pub fn assemble(report: &GatherReport, budget: AssembleBudget) -> AssembledContext {
    let mut diagnostics = Diagnostics::default();
    let mut sections = Vec::new();

    for tag in &report.tags {
        for result in &tag.results {
            match &result.outcome {
                FetchOutcome::Served { from_cache: true, .. } => diagnostics.served_from_cache += 1,
                FetchOutcome::Served { from_cache: false, .. } => diagnostics.fetched += 1,
                outcome => diagnostics.url_failures.push(UrlFailure {
                    tag: tag.tag.clone(),
                    url: result.url.clone(),
                    outcome: outcome.clone(),
                    detail: outcome.describe(),
                }),
            }
        }

        match section_for(tag, budget.per_url_chars) {
            Some(section) => sections.push((tag.tag.as_str(), section)),
            None => diagnostics.empty_tags.push(TagDiagnostic { tag: tag.tag.clone(), reason: empty_reason(tag) }),
        }
    }

    let mut text = String::new();
    let mut used = 0;
    let mut exhausted = false;

    for (tag, section) in sections {
        if exhausted {
            diagnostics.truncated_tags.push(tag.to_string());
            continue;
        }

        let separator = if text.is_empty() { format!("{HEADER}\n\n") } else { "\n\n".to_string() };
        let piece = separator + &section;
        let piece_chars = piece.chars().count();
        let remaining = budget.total_chars.saturating_sub(used);

        if piece_chars <= remaining {
            text.push_str(&piece);
            used += piece_chars;
            continue;
        }

        // keep the cut section only if some of its body survives
        let heading_chars = piece
            .find("\nSource: ")
            .and_then(|i| piece[i + 1..].find('\n').map(|j| i + 1 + j + 1))
            .map_or(piece_chars, |end| piece[..end].chars().count());
        if remaining > heading_chars {
            let (kept, _) = truncate_chars(&piece, remaining);
            text.push_str(kept.trim_end());
        }
        used = budget.total_chars;
        exhausted = true;
        diagnostics.truncated_tags.push(tag.to_string());
    }

    if !diagnostics.truncated_tags.is_empty() {
        tracing::debug!(truncated = ?diagnostics.truncated_tags, budget = budget.total_chars, "context budget exhausted");
    }

    AssembledContext { text, diagnostics }
}

fn section_for(tag: &TagResult, per_url_chars: usize) -> Option<String> {
    if !tag.has_content() {
        return None;
    }

    let mut section = format!("### @{}", tag.tag);
    if let Some(name) = &tag.name {
        section.push_str(&format!(" ({name})"));
    }
    for (url, content) in tag.served() {
        let (kept, _) = truncate_chars(content.trim(), per_url_chars);
        section.push_str(&format!("\nSource: {url}\n{}", kept.trim_end()));
    }
    Some(section)
}

fn empty_reason(tag: &TagResult) -> NoContentReason {
    if !tag.known {
        NoContentReason::UnknownTag
    } else if tag.results.is_empty() {
        NoContentReason::NoUrls
    } else if tag.results.iter().all(|r| r.outcome == FetchOutcome::RateLimited) {
        NoContentReason::RateLimited
    } else {
        NoContentReason::FetchError
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gather::UrlResult;

    fn served(url: &str, content: &str) -> UrlResult {
        UrlResult { url: url.into(), outcome: FetchOutcome::Served { content: content.into(), from_cache: false } }
    }

    fn tag(name: &str, display: Option<&str>, results: Vec<UrlResult>) -> TagResult {
        TagResult { tag: name.into(), known: true, name: display.map(Into::into), results }
    }

    #[test]
    fn test_format() {
        let report = GatherReport {
            tags: vec![
                tag("gastronomie", Some("Gastronomie"), vec![served("https://example.com/karte", "Flammkuchen")]),
                tag("bar", None, vec![served("https://example.com/bar", "Cocktails")]),
            ],
        };

        let context = assemble(&report, AssembleBudget::default());
        assert_eq!(
            context.text,
            "## Web Context\n\n### @gastronomie (Gastronomie)\nSource: https://example.com/karte\nFlammkuchen\n\n### @bar\nSource: https://example.com/bar\nCocktails"
        );
        assert!(context.diagnostics.is_clean());
        assert_eq!(context.diagnostics.fetched, 2);
    }

    #[test]
    fn test_per_url_budget() {
        let report = GatherReport { tags: vec![tag("bar", None, vec![served("https://example.com/bar", "abcdefghij")])] };
        let context = assemble(&report, AssembleBudget { per_url_chars: 4, total_chars: 1_000 });
        assert!(context.text.ends_with("Source: https://example.com/bar\nabcd"));
        assert!(context.diagnostics.truncated_tags.is_empty());
    }

    #[test]
    fn test_total_budget_cuts_and_drops() {
        let long = "x".repeat(100);
        let report = GatherReport {
            tags: vec![
                tag("a", None, vec![served("https://a.example/", &long)]),
                tag("b", None, vec![served("https://b.example/", &long)]),
                tag("c", None, vec![served("https://c.example/", &long)]),
            ],
        };

        let context = assemble(&report, AssembleBudget { per_url_chars: 1_000, total_chars: 200 });

        assert!(context.text.chars().count() <= 200);
        assert!(context.text.contains("### @a"));
        assert!(context.text.contains("### @b"));
        assert!(!context.text.contains("### @c"));
        assert_eq!(context.diagnostics.truncated_tags, vec!["b".to_string(), "c".to_string()]);
    }

    #[test]
    fn test_cut_section_needs_body_past_source_line() {
        let report = GatherReport {
            tags: vec![
                tag("a", None, vec![served("https://a.example/", &"y".repeat(50))]),
                tag("b", None, vec![served("https://b.example/", &"x".repeat(50))]),
            ],
        };
        // first section is 100 chars; the second needs 36 before its body starts
        let first = assemble(&report, AssembleBudget { per_url_chars: 1_000, total_chars: 100 }).text;
        assert_eq!(first.chars().count(), 100);

        for total_chars in [120, 136] {
            let context = assemble(&report, AssembleBudget { per_url_chars: 1_000, total_chars });
            assert_eq!(context.text, first);
            assert_eq!(context.diagnostics.truncated_tags, vec!["b".to_string()]);
        }

        let context = assemble(&report, AssembleBudget { per_url_chars: 1_000, total_chars: 137 });
        assert!(context.text.ends_with("### @b\nSource: https://b.example/\nx"));
        assert_eq!(context.diagnostics.truncated_tags, vec!["b".to_string()]);
    }

    #[test]
    fn test_empty_tag_reasons() {
        let unknown = TagResult { tag: "unknowntag".into(), known: false, name: None, results: vec![] };
        let empty = tag("leer", None, vec![]);
        let limited = tag(
            "voll",
            None,
            vec![UrlResult { url: "https://example.com/a".into(), outcome: FetchOutcome::RateLimited }],
        );
        let broken = tag(
            "kaputt",
            None,
            vec![
                UrlResult { url: "https://example.com/b".into(), outcome: FetchOutcome::RateLimited },
                UrlResult { url: "https://example.com/c".into(), outcome: FetchOutcome::Timeout },
            ],
        );
        let report = GatherReport { tags: vec![unknown, empty, limited, broken] };

        let context = assemble(&report, AssembleBudget::default());

        assert!(context.is_empty());
        let reasons: Vec<_> = context.diagnostics.empty_tags.iter().map(|d| d.reason).collect();
        assert_eq!(
            reasons,
            vec![
                NoContentReason::UnknownTag,
                NoContentReason::NoUrls,
                NoContentReason::RateLimited,
                NoContentReason::FetchError
            ]
        );
        assert_eq!(context.diagnostics.unresolved_tags().collect::<Vec<_>>(), vec!["unknowntag"]);
        assert_eq!(context.diagnostics.url_failures.len(), 3);
        assert_eq!(context.diagnostics.url_failures[2].detail, "timed out");
    }

    #[test]
    fn test_enrich() {
        let empty = AssembledContext::default();
        assert_eq!(empty.enrich("Was gibt es heute?"), "Was gibt es heute?");

        let context = AssembledContext { text: "## Web Context\n\nx".into(), diagnostics: Diagnostics::default() };
        assert_eq!(context.enrich("Frage"), "## Web Context\n\nx\n\nFrage");
    }
}
