//! Plain-text extraction from fetched pages.
//!
//! HTML is parsed with `scraper` and reduced to its visible text: every text
//! node outside `script`, `style`, `noscript` and `template`, whitespace
//! collapsed, truncated to a character budget. `text/plain` bodies pass
//! through with the same normalization. A page without any text is an
//! extraction failure.

use scraper::Html;
use webctx_core::Error;
use webctx_core::text::{collapse_whitespace, truncate_chars};

/// Elements whose text never reaches the context.
const SKIPPED_ELEMENTS: &[&str] = &["script", "style", "noscript", "template"];

/// Result of text extraction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedText {
    /// Page title, when the document has one.
    pub title: Option<String>,
    pub text: String,
    /// Whether `text` was cut to the character budget.
    pub truncated: bool,
}

/// Turns a response body into context text.
///
/// This allows swapping the extraction engine without touching the fetch client.
pub trait Extractor: Send + Sync {
    fn extract(&self, body: &str, content_type: Option<&str>, max_chars: usize) -> Result<ExtractedText, Error>;
}

/// `scraper`-based extractor for HTML and plain text.
#[derive(Debug, Clone, Copy, Default)]
pub struct HtmlTextExtractor;

impl Extractor for HtmlTextExtractor {
    fn extract(&self, body: &str, content_type: Option<&str>, max_chars: usize) -> Result<ExtractedText, Error> {
        let (title, text) = match MediaKind::of(content_type) {
            MediaKind::Html => html_text(body),
            MediaKind::Plain => (None, collapse_whitespace(body)),
            MediaKind::Unsupported(kind) => {
                return Err(Error::ExtractFailed(format!("unsupported content type: {kind}")));
            }
        };

        if text.is_empty() {
            return Err(Error::ExtractFailed("no text content".into()));
        }

        let (kept, truncated) = truncate_chars(&text, max_chars);
        Ok(ExtractedText { title, text: kept.trim_end().to_string(), truncated })
    }
}

enum MediaKind<'a> {
    Html,
    Plain,
    Unsupported(&'a str),
}

impl<'a> MediaKind<'a> {
    /// Servers that omit the header get the HTML treatment.
    fn of(content_type: Option<&'a str>) -> Self {
        let Some(raw) = content_type else { return MediaKind::Html };
        let essence = raw.split(';').next().unwrap_or("").trim();
        if essence.is_empty() || essence.eq_ignore_ascii_case("text/html") || essence.to_ascii_lowercase().contains("xhtml") {
            MediaKind::Html
        } else if essence.eq_ignore_ascii_case("text/plain") {
            MediaKind::Plain
        } else {
            MediaKind::Unsupported(essence)
        }
    }
}

fn html_text(html: &str) -> (Option<String>, String) {
    let document = Html::parse_document(html);
    let mut title = None;
    let mut parts = Vec::new();

    for node in document.root_element().descendants() {
        let Some(text) = node.value().as_text() else { continue };

        let hidden = node
            .ancestors()
            .filter_map(|a| a.value().as_element())
            .any(|e| SKIPPED_ELEMENTS.contains(&e.name()));
        if hidden {
            continue;
        }

        let piece = collapse_whitespace(text);
        if piece.is_empty() {
            continue;
        }

        let in_title = node.parent().and_then(|p| p.value().as_element().map(|e| e.name() == "title"));
        if title.is_none() && in_title == Some(true) {
            title = Some(piece.clone());
        }
        parts.push(piece);
    }

    (title, parts.join(" "))
}
