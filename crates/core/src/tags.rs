//! `@tag` extraction from chat text.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

/// A sigil preceded by start of text or a character that cannot be part of a
/// tag, so `kontakt@example.com` is not a reference.
static TAG_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:^|[^\p{L}\p{N}_@])@([\p{L}\p{N}_]+)").expect("tag pattern is valid")
});

/// The same character class as [`TAG_PATTERN`], anchored to a whole name.
static TAG_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[\p{L}\p{N}_]+$").expect("tag name pattern is valid"));

/// Extract the unique tags referenced in `text`, in first-occurrence order.
///
/// Tags are returned without the sigil and matched case-sensitively.
/// Stray or malformed sigils are ignored.
pub fn extract_tags(text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    TAG_PATTERN
        .captures_iter(text)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str())
        .filter(|tag| seen.insert(*tag))
        .map(str::to_string)
        .collect()
}

/// Whether `tag` (without sigil) satisfies the tag grammar.
pub fn is_valid_tag(tag: &str) -> bool {
    TAG_NAME.is_match(tag)
}

/// Strip one leading `@` if present.
pub fn strip_sigil(tag: &str) -> &str {
    tag.strip_prefix('@').unwrap_or(tag)
}
