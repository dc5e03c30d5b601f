//! Parsing of the declarative context set document.
//!
//! The document is a JSON object mapping tags to sets:
//!
//! ```json
//! {
//!   "@gastronomie": {
//!     "name": "Gastronomie",
//!     "language": "de",
//!     "urls": ["https://example.com/speisekarte", "@bar"]
//!   },
//!   "bar": ["https://example.com/getraenke"]
//! }
//! ```
//!
//! Keys may carry the `@` sigil. Items starting with `@` pull in another
//! set's URLs; references are expanded here so the resulting sets are flat.

use std::collections::{BTreeMap, HashSet};

use serde::Deserialize;

use super::ContextSet;
use crate::error::{Error, ParseProblem};
use crate::tags::{is_valid_tag, strip_sigil};
use crate::url::canonicalize;

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawSet {
    Urls(Vec<String>),
    Detailed {
        urls: Vec<String>,
        #[serde(default)]
        name: Option<String>,
        #[serde(default, alias = "lang")]
        language: Option<String>,
    },
}

struct ParsedSet {
    items: Vec<String>,
    name: Option<String>,
    language: Option<String>,
}

/// Parse a context set document into flat, deduplicated sets keyed by tag.
///
/// # Errors
///
/// Returns `Error::RegistryParse` for malformed JSON (with line and column),
/// invalid or colliding tag keys, invalid URLs and references to undefined sets.
pub fn parse_context_sets(text: &str) -> Result<BTreeMap<String, ContextSet>, Error> {
    let raw: BTreeMap<String, RawSet> =
        serde_json::from_str(text).map_err(|e| Error::RegistryParse(ParseProblem::from(e)))?;

    let mut parsed: BTreeMap<String, ParsedSet> = BTreeMap::new();
    for (key, set) in raw {
        let tag = strip_sigil(&key).to_string();
        if !is_valid_tag(&tag) {
            return Err(Error::RegistryParse(ParseProblem::at_field(
                key,
                "tag must consist of letters, digits and underscores",
            )));
        }
        let set = match set {
            RawSet::Urls(items) => ParsedSet { items, name: None, language: None },
            RawSet::Detailed { urls, name, language } => ParsedSet { items: urls, name, language },
        };
        if parsed.insert(tag.clone(), set).is_some() {
            return Err(Error::RegistryParse(ParseProblem::at_field(
                key,
                format!("duplicate definition of tag `{tag}`"),
            )));
        }
    }

    validate_items(&parsed)?;

    let mut sets = BTreeMap::new();
    for (tag, set) in &parsed {
        let mut state = Expansion { visiting: HashSet::from([tag.clone()]), ..Default::default() };
        expand(tag, &parsed, &mut state);

        sets.insert(
            tag.clone(),
            ContextSet { tag: tag.clone(), urls: state.urls, name: set.name.clone(), language: set.language.clone() },
        );
    }

    Ok(sets)
}

/// Check every item is either a known reference or a valid http(s) URL.
fn validate_items(parsed: &BTreeMap<String, ParsedSet>) -> Result<(), Error> {
    for (tag, set) in parsed {
        for (idx, item) in set.items.iter().enumerate() {
            let field = format!("{tag}.urls[{idx}]");
            if let Some(reference) = item.strip_prefix('@') {
                if !parsed.contains_key(reference) {
                    return Err(Error::RegistryParse(ParseProblem::at_field(
                        field,
                        format!("reference to undefined context set `@{reference}`"),
                    )));
                }
            } else if let Err(e) = canonicalize(item) {
                return Err(Error::RegistryParse(ParseProblem::at_field(field, e.to_string())));
            }
        }
    }
    Ok(())
}

/// Traversal state for expanding one top-level set.
#[derive(Default)]
struct Expansion {
    /// Sets on the current path; a reference back into it is a cycle.
    visiting: HashSet<String>,
    /// Sets already expanded in full; their URLs are all in `seen_urls`.
    expanded: HashSet<String>,
    seen_urls: HashSet<String>,
    urls: Vec<String>,
}

/// Depth-first expansion of `tag`'s items into canonical URLs.
///
/// Each referenced set is walked at most once per top-level expansion, so
/// shared references cost linear time. A cycle contributes nothing.
fn expand(tag: &str, parsed: &BTreeMap<String, ParsedSet>, state: &mut Expansion) {
    let Some(set) = parsed.get(tag) else { return };

    for item in &set.items {
        if let Some(reference) = item.strip_prefix('@') {
            if state.expanded.contains(reference) {
                continue;
            }
            if !state.visiting.insert(reference.to_string()) {
                tracing::warn!(tag, reference, "circular context set reference ignored");
                continue;
            }
            expand(reference, parsed, state);
            state.visiting.remove(reference);
            state.expanded.insert(reference.to_string());
        } else if let Ok(url) = canonicalize(item) {
            let url = url.to_string();
            if state.seen_urls.insert(url.clone()) {
                state.urls.push(url);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn problem(result: Result<BTreeMap<String, ContextSet>, Error>) -> ParseProblem {
        match result {
            Err(Error::RegistryParse(p)) => p,
            other => panic!("expected parse problem, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_list_and_detailed_forms() {
        let sets = parse_context_sets(
            r#"{
                "@gastronomie": {"name": "Gastronomie", "lang": "de", "urls": ["https://example.com/karte"]},
                "bar": ["https://example.com/getraenke"]
            }"#,
        )
        .unwrap();

        let gastro = &sets["gastronomie"];
        assert_eq!(gastro.name.as_deref(), Some("Gastronomie"));
        assert_eq!(gastro.language.as_deref(), Some("de"));
        assert_eq!(gastro.urls, vec!["https://example.com/karte"]);
        assert_eq!(sets["bar"].urls, vec!["https://example.com/getraenke"]);
    }

    #[test]
    fn test_parse_dedupes_preserving_order() {
        let sets = parse_context_sets(
            r#"{"bar": ["https://b.example/", "https://a.example/", "https://B.example/#top"]}"#,
        )
        .unwrap();
        assert_eq!(sets["bar"].urls, vec!["https://b.example/", "https://a.example/"]);
    }

    #[test]
    fn test_parse_expands_references() {
        let sets = parse_context_sets(
            r#"{
                "gastronomie": ["https://example.com/kueche", "@bar", "@cafe"],
                "bar": ["https://example.com/bar"],
                "cafe": ["https://example.com/cafe", "https://example.com/bar"]
            }"#,
        )
        .unwrap();

        assert_eq!(
            sets["gastronomie"].urls,
            vec!["https://example.com/kueche", "https://example.com/bar", "https://example.com/cafe"]
        );
    }

    #[test]
    fn test_parse_breaks_cycles() {
        let sets = parse_context_sets(
            r#"{
                "a": ["https://a.example/", "@b"],
                "b": ["https://b.example/", "@a"]
            }"#,
        )
        .unwrap();

        assert_eq!(sets["a"].urls, vec!["https://a.example/", "https://b.example/"]);
        assert_eq!(sets["b"].urls, vec!["https://b.example/", "https://a.example/"]);
    }

    #[test]
    fn test_parse_shared_references_expand_once() {
        // each level references the next one through two sets
        let depth = 40;
        let mut doc = serde_json::Map::new();
        for i in 0..depth {
            let items = vec![format!("https://n{i}.example/"), format!("@a{i}"), format!("@b{i}")];
            doc.insert(format!("n{i}"), items.into());
            doc.insert(format!("a{i}"), vec![format!("@n{}", i + 1)].into());
            doc.insert(format!("b{i}"), vec![format!("@n{}", i + 1)].into());
        }
        doc.insert(format!("n{depth}"), vec![format!("https://n{depth}.example/")].into());

        let sets = parse_context_sets(&serde_json::Value::Object(doc).to_string()).unwrap();

        let expected: Vec<String> = (0..=depth).map(|i| format!("https://n{i}.example/")).collect();
        assert_eq!(sets["n0"].urls, expected);
        assert_eq!(sets["b0"].urls.len(), depth);
    }

    #[test]
    fn test_parse_malformed_json_reports_line() {
        let p = problem(parse_context_sets("{\n  \"bar\": [\"https://example.com/\",\n"));
        assert!(p.line.is_some());
    }

    #[test]
    fn test_parse_wrong_shape() {
        let p = problem(parse_context_sets(r#"{"bar": 42}"#));
        assert!(!p.message.is_empty());
        assert!(p.field.is_none());
    }

    #[test]
    fn test_parse_rejects_invalid_url() {
        let p = problem(parse_context_sets(r#"{"bar": ["https://example.com/", "ftp://example.com/x"]}"#));
        assert_eq!(p.field.as_deref(), Some("bar.urls[1]"));
    }

    #[test]
    fn test_parse_rejects_undefined_reference() {
        let p = problem(parse_context_sets(r#"{"bar": ["@missing"]}"#));
        assert_eq!(p.field.as_deref(), Some("bar.urls[0]"));
        assert!(p.message.contains("@missing"));
    }

    #[test]
    fn test_parse_rejects_bad_and_colliding_keys() {
        let p = problem(parse_context_sets(r#"{"bar-2": []}"#));
        assert_eq!(p.field.as_deref(), Some("bar-2"));

        let p = problem(parse_context_sets(r#"{"@bar": [], "bar": []}"#));
        assert!(p.message.contains("duplicate"));
    }

    #[test]
    fn test_parse_empty_document() {
        assert!(parse_context_sets("{}").unwrap().is_empty());
    }
}
