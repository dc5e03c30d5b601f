//! Cache key derivation.

use sha2::{Digest, Sha256};

use crate::url::canonicalize;

/// Compute the cache key for a URL.
///
/// The URL is canonicalized first so that trivially different spellings of
/// the same page share one entry. Strings that are not valid http(s) URLs are
/// keyed by their trimmed form.
pub fn cache_key(url: &str) -> String {
    let normalized = canonicalize(url).map(|u| u.to_string()).unwrap_or_else(|_| url.trim().to_string());
    let mut hasher = Sha256::new();
    hasher.update(normalized.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_stability() {
        assert_eq!(cache_key("https://example.com/menu"), cache_key("https://example.com/menu"));
    }

    #[test]
    fn test_hash_normalized_spellings_match() {
        let key = cache_key("https://example.com/menu");
        assert_eq!(key, cache_key("  https://EXAMPLE.com/menu#today "));
        assert_eq!(key, cache_key("example.com/menu"));
    }

    #[test]
    fn test_hash_distinguishes_paths_and_queries() {
        assert_ne!(cache_key("https://example.com/a"), cache_key("https://example.com/b"));
        assert_ne!(cache_key("https://example.com/?p=1"), cache_key("https://example.com/?p=2"));
    }

    #[test]
    fn test_hash_format() {
        let hash = cache_key("https://example.com");
        assert_eq!(hash.len(), 64);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
