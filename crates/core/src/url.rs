//! URL canonicalization for consistent caching, rate limiting and safety checks.

/// Error type for URL canonicalization failures.
#[derive(Debug, Clone, thiserror::Error)]
pub enum UrlError {
    #[error("empty URL")]
    Empty,

    #[error("unsupported scheme: {0}")]
    UnsupportedScheme(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),
}

/// Canonicalize a URL string.
///
/// Normalization steps:
/// 1. Trim leading/trailing whitespace
/// 2. Default scheme to https:// if missing
/// 3. Lowercase the host
/// 4. Remove fragment (#...)
/// 5. Keep query string intact (do not reorder)
pub fn canonicalize(input: &str) -> Result<url::Url, UrlError> {
    let trimmed = input.trim();

    if trimmed.is_empty() {
        return Err(UrlError::Empty);
    }

    let url_str = if trimmed.contains("://") { trimmed.to_string() } else { format!("https://{trimmed}") };

    let mut parsed = url::Url::parse(&url_str).map_err(|e| UrlError::InvalidUrl(e.to_string()))?;

    match parsed.scheme() {
        "http" | "https" => {}
        scheme => return Err(UrlError::UnsupportedScheme(scheme.to_string())),
    }

    let host = parsed.host_str().map(str::to_lowercase);
    match host {
        Some(host) if !host.is_empty() => {
            parsed
                .set_host(Some(&host))
                .map_err(|e| UrlError::InvalidUrl(e.to_string()))?;
        }
        _ => return Err(UrlError::InvalidUrl(format!("missing host in {trimmed}"))),
    }

    parsed.set_fragment(None);

    Ok(parsed)
}

/// The rate-limiting domain of a URL: its canonical host.
///
/// Returns `None` when the URL cannot be canonicalized.
pub fn domain_of(input: &str) -> Option<String> {
    canonicalize(input).ok().and_then(|u| u.host_str().map(str::to_string))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonicalize_basic() {
        let url = canonicalize("https://example.com").unwrap();
        assert_eq!(url.scheme(), "https");
        assert_eq!(url.host_str(), Some("example.com"));
    }

    #[test]
    fn test_canonicalize_default_scheme() {
        let url = canonicalize("example.com/menu").unwrap();
        assert_eq!(url.as_str(), "https://example.com/menu");
    }

    #[test]
    fn test_canonicalize_lowercase_host_and_fragment() {
        let url = canonicalize("https://EXAMPLE.COM/Karte#mittag").unwrap();
        assert_eq!(url.as_str(), "https://example.com/Karte");
    }

    #[test]
    fn test_canonicalize_preserve_query() {
        let url = canonicalize("https://example.com?b=2&a=1").unwrap();
        assert_eq!(url.query(), Some("b=2&a=1"));
    }

    #[test]
    fn test_canonicalize_rejects() {
        assert!(matches!(canonicalize("   "), Err(UrlError::Empty)));
        assert!(matches!(canonicalize("ftp://example.com/file"), Err(UrlError::UnsupportedScheme(_))));
        assert!(matches!(canonicalize("https://"), Err(UrlError::InvalidUrl(_))));
    }

    #[test]
    fn test_domain_of() {
        assert_eq!(domain_of("https://Www.Example.com:8443/a"), Some("www.example.com".to_string()));
        assert_eq!(domain_of("mailto:someone@example.com"), None);
    }
}
