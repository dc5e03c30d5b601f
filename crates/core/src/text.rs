//! Character budgeting helpers shared by extraction and assembly.

/// Truncate `s` to at most `max_chars` characters, on a char boundary.
///
/// Returns the kept prefix and whether anything was cut.
pub fn truncate_chars(s: &str, max_chars: usize) -> (&str, bool) {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => (&s[..idx], true),
        None => (s, false),
    }
}

/// Collapse runs of whitespace into single spaces and trim the ends.
pub fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_chars_multibyte() {
        let (kept, cut) = truncate_chars("Küche und Bar", 3);
        assert_eq!(kept, "Küc");
        assert!(cut);
    }

    #[test]
    fn test_truncate_chars_short_input() {
        assert_eq!(truncate_chars("Bar", 10), ("Bar", false));
        assert_eq!(truncate_chars("Bar", 3), ("Bar", false));
        assert_eq!(truncate_chars("Bar", 0), ("", true));
    }

    #[test]
    fn test_collapse_whitespace() {
        assert_eq!(collapse_whitespace("  Speise\n\n  karte\t heute "), "Speise karte heute");
    }
}
