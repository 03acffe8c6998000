// Text Processing Service
// Tokenisation and small string helpers shared by the feature functions

use regex::Regex;
use std::sync::OnceLock;

fn word_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\w+").expect("word regex"))
}

/// Split a line into lower-cased Unicode word tokens.
/// `:` and `#` are reserved by the vector file format and are removed.
pub fn split_words(text: &str) -> Vec<String> {
    if text.is_empty() {
        return vec![];
    }

    word_re()
        .find_iter(text)
        .map(|m| m.as_str().to_lowercase().replace([':', '#'], ""))
        .filter(|w| !w.is_empty())
        .collect()
}

/// Interpret a flag-like string. Unknown non-empty values count as true.
pub fn is_truthy(value: &str) -> bool {
    match value.trim().to_ascii_lowercase().as_str() {
        "" | "0" | "off" | "f" | "false" | "disabled" | "no" => false,
        _ => true,
    }
}

/// Shorten text for log lines and previews, on a char boundary.
pub fn preview(s: &str, max_chars: usize) -> String {
    let mut out: String = s.chars().take(max_chars).collect();
    if s.chars().count() > max_chars {
        out.push_str("...");
    }
    out.replace('\n', " ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_words_lowercases() {
        assert_eq!(split_words("The Cat sat."), vec!["the", "cat", "sat"]);
    }

    #[test]
    fn test_split_words_unicode() {
        assert_eq!(split_words("Ὁ λόγος, žena"), vec!["ὁ", "λόγος", "žena"]);
    }

    #[test]
    fn test_split_words_drops_reserved_and_empty() {
        assert!(split_words("").is_empty());
        assert!(split_words("  :: ## -- ").is_empty());
        assert_eq!(split_words("a:b#c"), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_is_truthy() {
        assert!(is_truthy("1"));
        assert!(is_truthy("TRUE"));
        assert!(is_truthy("on"));
        assert!(!is_truthy("0"));
        assert!(!is_truthy("false"));
        assert!(!is_truthy(""));
    }

    #[test]
    fn test_preview_char_boundary() {
        assert_eq!(preview("中文中文", 2), "中文...");
        assert_eq!(preview("ab\ncd", 10), "ab cd");
    }
}
