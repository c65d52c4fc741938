//! Text and HTML helpers shared by the scrapers

use regex_lite::Regex;
use scraper::{ElementRef, Selector};
use std::sync::OnceLock;

fn whitespace() -> &'static Regex {
    static WHITESPACE: OnceLock<Regex> = OnceLock::new();
    WHITESPACE.get_or_init(|| Regex::new(r"\s+").expect("static regex"))
}

fn paragraph_selector() -> &'static Selector {
    static PARAGRAPH: OnceLock<Selector> = OnceLock::new();
    PARAGRAPH.get_or_init(|| Selector::parse("p").expect("static selector"))
}

/// Collapse every whitespace run to a single space and trim
pub fn collapse_whitespace(text: &str) -> String {
    whitespace().replace_all(text, " ").trim().to_string()
}

/// Keep at most `max` characters, never splitting a code point
pub fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Texts of the `p` descendants of `root`, each trimmed, empty ones dropped
pub fn paragraphs(root: ElementRef<'_>) -> Vec<String> {
    root.select(paragraph_selector())
        .map(|p| p.text().collect::<String>().trim().to_string())
        .filter(|text| !text.is_empty())
        .collect()
}

/// Host without a leading `www.`
pub fn bare_host(host: &str) -> &str {
    host.strip_prefix("www.").unwrap_or(host)
}

/// Whether `host` is `domain` or one of its subdomains
pub fn host_matches_domain(host: &str, domain: &str) -> bool {
    let host = host.trim_end_matches('.').to_ascii_lowercase();
    let domain = bare_host(domain.trim_end_matches('.')).to_ascii_lowercase();

    host == domain
        || host
            .strip_suffix(domain.as_str())
            .is_some_and(|prefix| prefix.ends_with('.'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::Html;

    #[test]
    fn test_collapse_whitespace() {
        assert_eq!(collapse_whitespace("  one\n\n two\t three  "), "one two three");
        assert_eq!(collapse_whitespace("\n\t "), "");
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("short", 50), "short");
        assert_eq!(truncate_chars("日本語テキスト", 3), "日本語");
    }

    #[test]
    fn test_paragraphs_skip_empty() {
        let html = Html::parse_document(
            "<article><p> First </p><p>   </p><div><p>Second</p></div></article>",
        );
        assert_eq!(paragraphs(html.root_element()), vec!["First", "Second"]);
    }

    #[test]
    fn test_host_matching() {
        assert!(host_matches_domain("google.com", "www.google.com"));
        assert!(host_matches_domain("news.google.com", "google.com"));
        assert!(host_matches_domain("BeyondChats.com", "beyondchats.com"));
        assert!(!host_matches_domain("notgoogle.com", "google.com"));
        assert!(!host_matches_domain("example.org", "beyondchats.com"));
    }
}
