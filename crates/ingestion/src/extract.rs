//! HTML extraction for listing and article pages

use articleforge_common::text::{paragraphs, truncate_chars};
use scraper::{Html, Selector};
use std::sync::OnceLock;
use url::Url;

/// Content containers, most specific first
const CONTENT_CONTAINERS: &[&str] = &["div.entry-content", "div.post-content", "article", "main"];

/// A link found on the listing page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub title: String,
    pub url: String,
}

fn heading_links() -> &'static Selector {
    static HEADING_LINKS: OnceLock<Selector> = OnceLock::new();
    HEADING_LINKS.get_or_init(|| Selector::parse("h2 a, h3 a").expect("static selector"))
}

fn containers() -> &'static [Selector] {
    static CONTAINERS: OnceLock<Vec<Selector>> = OnceLock::new();
    CONTAINERS.get_or_init(|| {
        CONTENT_CONTAINERS
            .iter()
            .map(|css| Selector::parse(css).expect("static selector"))
            .collect()
    })
}

/// Scheme, host and port of `listing` with an empty path
pub fn site_root(listing: &Url) -> Url {
    let mut root = listing.clone();
    root.set_path("/");
    root.set_query(None);
    root.set_fragment(None);
    root
}

/// Up to `max` heading links, in document order, resolved against `root`
pub fn extract_candidates(html: &str, root: &Url, max: usize) -> Vec<Candidate> {
    let document = Html::parse_document(html);

    document
        .select(heading_links())
        .filter_map(|anchor| {
            let title = anchor.text().collect::<String>().trim().to_string();
            let href = anchor.value().attr("href")?.trim();
            if title.is_empty() || href.is_empty() {
                return None;
            }

            let url = root.join(href).ok()?;
            Some(Candidate {
                title,
                url: url.to_string(),
            })
        })
        .take(max)
        .collect()
}

/// Paragraph text of the first content container that has any.
///
/// Paragraphs are joined with blank lines and the result is capped at
/// `max_chars` characters.
pub fn extract_content(html: &str, max_chars: usize) -> Option<String> {
    let document = Html::parse_document(html);

    containers().iter().find_map(|selector| {
        document.select(selector).find_map(|container| {
            let text = paragraphs(container).join("\n\n");
            let text = text.trim();
            if text.is_empty() {
                None
            } else {
                Some(truncate_chars(text, max_chars).to_string())
            }
        })
    })
}
