//! Document-link discovery on municipal listing pages.

use std::collections::BTreeSet;

use regex::Regex;
use reqwest::Url;
use scraper::{Html, Selector};

/// A link found on a listing page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentLink {
    /// Absolute URL.
    pub url: String,
    /// Anchor text, whitespace-collapsed.
    pub text: String,
}

/// Finds anchors whose `href` or text matches one of `patterns`.
///
/// Relative links are resolved against `base_url`. Results are deduplicated
/// by URL, kept in page order, and capped at `max`.
#[must_use]
pub fn discover_document_links(
    html: &str,
    base_url: &str,
    patterns: &[Regex],
    max: usize,
) -> Vec<DocumentLink> {
    let Ok(anchor) = Selector::parse("a[href]") else {
        return Vec::new();
    };
    let base = Url::parse(base_url).ok();
    let document = Html::parse_document(html);

    let mut seen = BTreeSet::new();
    let mut links = Vec::new();

    for el in document.select(&anchor) {
        if links.len() >= max {
            break;
        }
        let Some(href) = el.value().attr("href") else {
            continue;
        };
        let text = el.text().collect::<Vec<_>>().join(" ");
        let text = text.split_whitespace().collect::<Vec<_>>().join(" ");

        if !patterns.iter().any(|p| p.is_match(href) || p.is_match(&text)) {
            continue;
        }

        let resolved = match &base {
            Some(base) => base.join(href).map(String::from).ok(),
            None => Url::parse(href).map(String::from).ok(),
        };
        let Some(url) = resolved else {
            log::debug!("Skipping unresolvable link '{href}' on {base_url}");
            continue;
        };

        if seen.insert(url.clone()) {
            links.push(DocumentLink { url, text });
        }
    }

    links
}

/// Returns the visible text of a page, whitespace-collapsed.
#[must_use]
pub fn page_text(html: &str) -> String {
    let document = Html::parse_document(html);
    document
        .root_element()
        .text()
        .collect::<Vec<_>>()
        .join(" ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    const LISTING: &str = r#"
        <a href="/files/Tax-Sale-Oct-2025.pdf">Tax Sale List</a>
        <a href="https://cdn.example.com/tender.pdf">Public Tender Properties</a>
        <a href="/files/Tax-Sale-Oct-2025.pdf">Download again</a>
        <a href="/about">About us</a>"#;

    #[test]
    fn resolves_and_dedupes_links() {
        let patterns = vec![Regex::new(r"(?i)\.pdf$").unwrap()];
        let links = discover_document_links(LISTING, "https://example.com/tax/", &patterns, 10);
        assert_eq!(links.len(), 2);
        assert_eq!(links[0].url, "https://example.com/files/Tax-Sale-Oct-2025.pdf");
        assert_eq!(links[0].text, "Tax Sale List");
        assert_eq!(links[1].url, "https://cdn.example.com/tender.pdf");
    }

    #[test]
    fn respects_max() {
        let patterns = vec![Regex::new(r"(?i)\.pdf$").unwrap()];
        let links = discover_document_links(LISTING, "https://example.com/", &patterns, 1);
        assert_eq!(links.len(), 1);
    }

    #[test]
    fn page_text_collapses_whitespace() {
        assert_eq!(page_text("<p>Sale  date:\n October 15, 2025</p>"), "Sale date: October 15, 2025");
    }
}
