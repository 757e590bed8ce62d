//! Hyperlink harvesting

use scraper::{ElementRef, Selector};
use std::sync::OnceLock;
use url::Url;

fn anchor_selector() -> &'static Option<Selector> {
    static SELECTOR: OnceLock<Option<Selector>> = OnceLock::new();
    SELECTOR.get_or_init(|| Selector::parse("a[href]").ok())
}

/// Collects every hyperlink in `element` as an absolute URL.
///
/// The element itself counts when it is an `<a href>`. Links are returned in
/// document order and are not deduplicated.
pub fn harvest_links(element: ElementRef<'_>, page_url: &Url) -> Vec<String> {
    let mut links = Vec::new();

    if element.value().name() == "a" {
        if let Some(href) = element.value().attr("href") {
            links.extend(resolve_link(href, page_url));
        }
    }

    if let Some(selector) = anchor_selector() {
        for anchor in element.select(selector) {
            if let Some(href) = anchor.value().attr("href") {
                links.extend(resolve_link(href, page_url));
            }
        }
    }

    links
}

/// Resolves an href against the page URL
///
/// Returns None if the link should be excluded:
/// - javascript:, mailto:, tel: schemes
/// - data: URIs
/// - Invalid URLs
/// - Non-HTTP(S) URLs after resolution
pub fn resolve_link(href: &str, page_url: &Url) -> Option<String> {
    let href = href.trim();
    if href.is_empty() {
        return None;
    }

    let lower = href.to_ascii_lowercase();
    if ["javascript:", "mailto:", "tel:", "data:"]
        .iter()
        .any(|scheme| lower.starts_with(scheme))
    {
        return None;
    }

    let absolute = page_url.join(href).ok()?;
    match absolute.scheme() {
        "http" | "https" => Some(absolute.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::Html;

    fn page_url() -> Url {
        Url::parse("https://x.com/p").unwrap()
    }

    fn links_in(html: &str, selector: &str) -> Vec<String> {
        let doc = Html::parse_document(html);
        let sel = Selector::parse(selector).unwrap();
        doc.select(&sel)
            .flat_map(|el| harvest_links(el, &page_url()))
            .collect()
    }

    #[test]
    fn test_relative_link_resolved_against_page() {
        assert_eq!(
            links_in(r#"<div id="c"><a href="/a">A</a></div>"#, "#c"),
            vec!["https://x.com/a"]
        );
    }

    #[test]
    fn test_relative_path_link() {
        assert_eq!(
            resolve_link("other", &page_url()),
            Some("https://x.com/other".to_string())
        );
    }

    #[test]
    fn test_anchor_element_itself_counts() {
        assert_eq!(
            links_in(r#"<a id="c" href="/self">A</a>"#, "#c"),
            vec!["https://x.com/self"]
        );
    }

    #[test]
    fn test_no_dedup_across_elements() {
        let html = r#"<p class="c"><a href="/a">1</a></p><p class="c"><a href="/a">2</a></p>"#;
        assert_eq!(
            links_in(html, ".c"),
            vec!["https://x.com/a", "https://x.com/a"]
        );
    }

    #[test]
    fn test_skips_non_navigable_schemes() {
        for href in [
            "javascript:void(0)",
            "JavaScript:alert(1)",
            "mailto:test@example.com",
            "tel:+1234567890",
            "data:text/html,<h1>x</h1>",
            "ftp://files.example.com/a",
            "",
        ] {
            assert_eq!(resolve_link(href, &page_url()), None, "href {:?}", href);
        }
    }

    #[test]
    fn test_fragment_links_kept() {
        assert_eq!(
            resolve_link("#top", &page_url()),
            Some("https://x.com/p#top".to_string())
        );
    }

    #[test]
    fn test_absolute_link_untouched() {
        assert_eq!(
            resolve_link("https://other.com/page", &page_url()),
            Some("https://other.com/page".to_string())
        );
    }
}
