//! HTML parsing for the front page and discussion threads
//!
//! Both functions here are pure and never fail: malformed markup yields
//! whatever could be recovered from it.

use crate::item::{Item, ItemId};
use scraper::{ElementRef, Html, Selector};
use std::collections::BTreeSet;
use url::Url;

/// Story rows on the front page
const ROW_SELECTOR: &str = "tr.athing";

/// Story link inside a row
const TITLE_LINK_SELECTOR: &str = "td.title > span > a";

/// Anchors inside comment bodies and the story's own text
const DISCUSSION_LINK_SELECTOR: &str = "div.comment a[href], div.toptext a[href]";

/// Parses the front page into items, in page order
///
/// Rows without a usable id or article href are skipped. Relative article
/// links (self posts) are resolved against `base_url`. An article link that
/// cannot be downloaded (`mailto:` and the like) still yields an item, so its
/// discussion gets archived; the article fetch fails later on its own.
///
/// # Example
///
/// ```
/// use url::Url;
/// use ycrawler::crawler::parse_listing;
///
/// let html = r#"<table><tr class="athing" id="1">
///   <td class="title"><span class="titleline"><a href="https://example.com/">Story</a></span></td>
/// </tr></table>"#;
/// let base = Url::parse("https://news.ycombinator.com").unwrap();
/// let items = parse_listing(html, &base);
/// assert_eq!(items[0].id.as_str(), "1");
/// ```
pub fn parse_listing(html: &str, base_url: &Url) -> Vec<Item> {
    let document = Html::parse_document(html);
    let mut items = Vec::new();

    let (Ok(row_selector), Ok(link_selector)) = (
        Selector::parse(ROW_SELECTOR),
        Selector::parse(TITLE_LINK_SELECTOR),
    ) else {
        return items;
    };

    for row in document.select(&row_selector) {
        match parse_row(row, &link_selector, base_url) {
            Some(item) => items.push(item),
            None => tracing::debug!(
                "Skipping listing row without a usable id or link: {:?}",
                row.value().attr("id")
            ),
        }
    }

    items
}

fn parse_row(row: ElementRef<'_>, link_selector: &Selector, base_url: &Url) -> Option<Item> {
    let id = ItemId::parse(row.value().attr("id")?)?;
    let href = row.select(link_selector).next()?.value().attr("href")?;
    let article_url = base_url.join(href.trim()).ok()?;

    Some(Item::new(id, article_url, base_url))
}

/// Extracts the external links referenced from a discussion page
///
/// # Link Extraction Rules
///
/// **Include:**
/// - `<a href>` inside comment bodies (`div.comment`)
/// - `<a href>` inside the story's own text (`div.toptext`)
///
/// **Exclude:**
/// - Anything whose origin equals the aggregator's (reply, vote, user links)
/// - Non-HTTP(S) schemes (`javascript:`, `mailto:`, ...)
/// - Fragment-only links
///
/// Fragments are stripped, so links differing only by anchor collapse into one.
///
/// # Arguments
///
/// * `html` - The discussion page content
/// * `page_url` - URL the page was fetched from, used to resolve relative links
/// * `site` - Any URL on the aggregator, used to recognise internal links
pub fn extract_links(html: &str, page_url: &Url, site: &Url) -> BTreeSet<Url> {
    let document = Html::parse_document(html);
    let mut links = BTreeSet::new();

    let Ok(selector) = Selector::parse(DISCUSSION_LINK_SELECTOR) else {
        return links;
    };

    for element in document.select(&selector) {
        if let Some(href) = element.value().attr("href") {
            if let Some(url) = resolve_link(href, page_url) {
                if url.origin() != site.origin() {
                    links.insert(url);
                }
            }
        }
    }

    links
}

/// Resolves a link href to an absolute URL and validates it
///
/// Returns None if the link should be excluded:
/// - Empty and fragment-only hrefs
/// - Invalid URLs
/// - Non-HTTP(S) URLs after resolution
fn resolve_link(href: &str, base_url: &Url) -> Option<Url> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    let mut url = base_url.join(href).ok()?;
    if !is_fetchable(&url) {
        return None;
    }

    url.set_fragment(None);
    Some(url)
}

fn is_fetchable(url: &Url) -> bool {
    matches!(url.scheme(), "http" | "https") && url.host_str().is_some()
}
