//! HTML heuristics used by the sitemap and web fetchers.
//!
//! Every heuristic is a small synchronous function over a parsed
//! [`Html`] document with a fixed fallback order:
//!
//! | What | Fallback order |
//! |------|----------------|
//! | Page title (sitemap) | `<title>` → `og:title` |
//! | Article title (web) | `og:title` → first `<h1>` → `<title>` |
//! | Body text | known content containers → densest paragraph block → `<body>` |
//! | Publish time | JSON-LD → meta tags → `<time>` → date in URL |
//! | Listing links | configured selector, else semantic headings, else largest link cluster |

use crate::utils::{collapse_whitespace, date_from_url, parse_timestamp, truncate_chars};
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::node::Element;
use scraper::{ElementRef, Html, Selector};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use url::Url;

fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("static selector parses")
}

static TITLE: Lazy<Selector> = Lazy::new(|| selector("title"));
static H1: Lazy<Selector> = Lazy::new(|| selector("h1"));
static BODY: Lazy<Selector> = Lazy::new(|| selector("body"));
static META: Lazy<Selector> = Lazy::new(|| selector("meta[content]"));
static TIME: Lazy<Selector> = Lazy::new(|| selector("time"));
static JSON_LD: Lazy<Selector> = Lazy::new(|| selector(r#"script[type="application/ld+json"]"#));
static ANCHOR: Lazy<Selector> = Lazy::new(|| selector("a[href]"));
static BLOCKS: Lazy<Selector> = Lazy::new(|| selector("div, section, td"));

static MAIN_CONTAINERS: Lazy<Vec<Selector>> = Lazy::new(|| {
    [
        "article",
        "main",
        "[role='main']",
        ".post-content",
        ".entry-content",
        ".article-body",
        ".article-content",
        "#content",
    ]
    .into_iter()
    .map(selector)
    .collect()
});

static HEADLINE_LINKS: Lazy<Vec<Selector>> = Lazy::new(|| {
    [
        "article h1 a[href], article h2 a[href], article h3 a[href]",
        "main h2 a[href], main h3 a[href], main h4 a[href]",
        ".post-title a[href], .entry-title a[href], .article-title a[href], .news-title a[href], .item-title a[href]",
        "h2 > a[href], h3 > a[href]",
        "article a[href]",
    ]
    .into_iter()
    .map(selector)
    .collect()
});

static NOISE_PATH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)/(tag|tags|category|categories|author|authors|page|search|login|signin|signup|register|about|contact|privacy|terms|feed)(/|$)",
    )
    .expect("valid noise regex")
});

const BOILERPLATE_TAGS: &[&str] = &[
    "nav", "header", "footer", "aside", "script", "style", "noscript", "form", "iframe", "svg",
    "button",
];

const BOILERPLATE_HINTS: &[&str] = &[
    "sidebar",
    "menu",
    "advert",
    "share",
    "related",
    "comments",
    "cookie",
    "newsletter",
];

const PUBLISHED_META: &[&str] = &[
    "article:published_time",
    "article:modified_time",
    "og:updated_time",
    "date",
    "pubdate",
    "dc.date",
];

const JSON_LD_DATE_FIELDS: &[&str] = &["datePublished", "dateModified", "dateCreated"];

/// Minimum characters for a content container to be trusted.
const MIN_CONTAINER_TEXT: usize = 80;

fn element_text(el: ElementRef<'_>) -> String {
    collapse_whitespace(&el.text().collect::<Vec<_>>().join(" "))
}

fn first_text(doc: &Html, sel: &Selector) -> Option<String> {
    doc.select(sel)
        .map(element_text)
        .find(|t| !t.is_empty())
}

fn meta_content(doc: &Html, key: &str) -> Option<String> {
    doc.select(&META)
        .find(|el| {
            let v = el.value();
            [v.attr("property"), v.attr("name"), v.attr("itemprop")]
                .into_iter()
                .flatten()
                .any(|k| k.eq_ignore_ascii_case(key))
        })
        .and_then(|el| el.value().attr("content"))
        .map(collapse_whitespace)
        .filter(|s| !s.is_empty())
}

/// Plain text of an HTML fragment (feed summaries), capped at `max_chars`.
pub fn html_to_text(html: &str, max_chars: usize) -> String {
    let fragment = Html::parse_fragment(html);
    let text = collapse_whitespace(&fragment.root_element().text().collect::<Vec<_>>().join(" "));
    truncate_chars(&text, max_chars)
}

/// Lightweight title lookup: `<title>`, then `og:title`.
pub fn page_title(doc: &Html) -> Option<String> {
    first_text(doc, &TITLE).or_else(|| meta_content(doc, "og:title"))
}

/// Article headline: `og:title`, then the first `<h1>`, then `<title>`.
pub fn article_title(doc: &Html) -> Option<String> {
    meta_content(doc, "og:title")
        .or_else(|| first_text(doc, &H1))
        .or_else(|| first_text(doc, &TITLE))
}

fn is_boilerplate(el: &Element) -> bool {
    if BOILERPLATE_TAGS.contains(&el.name()) {
        return true;
    }
    el.classes()
        .chain(el.id())
        .any(|name| {
            let name = name.to_ascii_lowercase();
            BOILERPLATE_HINTS.iter().any(|hint| name.contains(hint))
        })
}

/// Visible text under `root`, skipping anything inside a boilerplate region.
/// Only elements below `root` are checked; classes on `root` and its
/// ancestors (`<body class="has-sidebar">`) never hide the content.
fn visible_text(root: ElementRef<'_>) -> String {
    let root_id = root.id();
    let mut pieces = Vec::new();
    for node in root.descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let piece = text.trim();
        if piece.is_empty() {
            continue;
        }
        let hidden = node
            .ancestors()
            .take_while(|a| a.id() != root_id)
            .filter_map(|a| a.value().as_element())
            .any(is_boilerplate);
        if !hidden {
            pieces.push(piece);
        }
    }
    collapse_whitespace(&pieces.join(" "))
}

/// The block whose direct `<p>` children carry the most text.
fn densest_block(doc: &Html) -> Option<ElementRef<'_>> {
    let mut best: Option<(usize, ElementRef<'_>)> = None;
    for block in doc.select(&BLOCKS) {
        let score: usize = block
            .children()
            .filter_map(ElementRef::wrap)
            .filter(|child| child.value().name() == "p")
            .map(|p| element_text(p).len())
            .sum();
        if score > 0 && best.is_none_or(|(top, _)| score > top) {
            best = Some((score, block));
        }
    }
    best.map(|(_, block)| block)
}

/// Main article text with boilerplate removed, capped at `max_chars`.
pub fn main_text(doc: &Html, max_chars: usize) -> String {
    for sel in MAIN_CONTAINERS.iter() {
        if let Some(container) = doc.select(sel).next() {
            let text = visible_text(container);
            if text.chars().count() >= MIN_CONTAINER_TEXT {
                return truncate_chars(&text, max_chars);
            }
        }
    }

    let text = densest_block(doc)
        .map(visible_text)
        .filter(|t| !t.is_empty())
        .or_else(|| doc.select(&BODY).next().map(visible_text))
        .unwrap_or_else(|| visible_text(doc.root_element()));
    truncate_chars(&text, max_chars)
}

fn json_ld_date(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::Array(items) => items.iter().find_map(json_ld_date),
        Value::Object(map) => JSON_LD_DATE_FIELDS
            .iter()
            .filter_map(|field| map.get(*field).and_then(Value::as_str))
            .find_map(parse_timestamp)
            .or_else(|| map.get("@graph").and_then(json_ld_date)),
        _ => None,
    }
}

/// Publish time from page metadata, falling back to a date in the URL.
pub fn published_at(doc: &Html, url: &str) -> Option<DateTime<Utc>> {
    let from_json_ld = doc.select(&JSON_LD).find_map(|script| {
        let raw = script.text().collect::<String>();
        serde_json::from_str::<Value>(raw.trim())
            .ok()
            .and_then(|v| json_ld_date(&v))
    });
    if from_json_ld.is_some() {
        return from_json_ld;
    }

    let from_meta = PUBLISHED_META
        .iter()
        .filter_map(|key| meta_content(doc, key))
        .find_map(|content| parse_timestamp(&content));
    if from_meta.is_some() {
        return from_meta;
    }

    let from_time = doc.select(&TIME).find_map(|el| {
        el.value()
            .attr("datetime")
            .and_then(parse_timestamp)
            .or_else(|| parse_timestamp(&element_text(el)))
    });
    if from_time.is_some() {
        return from_time;
    }

    date_from_url(url)
}

/// A candidate article link found on a listing page.
#[derive(Debug, Clone, PartialEq)]
pub struct ListingLink {
    pub url: String,
    /// Anchor text, used as a title hint.
    pub text: String,
}

/// Resolve and filter one anchor; `None` for noise.
fn listing_link(anchor: ElementRef<'_>, base: &Url) -> Option<ListingLink> {
    let href = anchor.value().attr("href")?.trim();
    if href.is_empty() || href.starts_with('#') {
        return None;
    }
    let lower = href.to_ascii_lowercase();
    if lower.starts_with("mailto:") || lower.starts_with("javascript:") || lower.starts_with("tel:") {
        return None;
    }

    let mut resolved = base.join(href).ok()?;
    if !matches!(resolved.scheme(), "http" | "https") {
        return None;
    }
    if NOISE_PATH.is_match(resolved.path()) {
        return None;
    }
    resolved.set_fragment(None);

    let mut listing = base.clone();
    listing.set_fragment(None);
    if resolved == listing {
        return None;
    }

    Some(ListingLink {
        url: resolved.to_string(),
        text: element_text(anchor),
    })
}

fn collect_links<'a>(anchors: impl Iterator<Item = ElementRef<'a>>, base: &Url) -> Vec<ListingLink> {
    let mut seen = HashSet::new();
    anchors
        .filter_map(|a| listing_link(a, base))
        .filter(|link| seen.insert(link.url.clone()))
        .collect()
}

/// Structural signature of an anchor: tag and first class of up to three ancestors.
fn cluster_signature(anchor: ElementRef<'_>) -> String {
    let mut parts: Vec<String> = anchor
        .ancestors()
        .filter_map(|n| n.value().as_element())
        .take(3)
        .map(|e| match e.classes().next() {
            Some(class) => format!("{}.{}", e.name(), class),
            None => e.name().to_string(),
        })
        .collect();
    parts.reverse();
    parts.join(">")
}

/// Links of the largest group of structurally identical, visible anchors.
fn largest_link_cluster(doc: &Html, base: &Url) -> Vec<ListingLink> {
    let mut clusters: Vec<Vec<ListingLink>> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut seen = HashSet::new();

    for anchor in doc.select(&ANCHOR) {
        let Some(link) = listing_link(anchor, base) else {
            continue;
        };
        if link.text.is_empty() || !seen.insert(link.url.clone()) {
            continue;
        }
        let slot = *index.entry(cluster_signature(anchor)).or_insert_with(|| {
            clusters.push(Vec::new());
            clusters.len() - 1
        });
        clusters[slot].push(link);
    }

    let mut best: Vec<ListingLink> = Vec::new();
    for cluster in clusters {
        if cluster.len() > best.len() {
            best = cluster;
        }
    }
    best
}

/// Extract candidate article links from a listing page, in document order.
///
/// With a selector, each match contributes its own `href` or that of its
/// first descendant anchor. Without one, the headline heuristics are tried
/// in order and the largest link cluster is the last resort.
pub fn listing_links(doc: &Html, base: &Url, article_selector: Option<&Selector>) -> Vec<ListingLink> {
    if let Some(sel) = article_selector {
        let anchors = doc.select(sel).filter_map(|el| {
            if el.value().name() == "a" {
                Some(el)
            } else {
                el.select(&ANCHOR).next()
            }
        });
        return collect_links(anchors, base);
    }

    for sel in HEADLINE_LINKS.iter() {
        let links = collect_links(doc.select(sel), base);
        if !links.is_empty() {
            return links;
        }
    }

    largest_link_cluster(doc, base)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn base() -> Url {
        Url::parse("https://news.example.com/latest/").unwrap()
    }

    #[test]
    fn test_html_to_text() {
        let html = "<p>Rust <b>1.90</b> released.</p>\n<p>Faster   builds.</p>";
        assert_eq!(html_to_text(html, 500), "Rust 1.90 released. Faster builds.");
        assert_eq!(html_to_text(html, 4), "Rust");
    }

    #[test]
    fn test_page_title_prefers_title_tag() {
        let doc = Html::parse_document(
            r#"<html><head><title> Launch day </title><meta property="og:title" content="OG"></head></html>"#,
        );
        assert_eq!(page_title(&doc), Some("Launch day".to_string()));

        let doc = Html::parse_document(r#"<html><head><meta property="og:title" content="OG title"></head></html>"#);
        assert_eq!(page_title(&doc), Some("OG title".to_string()));
    }

    #[test]
    fn test_article_title_order() {
        let doc = Html::parse_document(
            "<html><head><title>Site | Story</title></head><body><h1>Story headline</h1></body></html>",
        );
        assert_eq!(article_title(&doc), Some("Story headline".to_string()));

        let doc = Html::parse_document("<html><head></head><body><p>no title</p></body></html>");
        assert_eq!(article_title(&doc), None);
    }

    #[test]
    fn test_main_text_skips_boilerplate() {
        let html = r#"<html><body>
            <nav>Home | World | Tech</nav>
            <article>
              <p>The new compiler release brings incremental builds to every target and cuts link times in half.</p>
              <div class="share-buttons">Share on X</div>
              <p>Maintainers expect adoption within weeks.</p>
            </article>
            <footer>Copyright 2025</footer>
        </body></html>"#;
        let doc = Html::parse_document(html);
        let text = main_text(&doc, 1000);
        assert!(text.starts_with("The new compiler release"));
        assert!(text.contains("Maintainers expect adoption"));
        assert!(!text.contains("Share on X"));
        assert!(!text.contains("Home | World"));
        assert!(!text.contains("Copyright"));
    }

    #[test]
    fn test_main_text_ignores_hints_on_outer_elements() {
        let html = r#"<html><body class="post-template-default single has-sidebar">
            <div id="main-menu-wrapper"><article>
              <p>The new compiler release brings incremental builds to every target and cuts link times in half.</p>
              <aside class="related">Related posts</aside>
            </article></div>
            <div class="sidebar">Popular this week</div>
        </body></html>"#;
        let doc = Html::parse_document(html);
        let text = main_text(&doc, 1000);
        assert!(text.starts_with("The new compiler release"));
        assert!(!text.contains("Related posts"));
        assert!(!text.contains("Popular this week"));
    }

    #[test]
    fn test_main_text_falls_back_to_densest_block() {
        let html = r#"<html><body>
            <div class="links"><a href="/a">A</a><a href="/b">B</a></div>
            <div class="story"><p>First paragraph of the story.</p><p>Second paragraph of the story.</p></div>
        </body></html>"#;
        let doc = Html::parse_document(html);
        assert_eq!(
            main_text(&doc, 1000),
            "First paragraph of the story. Second paragraph of the story."
        );
    }

    #[test]
    fn test_published_at_json_ld_graph() {
        let html = r#"<html><head><script type="application/ld+json">
            {"@context": "https://schema.org", "@graph": [{"@type": "WebPage"}, {"@type": "NewsArticle", "datePublished": "2025-02-21T08:30:00Z"}]}
        </script></head></html>"#;
        let doc = Html::parse_document(html);
        assert_eq!(
            published_at(&doc, "https://x.com/a"),
            Some(Utc.with_ymd_and_hms(2025, 2, 21, 8, 30, 0).unwrap())
        );
    }

    #[test]
    fn test_published_at_meta_then_time_then_url() {
        let meta = Html::parse_document(
            r#"<html><head><meta property="article:published_time" content="2025-02-20T10:00:00+00:00"></head></html>"#,
        );
        assert_eq!(
            published_at(&meta, "https://x.com/a"),
            Some(Utc.with_ymd_and_hms(2025, 2, 20, 10, 0, 0).unwrap())
        );

        let time = Html::parse_document(r#"<html><body><time datetime="2025-02-19">Feb 19</time></body></html>"#);
        assert_eq!(
            published_at(&time, "https://x.com/a"),
            Some(Utc.with_ymd_and_hms(2025, 2, 19, 0, 0, 0).unwrap())
        );

        let bare = Html::parse_document("<html><body><p>text</p></body></html>");
        assert_eq!(
            published_at(&bare, "https://x.com/2025/02/18/story"),
            Some(Utc.with_ymd_and_hms(2025, 2, 18, 0, 0, 0).unwrap())
        );
        assert_eq!(published_at(&bare, "https://x.com/story"), None);
    }

    #[test]
    fn test_listing_links_with_selector() {
        let html = r#"<html><body>
            <h2 class="title"><a href="/posts/one">One</a></h2>
            <h2 class="title"><a href="https://news.example.com/posts/two#comments">Two</a></h2>
            <h2 class="title"><a href="/posts/one">One again</a></h2>
            <h2 class="other"><a href="/posts/three">Three</a></h2>
        </body></html>"#;
        let doc = Html::parse_document(html);
        let sel = Selector::parse("h2.title > a").unwrap();
        let links = listing_links(&doc, &base(), Some(&sel));
        let urls: Vec<_> = links.iter().map(|l| l.url.as_str()).collect();
        assert_eq!(
            urls,
            vec![
                "https://news.example.com/posts/one",
                "https://news.example.com/posts/two"
            ]
        );
        assert_eq!(links[0].text, "One");
    }

    #[test]
    fn test_listing_links_selector_on_container() {
        let html = r#"<div class="card"><span>Label</span><a href="/posts/x">X</a></div>"#;
        let doc = Html::parse_document(html);
        let sel = Selector::parse(".card").unwrap();
        let links = listing_links(&doc, &base(), Some(&sel));
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].url, "https://news.example.com/posts/x");
    }

    #[test]
    fn test_listing_links_filters_noise() {
        let html = r#"<main>
            <h2><a href="/tag/rust/">Rust tag</a></h2>
            <h2><a href="mailto:tips@example.com">Tips</a></h2>
            <h2><a href="/about">About</a></h2>
            <h2><a href="/2025/02/21/real-story">Real story</a></h2>
        </main>"#;
        let doc = Html::parse_document(html);
        let links = listing_links(&doc, &base(), None);
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].url, "https://news.example.com/2025/02/21/real-story");
    }

    #[test]
    fn test_listing_links_largest_cluster() {
        let html = r#"<body>
            <div class="nav"><a href="/world">World</a><a href="/business">Business</a></div>
            <ul class="stories">
              <li class="item"><a href="/s/1">Story one</a></li>
              <li class="item"><a href="/s/2">Story two</a></li>
              <li class="item"><a href="/s/3">Story three</a></li>
            </ul>
            <p><a href="/s/4"><img src="x.png"></a></p>
        </body>"#;
        let doc = Html::parse_document(html);
        let links = listing_links(&doc, &base(), None);
        let urls: Vec<_> = links.iter().map(|l| l.url.as_str()).collect();
        assert_eq!(
            urls,
            vec![
                "https://news.example.com/s/1",
                "https://news.example.com/s/2",
                "https://news.example.com/s/3"
            ]
        );
    }
}
