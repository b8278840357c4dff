//! HTML text extractors.
//!
//! [`main_content`] finds the main content container with readability-style
//! heuristics and keeps paragraph-like blocks only. [`full_text`] keeps every
//! visible text node and is the fallback when the first finds nothing.

use scraper::node::Element;
use scraper::{ElementRef, Html, Node, Selector};
use tracing::{debug, instrument};

use corpusfetch_shared::{CorpusError, Result};

use crate::ExtractContext;
use crate::cleanup;

/// Candidate main-content containers.
const CONTENT_SELECTORS: &str = r#"article, main, [role="main"], #content, #main-content, .content, .post-content, .entry-content, .article-body, .article-content"#;

/// Elements whose text is never content.
const CHROME_TAGS: &[&str] = &[
    "nav", "footer", "aside", "form", "script", "style", "noscript", "template", "svg",
    "button", "iframe", "select", "table", "figure",
];

/// Elements dropped by the fallback extractor.
const INVISIBLE_TAGS: &[&str] = &["script", "style", "noscript", "template"];

/// Paragraph-like blocks kept by the main-content extractor.
const BLOCK_TAGS: &[&str] = &[
    "p", "h1", "h2", "h3", "h4", "h5", "h6", "li", "blockquote", "pre", "dd", "dt",
];

/// Class/id fragments that mark boilerplate containers.
const BOILERPLATE_MARKERS: &[&str] = &[
    "sidebar", "navbar", "nav", "menu", "breadcrumb", "breadcrumbs", "cookie", "cookies",
    "advert", "ads", "social", "share", "sharing", "comments", "related", "newsletter",
    "footer", "subscribe", "promo",
];

/// ARIA roles that mark page chrome.
const CHROME_ROLES: &[&str] = &["navigation", "banner", "contentinfo", "complementary", "search"];

/// Blocks where more than this share of characters sits inside links are dropped.
const MAX_LINK_DENSITY: f64 = 0.6;

// ---------------------------------------------------------------------------
// Primary: main-content extraction
// ---------------------------------------------------------------------------

/// Extract the main article text, one block per line.
#[instrument(skip_all, fields(url = %ctx.url))]
pub fn main_content(bytes: &[u8], ctx: &ExtractContext<'_>) -> Result<String> {
    let html = String::from_utf8_lossy(bytes);
    let doc = Html::parse_document(&html);

    let content_sel = Selector::parse(CONTENT_SELECTORS)
        .map_err(|e| CorpusError::parse(format!("invalid content selector: {e}")))?;

    // Densest candidate wins; ties keep document order.
    let mut best: Option<Vec<String>> = None;
    for candidate in doc.select(&content_sel) {
        let blocks = collect_blocks(candidate, true);
        let len = text_len(&blocks);
        if len > 0 && best.as_ref().is_none_or(|b| len > text_len(b)) {
            best = Some(blocks);
        }
    }

    let blocks = match best {
        Some(blocks) => blocks,
        None => {
            let body_sel = Selector::parse("body")
                .map_err(|e| CorpusError::parse(format!("invalid body selector: {e}")))?;
            match doc.select(&body_sel).next() {
                Some(body) => collect_blocks(body, false),
                None => return Err(CorpusError::parse("document has no body")),
            }
        }
    };

    debug!(blocks = blocks.len(), "main content blocks collected");
    Ok(cleanup::join_blocks(&blocks))
}

fn text_len(blocks: &[String]) -> usize {
    blocks.iter().map(|b| b.len()).sum()
}

/// Walk `root`, pruning chrome, and gather the text of each outermost block.
///
/// Inside a content candidate `<header>` carries the title and is kept; over
/// the whole body it is the site banner.
fn collect_blocks(root: ElementRef<'_>, keep_headers: bool) -> Vec<String> {
    let mut blocks = Vec::new();
    walk(root, keep_headers, &mut blocks);
    blocks
}

fn walk(el: ElementRef<'_>, keep_headers: bool, blocks: &mut Vec<String>) {
    for child in el.children().filter_map(ElementRef::wrap) {
        let value = child.value();
        if is_chrome(value, keep_headers) {
            continue;
        }

        if BLOCK_TAGS.contains(&value.name()) {
            let mut text = String::new();
            let mut link_chars = 0usize;
            block_text(child, keep_headers, false, &mut text, &mut link_chars);

            let text = cleanup::collapse_whitespace(&text);
            let total = text.chars().filter(|c| !c.is_whitespace()).count();
            if total == 0 {
                continue;
            }
            if link_chars as f64 / total as f64 > MAX_LINK_DENSITY {
                continue;
            }
            blocks.push(text);
        } else {
            walk(child, keep_headers, blocks);
        }
    }
}

/// Concatenate the text under a block, counting characters inside links.
fn block_text(
    el: ElementRef<'_>,
    keep_headers: bool,
    in_link: bool,
    out: &mut String,
    link_chars: &mut usize,
) {
    for child in el.children() {
        match child.value() {
            Node::Text(text) => {
                out.push_str(text);
                if in_link {
                    *link_chars += text.chars().filter(|c| !c.is_whitespace()).count();
                }
            }
            Node::Element(value) => {
                let Some(child_el) = ElementRef::wrap(child) else {
                    continue;
                };
                if is_chrome(value, keep_headers) {
                    continue;
                }
                if value.name() == "br" {
                    out.push(' ');
                    continue;
                }
                block_text(
                    child_el,
                    keep_headers,
                    in_link || value.name() == "a",
                    out,
                    link_chars,
                );
                if BLOCK_TAGS.contains(&value.name()) {
                    out.push(' ');
                }
            }
            _ => {}
        }
    }
}

fn is_chrome(el: &Element, keep_headers: bool) -> bool {
    if CHROME_TAGS.contains(&el.name()) || is_hidden(el) {
        return true;
    }
    if el.name() == "header" && !keep_headers {
        return true;
    }

    if el
        .attr("role")
        .is_some_and(|r| CHROME_ROLES.contains(&r.trim().to_ascii_lowercase().as_str()))
    {
        return true;
    }

    let markers = el.classes().chain(el.id());
    markers
        .map(str::to_ascii_lowercase)
        .any(|token| {
            token
                .split(['-', '_'])
                .any(|part| BOILERPLATE_MARKERS.contains(&part))
        })
}

fn is_hidden(el: &Element) -> bool {
    el.attr("hidden").is_some()
        || el.attr("aria-hidden").is_some_and(|v| v.eq_ignore_ascii_case("true"))
        || el.attr("style").is_some_and(|s| {
            s.chars()
                .filter(|c| !c.is_whitespace())
                .collect::<String>()
                .to_ascii_lowercase()
                .contains("display:none")
        })
}

// ---------------------------------------------------------------------------
// Fallback: full-document text
// ---------------------------------------------------------------------------

/// Every text node outside script/style/noscript, one per line, blank lines dropped.
#[instrument(skip_all, fields(url = %ctx.url))]
pub fn full_text(bytes: &[u8], ctx: &ExtractContext<'_>) -> Result<String> {
    let html = String::from_utf8_lossy(bytes);
    let doc = Html::parse_document(&html);

    let mut out = String::new();
    visible_text(doc.root_element(), &mut out);

    Ok(cleanup::strip_blank_lines(&out))
}

fn visible_text(el: ElementRef<'_>, out: &mut String) {
    for child in el.children() {
        match child.value() {
            Node::Text(text) => {
                out.push_str(text);
                out.push('\n');
            }
            Node::Element(value) => {
                if INVISIBLE_TAGS.contains(&value.name()) {
                    continue;
                }
                if let Some(child_el) = ElementRef::wrap(child) {
                    visible_text(child_el, out);
                }
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> ExtractContext<'static> {
        ExtractContext {
            url: "https://example.com/post",
        }
    }

    #[test]
    fn main_content_prefers_article_over_chrome() {
        let html = r#"<html><body>
            <nav><ul><li><a href="/">Home</a></li><li><a href="/about">About</a></li></ul></nav>
            <header><h1>Site Name</h1></header>
            <article>
                <h1>Brute force campaign against SSH</h1>
                <p>Attackers   targeted
                   login nodes.</p>
                <div class="share-buttons"><p>Share on social</p></div>
                <script>var tracking = 1;</script>
                <p>Mitigations include key-only auth.</p>
            </article>
            <footer><p>Copyright 2024</p></footer>
        </body></html>"#;

        let text = main_content(html.as_bytes(), &ctx()).unwrap();
        assert_eq!(
            text,
            "Brute force campaign against SSH\nAttackers targeted login nodes.\nMitigations include key-only auth."
        );
    }

    #[test]
    fn main_content_keeps_article_header_titles() {
        let html = r#"<html><body>
            <header role="banner"><p>Site banner</p></header>
            <article>
                <header><h1>Title</h1><p class="byline">By A. Writer</p></header>
                <header role="banner"><p>Nested banner</p></header>
                <p>Body paragraph.</p>
            </article>
        </body></html>"#;

        let text = main_content(html.as_bytes(), &ctx()).unwrap();
        assert_eq!(text, "Title\nBy A. Writer\nBody paragraph.");
    }

    #[test]
    fn main_content_drops_site_header_in_body_fallback() {
        let html = r#"<html><body>
            <header><p>Site Name</p></header>
            <div><p>hello world</p></div>
        </body></html>"#;

        let text = main_content(html.as_bytes(), &ctx()).unwrap();
        assert_eq!(text, "hello world");
    }

    #[test]
    fn main_content_picks_densest_candidate() {
        let html = r#"<html><body>
            <main><p>Short teaser.</p></main>
            <div class="content"><p>A much longer body paragraph that carries the actual article text.</p></div>
        </body></html>"#;

        let text = main_content(html.as_bytes(), &ctx()).unwrap();
        assert_eq!(
            text,
            "A much longer body paragraph that carries the actual article text."
        );
    }

    #[test]
    fn main_content_drops_link_lists() {
        let html = r#"<html><body><main>
            <p>Real paragraph with a <a href="/x">small link</a> inside it.</p>
            <ul><li><a href="/1">Related one</a></li><li><a href="/2">Related two</a></li></ul>
        </main></body></html>"#;

        let text = main_content(html.as_bytes(), &ctx()).unwrap();
        assert_eq!(text, "Real paragraph with a small link inside it.");
    }

    #[test]
    fn main_content_falls_back_to_body_blocks() {
        let html = "<html><body><div><p>hello world</p></div></body></html>";
        let text = main_content(html.as_bytes(), &ctx()).unwrap();
        assert_eq!(text, "hello world");
    }

    #[test]
    fn main_content_ignores_loose_text() {
        let html = "<html><body><div>only loose text</div></body></html>";
        let text = main_content(html.as_bytes(), &ctx()).unwrap();
        assert!(text.is_empty());
    }

    #[test]
    fn hidden_blocks_are_skipped() {
        let html = r#"<html><body><main>
            <p style="display: none">cookie banner</p>
            <p aria-hidden="true">screen reader junk</p>
            <p>visible</p>
        </main></body></html>"#;
        let text = main_content(html.as_bytes(), &ctx()).unwrap();
        assert_eq!(text, "visible");
    }

    #[test]
    fn full_text_strips_scripts_and_blank_lines() {
        let html = r#"<html><head><title>Doc</title><style>p { color: red }</style></head>
            <body>
                <div>  first line  </div>

                <script>alert("x")</script>
                <noscript>enable js</noscript>
                <span>second</span>
            </body></html>"#;

        let text = full_text(html.as_bytes(), &ctx()).unwrap();
        assert_eq!(text, "Doc\nfirst line\nsecond");
    }

    #[test]
    fn full_text_of_empty_document_is_empty() {
        let text = full_text(b"", &ctx()).unwrap();
        assert!(text.is_empty());
    }
}
