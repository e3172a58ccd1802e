//! Structured content extraction from raw article HTML.
//!
//! Produces title, byline, publish time, cover image, section label, and a
//! readability-reduced plain-text body. Field precedence is first match
//! wins, not merged:
//!
//! - title: OpenGraph title over the document `<title>`
//! - byline: dedicated `byl` meta (minus a leading "By ") over generic
//!   author metas over a `rel="author"` link's visible text; URL-shaped
//!   candidates become a human name from the final path segment
//! - cover image: OpenGraph image over Twitter-card image
//! - section: explicit `article:section` over generic section metas
//!
//! Missing fields come back empty, never as errors — extraction does not
//! fail for a parseable document.

use std::io::Cursor;

use scraper::{Html, Selector};
use tracing::debug;
use url::Url;

use crate::utils::title_case_words;

/// Extracted article fields; any of them may be empty.
#[derive(Debug, Clone, Default)]
pub struct ExtractedFields {
    pub title: String,
    pub byline: String,
    pub published: Option<String>,
    pub image: Option<String>,
    pub section: Option<String>,
    /// Readability-reduced body, flattened to newline-joined visible text.
    pub body: String,
}

/// Extract structured fields from one article page.
pub fn extract_article_fields(url: &str, html: &str) -> ExtractedFields {
    let doc = Html::parse_document(html);

    let title = meta_content(&doc, r#"meta[property="og:title"]"#)
        .or_else(|| meta_content(&doc, r#"meta[name="og:title"]"#))
        .or_else(|| element_text(&doc, "title"))
        .unwrap_or_default();

    let byline = extract_byline(&doc).unwrap_or_default();

    let published = meta_content(&doc, r#"meta[property="article:published_time"]"#)
        .or_else(|| meta_content(&doc, r#"meta[name="article:published_time"]"#))
        .or_else(|| time_element(&doc));

    let image = meta_content(&doc, r#"meta[property="og:image"]"#)
        .or_else(|| meta_content(&doc, r#"meta[name="og:image"]"#))
        .or_else(|| meta_content(&doc, r#"meta[property="twitter:image"]"#))
        .or_else(|| meta_content(&doc, r#"meta[name="twitter:image"]"#));

    let section = meta_content(&doc, r#"meta[property="article:section"]"#)
        .or_else(|| meta_content(&doc, r#"meta[name="article:section"]"#))
        .or_else(|| meta_content(&doc, r#"meta[property="og:section"]"#))
        .or_else(|| meta_content(&doc, r#"meta[name="section"]"#));

    let body = readable_body(url, html);
    debug!(%url, title = %title, body_bytes = body.len(), "Extracted article fields");

    ExtractedFields {
        title,
        byline,
        published,
        image,
        section,
        body,
    }
}

/// First matching meta tag's non-empty, trimmed `content`.
fn meta_content(doc: &Html, selector: &str) -> Option<String> {
    let sel = Selector::parse(selector).ok()?;
    doc.select(&sel)
        .find_map(|el| el.value().attr("content"))
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// First matching element's visible text, trimmed.
fn element_text(doc: &Html, selector: &str) -> Option<String> {
    let sel = Selector::parse(selector).ok()?;
    let text = doc
        .select(&sel)
        .next()?
        .text()
        .collect::<Vec<_>>()
        .join(" ")
        .trim()
        .to_string();
    if text.is_empty() { None } else { Some(text) }
}

fn extract_byline(doc: &Html) -> Option<String> {
    if let Some(byl) = meta_content(doc, r#"meta[name="byl"]"#) {
        let stripped = byl
            .strip_prefix("By ")
            .or_else(|| byl.strip_prefix("by "))
            .unwrap_or(&byl);
        return Some(stripped.trim().to_string());
    }

    for selector in [
        r#"meta[name="author"]"#,
        r#"meta[property="article:author"]"#,
    ] {
        if let Some(candidate) = meta_content(doc, selector) {
            if candidate.starts_with("http") {
                // A profile URL with no usable path segment yields no name;
                // the next tier gets a chance.
                if let Some(name) = name_from_author_url(&candidate) {
                    return Some(name);
                }
                continue;
            }
            return Some(candidate);
        }
    }

    element_text(doc, r#"a[rel="author"]"#)
}

/// Author metas sometimes carry a profile URL like
/// `https://ex.com/by/john-doe`; derive a name from the last path segment.
/// `None` when the URL is unparseable or its path is empty.
fn name_from_author_url(candidate: &str) -> Option<String> {
    let url = Url::parse(candidate).ok()?;
    let last = url
        .path()
        .trim_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or("");
    if last.is_empty() {
        None
    } else {
        Some(title_case_words(&last.replace('-', " ")))
    }
}

fn time_element(doc: &Html) -> Option<String> {
    let sel = Selector::parse("time").ok()?;
    let el = doc.select(&sel).next()?;
    let value = el
        .value()
        .attr("datetime")
        .map(str::to_string)
        .unwrap_or_else(|| el.text().collect::<Vec<_>>().join(" "));
    let value = value.trim().to_string();
    if value.is_empty() { None } else { Some(value) }
}

/// Readability-style main-content reduction, flattened to newline-joined
/// visible text. Falls back to flattening the whole document when the
/// reducer can't find a main block.
fn readable_body(url: &str, html: &str) -> String {
    let Ok(parsed) = Url::parse(url) else {
        return flatten_text(html);
    };
    let mut cursor = Cursor::new(html.as_bytes());
    match readability::extractor::extract(&mut cursor, &parsed) {
        Ok(product) => flatten_text(&product.content),
        Err(_) => flatten_text(html),
    }
}

/// Newline-join every non-empty, trimmed text node.
fn flatten_text(html: &str) -> String {
    let doc = Html::parse_document(html);
    doc.root_element()
        .text()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}
