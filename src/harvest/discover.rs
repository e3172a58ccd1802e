//! Front-page link discovery.
//!
//! Merges candidate article URLs from a publication's ordered sources into
//! a ranked, deduplicated, capped list of canonical URLs. Order is priority
//! among source kinds, then the order links appeared within a source.
//!
//! Per-source failures are swallowed — a dead feed contributes zero links
//! and discovery degrades gracefully rather than failing the whole run.

use std::collections::HashSet;

use reqwest::Client;
use tracing::{info, warn};

use crate::config::{PublicationConfig, SourceConfig};
use crate::harvest::canonical::canonicalize_url;
use crate::harvest::feeds;

/// Produce the ranked link list for one run.
///
/// Never returns more than `cfg.max_items` URLs and never returns duplicate
/// canonical URLs.
pub async fn discover_links(client: &Client, cfg: &PublicationConfig) -> Vec<String> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut out: Vec<String> = Vec::new();

    'sources: for source in &cfg.sources {
        let batch = match source {
            SourceConfig::Feed {
                feeds,
                per_feed_limit,
            } => from_feeds(client, cfg, feeds, *per_feed_limit).await,
            // Page-scrape discovery is an extension point; selectors could
            // be added to the config later.
            SourceConfig::Page { .. } => Vec::new(),
        };

        for link in batch {
            if out.len() >= cfg.max_items {
                break 'sources;
            }
            let canonical = canonicalize_url(&link);
            if seen.insert(canonical.clone()) {
                out.push(canonical);
            }
        }
    }

    info!(publication = %cfg.id, count = out.len(), "Discovered front-page links");
    out
}

/// Collect entry links from each feed endpoint, up to `per_feed_limit`
/// per feed (0 = unlimited). A failing feed yields nothing.
async fn from_feeds(
    client: &Client,
    cfg: &PublicationConfig,
    feed_urls: &[String],
    per_feed_limit: usize,
) -> Vec<String> {
    let mut links = Vec::new();
    for feed_url in feed_urls {
        let entries = match feeds::fetch_entries(client, feed_url, &cfg.headers).await {
            Ok(entries) => entries,
            Err(e) => {
                warn!(publication = %cfg.id, feed = %feed_url, error = %e,
                    "Feed discovery failed; treating as empty");
                continue;
            }
        };
        let mut count = 0;
        for entry in entries {
            links.push(entry.link);
            count += 1;
            if per_feed_limit > 0 && count >= per_feed_limit {
                break;
            }
        }
    }
    links
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    fn rss(items: &[(&str, &str)]) -> String {
        let body: String = items
            .iter()
            .map(|(title, link)| {
                format!("<item><title>{title}</title><link>{link}</link></item>")
            })
            .collect();
        format!(
            r#"<?xml version="1.0"?><rss version="2.0"><channel><title>t</title>{body}</channel></rss>"#
        )
    }

    fn config_with_feeds(yaml_sources: &str) -> PublicationConfig {
        serde_yaml::from_str(&format!("id: p\nname: P\n{yaml_sources}")).unwrap()
    }

    #[tokio::test]
    async fn test_dedup_cap_and_order() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/a.xml");
                then.status(200).body(rss(&[
                    ("one", "https://ex.com/1?utm_source=x"),
                    ("one again", "https://ex.com/1"),
                    ("two", "https://ex.com/2"),
                    ("three", "https://ex.com/3"),
                ]));
            })
            .await;

        let cfg = config_with_feeds(&format!(
            "max_items: 3\nsources:\n  - kind: feed\n    feeds: [\"{}\"]\n",
            server.url("/a.xml")
        ));
        let links = discover_links(&Client::new(), &cfg).await;

        assert_eq!(
            links,
            vec![
                "https://ex.com/1".to_string(),
                "https://ex.com/2".to_string(),
                "https://ex.com/3".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_per_feed_limit_and_source_priority() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/a.xml");
                then.status(200).body(rss(&[
                    ("a1", "https://ex.com/a1"),
                    ("a2", "https://ex.com/a2"),
                    ("a3", "https://ex.com/a3"),
                ]));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/b.xml");
                then.status(200).body(rss(&[("b1", "https://ex.com/b1")]));
            })
            .await;

        let cfg = config_with_feeds(&format!(
            "sources:\n  - kind: feed\n    feeds: [\"{}\"]\n    per_feed_limit: 2\n  - kind: feed\n    feeds: [\"{}\"]\n",
            server.url("/a.xml"),
            server.url("/b.xml")
        ));
        let links = discover_links(&Client::new(), &cfg).await;

        assert_eq!(
            links,
            vec![
                "https://ex.com/a1".to_string(),
                "https://ex.com/a2".to_string(),
                "https://ex.com/b1".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_zero_max_items_yields_no_links() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/a.xml");
                then.status(200).body(rss(&[("one", "https://ex.com/1")]));
            })
            .await;

        let cfg = config_with_feeds(&format!(
            "max_items: 0\nsources:\n  - kind: feed\n    feeds: [\"{}\"]\n",
            server.url("/a.xml")
        ));
        let links = discover_links(&Client::new(), &cfg).await;
        assert!(links.is_empty());
    }

    #[tokio::test]
    async fn test_dead_feed_degrades_to_empty() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/dead.xml");
                then.status(500);
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/ok.xml");
                then.status(200).body(rss(&[("x", "https://ex.com/x")]));
            })
            .await;

        let cfg = config_with_feeds(&format!(
            "sources:\n  - kind: feed\n    feeds: [\"{}\", \"{}\"]\n",
            server.url("/dead.xml"),
            server.url("/ok.xml")
        ));
        let links = discover_links(&Client::new(), &cfg).await;
        assert_eq!(links, vec!["https://ex.com/x".to_string()]);
    }

    #[tokio::test]
    async fn test_page_source_is_an_empty_extension_point() {
        let cfg = config_with_feeds("sources:\n  - kind: page\n");
        let links = discover_links(&Client::new(), &cfg).await;
        assert!(links.is_empty());
    }
}
