//! Feed fetching and parsing, shared by discovery and enrichment.
//!
//! Reduces `feed-rs` entries to the flat [`FeedEntry`] the rest of the
//! pipeline works with: the link, the entry id, and the metadata fields
//! used to synthesize or backstop extracted content.

use std::collections::HashMap;
use std::time::Duration;

use reqwest::Client;
use tracing::debug;

use crate::error::HarvestError;

/// Bounded timeout for a single feed fetch.
pub const FEED_TIMEOUT: Duration = Duration::from_secs(15);

/// One feed entry, flattened for lookup and enrichment.
#[derive(Debug, Clone)]
pub struct FeedEntry {
    /// The entry's article link, as it appeared in the feed.
    pub link: String,
    /// Entry id / guid.
    pub id: String,
    pub title: Option<String>,
    /// Author names joined with ", ".
    pub byline: Option<String>,
    /// Published (or updated) time as an RFC 3339 string.
    pub published: Option<String>,
    /// First media content, thumbnail, or image enclosure URL.
    pub image: Option<String>,
}

/// Fetch one feed endpoint and parse its entries.
///
/// Entries without a link are skipped; order is preserved.
pub async fn fetch_entries(
    client: &Client,
    feed_url: &str,
    headers: &HashMap<String, String>,
) -> Result<Vec<FeedEntry>, HarvestError> {
    let mut request = client.get(feed_url).timeout(FEED_TIMEOUT);
    for (name, value) in headers {
        request = request.header(name, value);
    }

    let response = request.send().await?;
    if !response.status().is_success() {
        return Err(HarvestError::Feed(format!(
            "{feed_url} returned {}",
            response.status()
        )));
    }

    let bytes = response.bytes().await?;
    let feed = feed_rs::parser::parse(&bytes[..])
        .map_err(|e| HarvestError::Feed(format!("{feed_url}: {e}")))?;

    let entries: Vec<FeedEntry> = feed.entries.into_iter().filter_map(flatten_entry).collect();
    debug!(feed = %feed_url, count = entries.len(), "Parsed feed entries");
    Ok(entries)
}

fn flatten_entry(entry: feed_rs::model::Entry) -> Option<FeedEntry> {
    let link = entry.links.first().map(|l| l.href.clone())?;

    let byline = {
        let names: Vec<String> = entry
            .authors
            .iter()
            .map(|a| a.name.trim().to_string())
            .filter(|n| !n.is_empty())
            .collect();
        if names.is_empty() { None } else { Some(names.join(", ")) }
    };

    let published = entry
        .published
        .or(entry.updated)
        .map(|t| t.to_rfc3339());

    let image = entry.media.iter().find_map(|media| {
        media
            .content
            .iter()
            .find_map(|c| c.url.as_ref().map(|u| u.to_string()))
            .or_else(|| media.thumbnails.first().map(|t| t.image.uri.clone()))
    });

    Some(FeedEntry {
        link,
        id: entry.id,
        title: entry.title.map(|t| t.content),
        byline,
        published,
        image,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    const RSS_SAMPLE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0" xmlns:media="http://search.yahoo.com/mrss/">
  <channel>
    <title>Example Times</title>
    <link>https://example.com</link>
    <item>
      <title>First story</title>
      <link>https://example.com/story-one</link>
      <guid>tag:example.com,2026:one</guid>
      <author>jane@example.com (Jane Doe)</author>
      <pubDate>Mon, 24 Aug 2026 08:00:00 GMT</pubDate>
      <media:thumbnail url="https://cdn.example.com/one.jpg"/>
    </item>
    <item>
      <title>Second story</title>
      <link>https://example.com/story-two?utm_source=rss</link>
      <guid>tag:example.com,2026:two</guid>
    </item>
    <item>
      <title>No link here</title>
      <guid>tag:example.com,2026:three</guid>
    </item>
  </channel>
</rss>"#;

    #[tokio::test]
    async fn test_fetch_entries_flattens_fields() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/rss.xml");
                then.status(200)
                    .header("content-type", "application/rss+xml")
                    .body(RSS_SAMPLE);
            })
            .await;

        let client = Client::new();
        let entries = fetch_entries(&client, &server.url("/rss.xml"), &HashMap::new())
            .await
            .unwrap();

        // entry without a link is dropped, order preserved
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].link, "https://example.com/story-one");
        assert_eq!(entries[0].title.as_deref(), Some("First story"));
        assert_eq!(
            entries[0].image.as_deref(),
            Some("https://cdn.example.com/one.jpg")
        );
        assert!(entries[0].published.is_some());
        assert_eq!(
            entries[1].link,
            "https://example.com/story-two?utm_source=rss"
        );
    }

    #[tokio::test]
    async fn test_non_success_status_is_an_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/rss.xml");
                then.status(503);
            })
            .await;

        let client = Client::new();
        let err = fetch_entries(&client, &server.url("/rss.xml"), &HashMap::new())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("503"));
    }
}
