//! Conditional page fetching with a tiered fallback ladder.
//!
//! Given a canonical URL and the article's last known cache validators,
//! retrieval proceeds in order:
//!
//! 1. Feed-only publications skip HTTP entirely and synthesize from the
//!    feed enrichment index (a miss is unprocessable for this run, not an
//!    error, and is not retried within the run)
//! 2. A conditional GET carrying `If-None-Match`/`If-Modified-Since` when
//!    validators exist; a 304 short-circuits with no change
//! 3. On error status or transport failure, a configured mirror rewrite,
//!    then an AMP path transform, in that fixed order; the first fallback
//!    with a success status and a non-empty body wins
//!
//! Validators for the next run are persisted by the orchestrator after
//! successful extraction, never here.

use std::collections::HashMap;
use std::time::Duration;

use reqwest::header::{ETAG, IF_MODIFIED_SINCE, IF_NONE_MATCH, LAST_MODIFIED};
use reqwest::{Client, Response, StatusCode};
use tracing::{debug, warn};

use crate::config::PublicationConfig;
use crate::harvest::enrich::FeedIndex;
use crate::harvest::feeds::FeedEntry;
use url::Url;

/// Bounded timeout for a single page fetch.
pub const PAGE_TIMEOUT: Duration = Duration::from_secs(30);

/// The result of attempting to retrieve one link's content.
#[derive(Debug)]
pub enum FetchOutcome {
    /// Origin reported no change since the stored validators.
    NotModified,
    /// Fresh HTML with the validators that came with it.
    Page {
        html: String,
        etag: Option<String>,
        last_modified: Option<String>,
    },
    /// Feed-only publication: content synthesized from this feed entry.
    FeedOnly(FeedEntry),
    /// Feed-only publication with no matching feed entry; unprocessable
    /// this run.
    Unavailable,
    /// Every fetch and fallback attempt exhausted.
    Failed,
}

/// Retrieve one canonical URL per the publication's fetch configuration.
pub async fn fetch_page(
    client: &Client,
    cfg: &PublicationConfig,
    index: &FeedIndex,
    url: &str,
    etag: Option<&str>,
    last_modified: Option<&str>,
) -> FetchOutcome {
    if cfg.feed_only {
        return match index.lookup(url) {
            Some(entry) => FetchOutcome::FeedOnly(entry.clone()),
            None => FetchOutcome::Unavailable,
        };
    }

    match conditional_get(client, &cfg.headers, url, etag, last_modified).await {
        Ok(response) if response.status() == StatusCode::NOT_MODIFIED => {
            debug!(%url, "Origin reports not modified");
            return FetchOutcome::NotModified;
        }
        Ok(response) if response.status().is_success() => {
            if let Some(outcome) = page_outcome(response, false).await {
                return outcome;
            }
        }
        Ok(response) => {
            warn!(%url, status = %response.status(), "Origin fetch failed; trying fallbacks");
        }
        Err(e) => {
            warn!(%url, error = %e, "Origin fetch failed; trying fallbacks");
        }
    }

    if let Some(base) = &cfg.mirror_base {
        let mirror = mirror_url(base, url);
        if let Some(outcome) = try_fallback(client, &cfg.headers, &mirror).await {
            debug!(%url, %mirror, "Mirror fallback succeeded");
            return outcome;
        }
    }

    if cfg.amp_fallback {
        if let Some(amp) = amp_url(url) {
            let headers = if cfg.mobile_headers.is_empty() {
                &cfg.headers
            } else {
                &cfg.mobile_headers
            };
            if let Some(outcome) = try_fallback(client, headers, &amp).await {
                debug!(%url, %amp, "AMP fallback succeeded");
                return outcome;
            }
        }
    }

    warn!(%url, "All fetch attempts exhausted");
    FetchOutcome::Failed
}

/// Rewrite a URL onto the configured mirror host: the full original URL is
/// appended to the mirror base verbatim.
pub fn mirror_url(mirror_base: &str, url: &str) -> String {
    format!("{mirror_base}{url}")
}

/// AMP/mobile transform: append `/amp` to the (slash-trimmed) path, keeping
/// the query string.
pub fn amp_url(url: &str) -> Option<String> {
    let mut parsed = Url::parse(url).ok()?;
    let path = format!("{}/amp", parsed.path().trim_end_matches('/'));
    parsed.set_path(&path);
    Some(parsed.to_string())
}

async fn conditional_get(
    client: &Client,
    headers: &HashMap<String, String>,
    url: &str,
    etag: Option<&str>,
    last_modified: Option<&str>,
) -> reqwest::Result<Response> {
    let mut request = client.get(url).timeout(PAGE_TIMEOUT);
    for (name, value) in headers {
        request = request.header(name, value);
    }
    if let Some(etag) = etag {
        request = request.header(IF_NONE_MATCH, etag);
    }
    if let Some(last_modified) = last_modified {
        request = request.header(IF_MODIFIED_SINCE, last_modified);
    }
    request.send().await
}

/// One unconditional GET against a fallback URL; `Some` only for a success
/// status with a non-empty body.
async fn try_fallback(
    client: &Client,
    headers: &HashMap<String, String>,
    url: &str,
) -> Option<FetchOutcome> {
    let mut request = client.get(url).timeout(PAGE_TIMEOUT);
    for (name, value) in headers {
        request = request.header(name, value);
    }
    match request.send().await {
        Ok(response) if response.status().is_success() => page_outcome(response, true).await,
        Ok(response) => {
            debug!(%url, status = %response.status(), "Fallback fetch failed");
            None
        }
        Err(e) => {
            debug!(%url, error = %e, "Fallback fetch failed");
            None
        }
    }
}

async fn page_outcome(response: Response, require_body: bool) -> Option<FetchOutcome> {
    let etag = header_string(&response, ETAG);
    let last_modified = header_string(&response, LAST_MODIFIED);
    let html = response.text().await.ok()?;
    if require_body && html.is_empty() {
        return None;
    }
    Some(FetchOutcome::Page {
        html,
        etag,
        last_modified,
    })
}

fn header_string(response: &Response, name: reqwest::header::HeaderName) -> Option<String> {
    response
        .headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(String::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    fn config(extra: &str) -> PublicationConfig {
        serde_yaml::from_str(&format!("id: p\nname: P\n{extra}")).unwrap()
    }

    #[test]
    fn test_amp_url_transform() {
        assert_eq!(
            amp_url("https://ex.com/story/").as_deref(),
            Some("https://ex.com/story/amp")
        );
        assert_eq!(
            amp_url("https://ex.com/story?x=1").as_deref(),
            Some("https://ex.com/story/amp?x=1")
        );
        assert!(amp_url("not a url").is_none());
    }

    #[test]
    fn test_mirror_url_appends_full_url() {
        assert_eq!(
            mirror_url("https://mirror.net/", "https://ex.com/a"),
            "https://mirror.net/https://ex.com/a"
        );
    }

    #[tokio::test]
    async fn test_not_modified_short_circuits() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/story")
                    .header("if-none-match", "\"v1\"");
                then.status(304);
            })
            .await;

        let cfg = config("");
        let outcome = fetch_page(
            &Client::new(),
            &cfg,
            &FeedIndex::empty(),
            &server.url("/story"),
            Some("\"v1\""),
            None,
        )
        .await;
        assert!(matches!(outcome, FetchOutcome::NotModified));
    }

    #[tokio::test]
    async fn test_success_returns_body_and_validators() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/story");
                then.status(200)
                    .header("etag", "\"v2\"")
                    .header("last-modified", "Mon, 24 Aug 2026 08:00:00 GMT")
                    .body("<html>fresh</html>");
            })
            .await;

        let cfg = config("");
        let outcome = fetch_page(
            &Client::new(),
            &cfg,
            &FeedIndex::empty(),
            &server.url("/story"),
            None,
            None,
        )
        .await;

        match outcome {
            FetchOutcome::Page {
                html,
                etag,
                last_modified,
            } => {
                assert_eq!(html, "<html>fresh</html>");
                assert_eq!(etag.as_deref(), Some("\"v2\""));
                assert!(last_modified.is_some());
            }
            other => panic!("expected page, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_mirror_fallback_on_server_error() {
        let server = MockServer::start_async().await;
        let origin = server.url("/story");
        server
            .mock_async(|when, then| {
                when.method(GET).path("/story");
                then.status(500);
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path(format!("/m/{origin}"));
                then.status(200).body("<html>mirror</html>");
            })
            .await;

        let cfg = config(&format!("mirror_base: \"{}\"\n", server.url("/m/")));
        let outcome = fetch_page(
            &Client::new(),
            &cfg,
            &FeedIndex::empty(),
            &origin,
            None,
            None,
        )
        .await;

        match outcome {
            FetchOutcome::Page { html, .. } => assert_eq!(html, "<html>mirror</html>"),
            other => panic!("expected mirror page, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_amp_fallback_after_empty_mirror() {
        let server = MockServer::start_async().await;
        let origin = server.url("/story");
        server
            .mock_async(|when, then| {
                when.method(GET).path("/story");
                then.status(503);
            })
            .await;
        // mirror answers 200 but with an empty body, so it must be skipped
        server
            .mock_async(|when, then| {
                when.method(GET).path(format!("/m/{origin}"));
                then.status(200).body("");
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/story/amp");
                then.status(200).body("<html>amp</html>");
            })
            .await;

        let cfg = config(&format!(
            "mirror_base: \"{}\"\namp_fallback: true\n",
            server.url("/m/")
        ));
        let outcome = fetch_page(
            &Client::new(),
            &cfg,
            &FeedIndex::empty(),
            &origin,
            None,
            None,
        )
        .await;

        match outcome {
            FetchOutcome::Page { html, .. } => assert_eq!(html, "<html>amp</html>"),
            other => panic!("expected amp page, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_exhausted_fallbacks_fail_definitively() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.any_request();
                then.status(500);
            })
            .await;

        let cfg = config(&format!(
            "mirror_base: \"{}\"\namp_fallback: true\n",
            server.url("/m/")
        ));
        let outcome = fetch_page(
            &Client::new(),
            &cfg,
            &FeedIndex::empty(),
            &server.url("/story"),
            None,
            None,
        )
        .await;
        assert!(matches!(outcome, FetchOutcome::Failed));
    }

    #[tokio::test]
    async fn test_feed_only_lookup_hit_and_miss() {
        let mut index = FeedIndex::empty();
        index.insert(FeedEntry {
            link: "https://ex.com/known".to_string(),
            id: "guid".to_string(),
            title: Some("Known".to_string()),
            byline: None,
            published: None,
            image: None,
        });

        let cfg = config("feed_only: true\n");
        let client = Client::new();

        let hit = fetch_page(&client, &cfg, &index, "https://ex.com/known", None, None).await;
        assert!(matches!(hit, FetchOutcome::FeedOnly(_)));

        let miss = fetch_page(&client, &cfg, &index, "https://ex.com/other", None, None).await;
        assert!(matches!(miss, FetchOutcome::Unavailable));
    }
}
