//! Feed enrichment index.
//!
//! Built once per run from every entry across the publication's configured
//! feeds. Each entry is inserted under several synonym keys — the raw link,
//! the canonical link, the entry id, and a scheme+host+path base with the
//! host lowercased — with first-writer-wins per key, so earlier feeds keep
//! precedence deterministically.
//!
//! Used both as the sole content source for feed-only publications and as a
//! gap-filler when page extraction comes up short.

use std::collections::HashMap;

use reqwest::Client;
use tracing::{debug, warn};
use url::Url;

use crate::config::PublicationConfig;
use crate::harvest::canonical::canonicalize_url;
use crate::harvest::feeds::{self, FeedEntry};

/// Multi-key lookup from feed entries.
#[derive(Debug, Default)]
pub struct FeedIndex {
    map: HashMap<String, FeedEntry>,
}

/// Scheme + lowercased host + path, tolerating case and query-string drift.
fn normalized_base(raw: &str) -> Option<String> {
    let url = Url::parse(raw).ok()?;
    let host = url.host_str()?.to_lowercase();
    Some(format!("{}://{}{}", url.scheme(), host, url.path()))
}

impl FeedIndex {
    /// An index with no entries; every lookup misses.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Fetch every configured feed and index its entries. Per-feed failures
    /// are logged and skipped; enrichment degrades rather than failing the
    /// run.
    pub async fn build(client: &Client, cfg: &PublicationConfig) -> Self {
        let mut index = Self::default();
        for feed_url in cfg.feed_urls() {
            match feeds::fetch_entries(client, feed_url, &cfg.headers).await {
                Ok(entries) => {
                    for entry in entries {
                        index.insert(entry);
                    }
                }
                Err(e) => {
                    warn!(publication = %cfg.id, feed = %feed_url, error = %e,
                        "Skipping feed for enrichment index");
                }
            }
        }
        debug!(publication = %cfg.id, keys = index.map.len(), "Built feed enrichment index");
        index
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Insert one entry under all of its synonym keys, never overwriting an
    /// existing key.
    pub fn insert(&mut self, entry: FeedEntry) {
        let mut keys = vec![entry.link.clone(), canonicalize_url(&entry.link)];
        if !entry.id.is_empty() {
            keys.push(entry.id.clone());
        }
        if let Some(base) = normalized_base(&entry.link) {
            keys.push(base);
        }
        for key in keys {
            self.map.entry(key).or_insert_with(|| entry.clone());
        }
    }

    /// Look up a target URL: exact raw match, then canonical form, then
    /// normalized base. Returns the first hit.
    pub fn lookup(&self, url: &str) -> Option<&FeedEntry> {
        if let Some(entry) = self.map.get(url) {
            return Some(entry);
        }
        if let Some(entry) = self.map.get(&canonicalize_url(url)) {
            return Some(entry);
        }
        normalized_base(url).and_then(|base| self.map.get(&base))
    }
}
