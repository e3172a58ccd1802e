//! Declarative per-publication configuration and the publication registry.
//!
//! Each publication is described by one YAML file in the config directory:
//!
//! ```yaml
//! id: example-times
//! name: Example Times
//! frontpage_url: https://example.com
//! sources:
//!   - kind: feed
//!     feeds:
//!       - https://example.com/rss.xml
//!     per_feed_limit: 10
//! max_items: 15
//! headers:
//!   User-Agent: "frontpage-harvester/0.1"
//! mirror_base: null
//! amp_fallback: false
//! feed_only: false
//! feed_enrich: true
//! ```
//!
//! Source order in `sources` is priority order for discovery. Configuration
//! is immutable per run; it changes only by editing the file and restarting.

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;
use tracing::{debug, info};

use crate::error::HarvestError;

fn default_max_items() -> usize {
    15
}

fn default_true() -> bool {
    true
}

fn default_fetch_concurrency() -> usize {
    4
}

/// One discovery source within a publication, tagged by kind.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceConfig {
    /// Feed-based discovery: fetch each endpoint, take up to
    /// `per_feed_limit` entry links (0 = unlimited).
    Feed {
        #[serde(default)]
        feeds: Vec<String>,
        #[serde(default)]
        per_feed_limit: usize,
    },
    /// Page-scrape discovery. Extension point; yields no links yet.
    Page {
        #[serde(default)]
        url: Option<String>,
    },
}

/// Full declarative configuration for one publication.
#[derive(Debug, Clone, Deserialize)]
pub struct PublicationConfig {
    /// Stable external identifier; also the config file's base name.
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub frontpage_url: Option<String>,
    /// Ordered discovery sources; earlier sources win on rank.
    #[serde(default)]
    pub sources: Vec<SourceConfig>,
    /// Global cap on ranked links per run.
    #[serde(default = "default_max_items")]
    pub max_items: usize,
    /// Custom request headers for every feed and page fetch.
    #[serde(default)]
    pub headers: HashMap<String, String>,
    /// Mirror host prefix; the full article URL is appended verbatim.
    #[serde(default)]
    pub mirror_base: Option<String>,
    /// Try an AMP path transform (`/path` -> `/path/amp`) after the mirror.
    #[serde(default)]
    pub amp_fallback: bool,
    /// Headers for the AMP/mobile fallback request; falls back to `headers`.
    #[serde(default)]
    pub mobile_headers: HashMap<String, String>,
    /// Skip page fetching entirely and synthesize content from feed entries.
    #[serde(default)]
    pub feed_only: bool,
    /// Build the feed enrichment index to backstop missing extracted fields.
    #[serde(default = "default_true")]
    pub feed_enrich: bool,
    /// Bounded worker pool size for per-link processing.
    #[serde(default = "default_fetch_concurrency")]
    pub fetch_concurrency: usize,
}

impl PublicationConfig {
    /// All feed endpoints across this publication's feed sources, in order.
    pub fn feed_urls(&self) -> Vec<&str> {
        self.sources
            .iter()
            .flat_map(|s| match s {
                SourceConfig::Feed { feeds, .. } => feeds.iter().map(String::as_str).collect(),
                SourceConfig::Page { .. } => Vec::new(),
            })
            .collect()
    }
}

/// Load a single publication config file.
pub fn load_publication(path: &Path) -> Result<PublicationConfig, HarvestError> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| HarvestError::Config(format!("{}: {e}", path.display())))?;
    let cfg: PublicationConfig = serde_yaml::from_str(&text)
        .map_err(|e| HarvestError::Config(format!("{}: {e}", path.display())))?;
    debug!(id = %cfg.id, path = %path.display(), "Loaded publication config");
    Ok(cfg)
}

/// Load every `*.yaml`/`*.yml` publication config in a directory.
///
/// A non-empty `enabled` list narrows the result to the named publication
/// ids. Results are sorted by id so scheduling order is deterministic.
pub fn list_publications(
    config_dir: &Path,
    enabled: &[String],
) -> Result<Vec<PublicationConfig>, HarvestError> {
    let entries = std::fs::read_dir(config_dir)
        .map_err(|e| HarvestError::Config(format!("{}: {e}", config_dir.display())))?;

    let mut pubs = Vec::new();
    for entry in entries {
        let entry = entry.map_err(HarvestError::Io)?;
        let path = entry.path();
        let is_yaml = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e == "yaml" || e == "yml");
        if !is_yaml {
            continue;
        }
        let cfg = load_publication(&path)?;
        if enabled.is_empty() || enabled.iter().any(|id| id == &cfg.id) {
            pubs.push(cfg);
        }
    }
    pubs.sort_by(|a, b| a.id.cmp(&b.id));
    info!(count = pubs.len(), dir = %config_dir.display(), "Loaded publication registry");
    Ok(pubs)
}

/// Find one publication by id in the config directory.
pub fn get_publication(config_dir: &Path, id: &str) -> Result<PublicationConfig, HarvestError> {
    list_publications(config_dir, &[])?
        .into_iter()
        .find(|p| p.id == id)
        .ok_or_else(|| HarvestError::Config(format!("no config for publication {id}")))
}
