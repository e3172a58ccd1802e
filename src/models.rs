//! Data models for publications, harvest runs, and tracked articles.
//!
//! This module defines the persistent records produced by the pipeline:
//! - [`Publication`]: A configured news source, registered once from config
//! - [`HarvestRun`]: One execution of the pipeline for one publication
//! - [`RunItem`]: Per-link outcome within a run, in discovery rank order
//! - [`Article`]: The durable identity of a tracked piece of content,
//!   unique per (publication, canonical URL)
//! - [`Snapshot`]: An immutable captured version of an article's extracted
//!   content at one fetch
//!
//! All rows map one-to-one onto the SQLite tables created by
//! [`crate::store::Store::init_schema`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Terminal run states; a run starts as [`RunStatus::RUNNING`] and moves to
/// exactly one of `ok` or `error`.
pub struct RunStatus;

impl RunStatus {
    pub const RUNNING: &'static str = "running";
    pub const OK: &'static str = "ok";
    pub const ERROR: &'static str = "error";
}

/// A configured news publication.
///
/// The row is ensured (insert-if-absent) from the publication's YAML config
/// at the start of each run; configuration itself lives in the config file,
/// not the database, and is immutable per run.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Publication {
    pub id: i64,
    /// Stable external identifier, matching the config file's `id`.
    pub external_id: String,
    pub name: String,
    pub frontpage_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// One scheduled or manual invocation of the harvest pipeline.
///
/// Terminal once `status != running`. Counts cover the ranked links of this
/// run: `links_found` is set right after discovery, `links_new` and
/// `links_updated` accumulate as links are processed.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct HarvestRun {
    pub id: i64,
    pub publication_id: i64,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub status: String,
    pub links_found: i64,
    pub links_new: i64,
    pub links_updated: i64,
    /// Captured error payload (JSON) when `status = error`.
    pub error_json: Option<String>,
}

/// Per-link outcome record within a run. Immutable after creation.
///
/// `rank` is 1-based and matches discovery order, assigned before dispatch
/// so concurrent completion never reorders it.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct RunItem {
    pub id: i64,
    pub run_id: i64,
    pub rank: i64,
    pub url: String,
    pub is_new: bool,
    pub is_updated: bool,
}

/// The durable identity of a tracked piece of content.
///
/// Upserted every time its canonical URL reappears in a run; never deleted.
/// Carries the latest known metadata, a pointer to the most recent
/// [`Snapshot`], the last body-content hash for change detection, and the
/// cache validators used for conditional fetching.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Article {
    pub id: i64,
    pub publication_id: i64,
    pub url_canonical: String,
    pub title: String,
    pub byline: String,
    pub published_time: Option<String>,
    pub first_seen_at: DateTime<Utc>,
    /// Last successful processing; None until the first snapshot lands.
    pub last_seen_at: Option<DateTime<Utc>>,
    pub last_snapshot_id: Option<i64>,
    pub last_body_hash: Option<String>,
    pub last_etag: Option<String>,
    pub last_modified: Option<String>,
    /// Like/dislike counters owned by the read side; created at zero here.
    pub votes_up: i64,
    pub votes_down: i64,
}

/// An immutable, append-only version of an article's extracted content.
///
/// A snapshot is created on every successful extraction, whether or not the
/// content changed; "changed" is judged separately by comparing `body_hash`
/// against the article's previous hash.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Snapshot {
    pub id: i64,
    pub article_id: i64,
    pub fetched_at: DateTime<Utc>,
    pub title: String,
    pub byline: String,
    pub published_time: Option<String>,
    pub body_text: String,
    pub body_hash: String,
    /// Blob-store reference to the archived raw HTML; None when archival
    /// failed (archival failure never fails the snapshot).
    pub raw_html_ref: Option<String>,
    pub og_image_url: Option<String>,
    pub tag: String,
}
