//! SQLite persistence for publications, runs, articles, and snapshots.
//!
//! The store is an explicitly constructed handle passed down to the
//! orchestrator (no ambient global state). The schema is ensured on every
//! boot; all writes for one link's processing — article upsert, snapshot
//! insert, run-item insert — commit in a single transaction via
//! [`Store::commit_link`], so a failure partway through one link never
//! corrupts another link's state.

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use tracing::{debug, info};

use crate::config::PublicationConfig;
use crate::error::HarvestError;
use crate::harvest::snapshot::LinkFlags;
use crate::models::{Article, HarvestRun, Publication, RunItem, RunStatus, Snapshot};

/// Safe to run on every boot.
const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS publication (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  external_id TEXT NOT NULL UNIQUE,
  name TEXT NOT NULL,
  frontpage_url TEXT,
  created_at TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS harvest_run (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  publication_id INTEGER NOT NULL REFERENCES publication(id),
  started_at TEXT NOT NULL,
  finished_at TEXT,
  status TEXT NOT NULL DEFAULT 'running',
  links_found INTEGER NOT NULL DEFAULT 0,
  links_new INTEGER NOT NULL DEFAULT 0,
  links_updated INTEGER NOT NULL DEFAULT 0,
  error_json TEXT
);
CREATE TABLE IF NOT EXISTS run_item (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  run_id INTEGER NOT NULL REFERENCES harvest_run(id),
  rank INTEGER NOT NULL,
  url TEXT NOT NULL,
  is_new INTEGER NOT NULL DEFAULT 0,
  is_updated INTEGER NOT NULL DEFAULT 0,
  UNIQUE (run_id, rank)
);
CREATE TABLE IF NOT EXISTS article (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  publication_id INTEGER NOT NULL REFERENCES publication(id),
  url_canonical TEXT NOT NULL,
  title TEXT NOT NULL DEFAULT '',
  byline TEXT NOT NULL DEFAULT '',
  published_time TEXT,
  first_seen_at TEXT NOT NULL,
  last_seen_at TEXT,
  last_snapshot_id INTEGER,
  last_body_hash TEXT,
  last_etag TEXT,
  last_modified TEXT,
  votes_up INTEGER NOT NULL DEFAULT 0,
  votes_down INTEGER NOT NULL DEFAULT 0,
  UNIQUE (publication_id, url_canonical)
);
CREATE TABLE IF NOT EXISTS article_snapshot (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  article_id INTEGER NOT NULL REFERENCES article(id),
  fetched_at TEXT NOT NULL,
  title TEXT NOT NULL DEFAULT '',
  byline TEXT NOT NULL DEFAULT '',
  published_time TEXT,
  body_text TEXT NOT NULL DEFAULT '',
  body_hash TEXT NOT NULL,
  raw_html_ref TEXT,
  og_image_url TEXT,
  tag TEXT NOT NULL DEFAULT 'Politics'
);
CREATE INDEX IF NOT EXISTS idx_snapshot_article ON article_snapshot (article_id, fetched_at);
CREATE INDEX IF NOT EXISTS idx_run_publication ON harvest_run (publication_id, started_at);
"#;

/// Fields for inserting a new snapshot within a link's transaction.
#[derive(Debug, Clone)]
pub struct NewSnapshot {
    pub title: String,
    pub byline: String,
    pub published_time: Option<String>,
    pub body_text: String,
    pub body_hash: String,
    pub raw_html_ref: Option<String>,
    pub og_image_url: Option<String>,
    pub tag: String,
}

/// Handle to the SQLite store. Cheap to clone; shares one pool.
#[derive(Debug, Clone)]
pub struct Store {
    pool: SqlitePool,
}

impl Store {
    /// Open (creating if missing) the database file and its parent
    /// directory, in WAL mode with a busy timeout for concurrent writers.
    pub async fn connect(db_path: &str) -> Result<Self, HarvestError> {
        if let Some(parent) = Path::new(db_path).parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let options = SqliteConnectOptions::from_str(&format!("sqlite://{db_path}"))
            .map_err(HarvestError::Database)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;
        info!(path = %db_path, "Connected to SQLite store");
        Ok(Self { pool })
    }

    /// Ensure all tables and indexes exist.
    pub async fn init_schema(&self) -> Result<(), HarvestError> {
        sqlx::raw_sql(SCHEMA).execute(&self.pool).await?;
        Ok(())
    }

    /// Insert-if-absent the publication row for a config, returning the row.
    pub async fn ensure_publication(
        &self,
        cfg: &PublicationConfig,
    ) -> Result<Publication, HarvestError> {
        if let Some(existing) = sqlx::query_as::<_, Publication>(
            "SELECT * FROM publication WHERE external_id = ?",
        )
        .bind(&cfg.id)
        .fetch_optional(&self.pool)
        .await?
        {
            return Ok(existing);
        }

        let row = sqlx::query_as::<_, Publication>(
            r#"
            INSERT INTO publication (external_id, name, frontpage_url, created_at)
            VALUES (?, ?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(&cfg.id)
        .bind(&cfg.name)
        .bind(&cfg.frontpage_url)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;
        info!(publication = %cfg.id, id = row.id, "Registered publication");
        Ok(row)
    }

    /// Create a new run in `running` state, returning its id.
    pub async fn create_run(&self, publication_id: i64) -> Result<i64, HarvestError> {
        let id = sqlx::query_scalar::<_, i64>(
            "INSERT INTO harvest_run (publication_id, started_at, status) VALUES (?, ?, ?) RETURNING id",
        )
        .bind(publication_id)
        .bind(Utc::now())
        .bind(RunStatus::RUNNING)
        .fetch_one(&self.pool)
        .await?;
        Ok(id)
    }

    /// Record how many ranked links discovery produced for a run.
    pub async fn set_links_found(&self, run_id: i64, n: i64) -> Result<(), HarvestError> {
        sqlx::query("UPDATE harvest_run SET links_found = ? WHERE id = ?")
            .bind(n)
            .bind(run_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Mark a run `ok` with its final counts.
    pub async fn finish_run_ok(
        &self,
        run_id: i64,
        links_new: i64,
        links_updated: i64,
    ) -> Result<(), HarvestError> {
        sqlx::query(
            "UPDATE harvest_run SET status = ?, links_new = ?, links_updated = ?, finished_at = ? WHERE id = ?",
        )
        .bind(RunStatus::OK)
        .bind(links_new)
        .bind(links_updated)
        .bind(Utc::now())
        .bind(run_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Mark a run `error` with a captured payload. Run items already
    /// written stand.
    pub async fn finish_run_error(
        &self,
        run_id: i64,
        payload: serde_json::Value,
    ) -> Result<(), HarvestError> {
        sqlx::query(
            "UPDATE harvest_run SET status = ?, error_json = ?, finished_at = ? WHERE id = ?",
        )
        .bind(RunStatus::ERROR)
        .bind(payload.to_string())
        .bind(Utc::now())
        .bind(run_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Look up an article by its identity key, if it has been seen before.
    pub async fn article_by_url(
        &self,
        publication_id: i64,
        url_canonical: &str,
    ) -> Result<Option<Article>, HarvestError> {
        let row = sqlx::query_as::<_, Article>(
            "SELECT * FROM article WHERE publication_id = ? AND url_canonical = ?",
        )
        .bind(publication_id)
        .bind(url_canonical)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    /// Record a run item with neither flag set: the "no outcome" row for
    /// not-modified, unprocessable, and failed links.
    pub async fn record_item(
        &self,
        run_id: i64,
        rank: i64,
        url: &str,
    ) -> Result<(), HarvestError> {
        sqlx::query("INSERT INTO run_item (run_id, rank, url, is_new, is_updated) VALUES (?, ?, ?, 0, 0)")
            .bind(run_id)
            .bind(rank)
            .bind(url)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Commit one link's processing as a unit of work.
    ///
    /// Begins a transaction, reads (or creates) the article, inserts the
    /// snapshot, updates the article's latest-known state and validator
    /// fields, and inserts the run item — then commits. `validators` of
    /// `None` leaves the stored `etag`/`last_modified` untouched (feed-only
    /// processing has no HTTP response to take them from).
    pub async fn commit_link(
        &self,
        publication_id: i64,
        run_id: i64,
        rank: i64,
        url_canonical: &str,
        snap: NewSnapshot,
        validators: Option<(Option<String>, Option<String>)>,
    ) -> Result<LinkFlags, HarvestError> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let existing = sqlx::query_as::<_, Article>(
            "SELECT * FROM article WHERE publication_id = ? AND url_canonical = ?",
        )
        .bind(publication_id)
        .bind(url_canonical)
        .fetch_optional(&mut *tx)
        .await?;

        let (article_id, had_snapshot, prior_hash, prior_title, prior_byline) = match existing {
            Some(a) => (
                a.id,
                a.last_snapshot_id.is_some(),
                a.last_body_hash,
                a.title,
                a.byline,
            ),
            None => {
                let id = sqlx::query_scalar::<_, i64>(
                    "INSERT INTO article (publication_id, url_canonical, first_seen_at) VALUES (?, ?, ?) RETURNING id",
                )
                .bind(publication_id)
                .bind(url_canonical)
                .bind(now)
                .fetch_one(&mut *tx)
                .await?;
                (id, false, None, String::new(), String::new())
            }
        };

        // Carry prior metadata forward when this extraction came up empty.
        let title = if snap.title.is_empty() { prior_title } else { snap.title };
        let byline = if snap.byline.is_empty() { prior_byline } else { snap.byline };

        let flags = LinkFlags::classify(had_snapshot, prior_hash.as_deref(), &snap.body_hash);

        let snapshot_id = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO article_snapshot
                (article_id, fetched_at, title, byline, published_time,
                 body_text, body_hash, raw_html_ref, og_image_url, tag)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING id
            "#,
        )
        .bind(article_id)
        .bind(now)
        .bind(&title)
        .bind(&byline)
        .bind(&snap.published_time)
        .bind(&snap.body_text)
        .bind(&snap.body_hash)
        .bind(&snap.raw_html_ref)
        .bind(&snap.og_image_url)
        .bind(&snap.tag)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            UPDATE article
            SET title = ?, byline = ?, published_time = ?,
                last_snapshot_id = ?, last_body_hash = ?, last_seen_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&title)
        .bind(&byline)
        .bind(&snap.published_time)
        .bind(snapshot_id)
        .bind(&snap.body_hash)
        .bind(now)
        .bind(article_id)
        .execute(&mut *tx)
        .await?;

        if let Some((etag, last_modified)) = validators {
            sqlx::query("UPDATE article SET last_etag = ?, last_modified = ? WHERE id = ?")
                .bind(&etag)
                .bind(&last_modified)
                .bind(article_id)
                .execute(&mut *tx)
                .await?;
        }

        sqlx::query("INSERT INTO run_item (run_id, rank, url, is_new, is_updated) VALUES (?, ?, ?, ?, ?)")
            .bind(run_id)
            .bind(rank)
            .bind(url_canonical)
            .bind(flags.is_new)
            .bind(flags.is_updated)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        debug!(
            article_id,
            snapshot_id,
            is_new = flags.is_new,
            is_updated = flags.is_updated,
            "Committed link"
        );
        Ok(flags)
    }

    /// Fetch one run row.
    pub async fn run(&self, run_id: i64) -> Result<HarvestRun, HarvestError> {
        let row = sqlx::query_as::<_, HarvestRun>("SELECT * FROM harvest_run WHERE id = ?")
            .bind(run_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(row)
    }

    /// All items of a run, in rank order.
    pub async fn run_items(&self, run_id: i64) -> Result<Vec<RunItem>, HarvestError> {
        let rows = sqlx::query_as::<_, RunItem>(
            "SELECT * FROM run_item WHERE run_id = ? ORDER BY rank",
        )
        .bind(run_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// All snapshots of an article, oldest first.
    pub async fn snapshots_for_article(
        &self,
        article_id: i64,
    ) -> Result<Vec<Snapshot>, HarvestError> {
        let rows = sqlx::query_as::<_, Snapshot>(
            "SELECT * FROM article_snapshot WHERE article_id = ? ORDER BY id",
        )
        .bind(article_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_store() -> (tempfile::TempDir, Store) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.db");
        let store = Store::connect(path.to_str().unwrap()).await.unwrap();
        store.init_schema().await.unwrap();
        (dir, store)
    }

    fn test_config(id: &str) -> PublicationConfig {
        serde_yaml::from_str(&format!("id: {id}\nname: Test {id}\n")).unwrap()
    }

    fn snap(hash: &str) -> NewSnapshot {
        NewSnapshot {
            title: "A Title".to_string(),
            byline: "Jane Doe".to_string(),
            published_time: Some("2026-01-02T03:04:05Z".to_string()),
            body_text: "body".to_string(),
            body_hash: hash.to_string(),
            raw_html_ref: None,
            og_image_url: None,
            tag: "Politics".to_string(),
        }
    }

    #[tokio::test]
    async fn test_ensure_publication_is_idempotent() {
        let (_dir, store) = test_store().await;
        let cfg = test_config("p1");
        let a = store.ensure_publication(&cfg).await.unwrap();
        let b = store.ensure_publication(&cfg).await.unwrap();
        assert_eq!(a.id, b.id);
        assert_eq!(b.name, "Test p1");
    }

    #[tokio::test]
    async fn test_first_commit_is_new_then_unchanged_then_updated() {
        let (_dir, store) = test_store().await;
        let p = store.ensure_publication(&test_config("p1")).await.unwrap();
        let run = store.create_run(p.id).await.unwrap();
        let url = "https://ex.com/a";

        let first = store
            .commit_link(p.id, run, 1, url, snap("h1"), Some((Some("\"v1\"".into()), None)))
            .await
            .unwrap();
        assert!(first.is_new);
        assert!(!first.is_updated);

        let run2 = store.create_run(p.id).await.unwrap();
        let second = store
            .commit_link(p.id, run2, 1, url, snap("h1"), None)
            .await
            .unwrap();
        assert!(!second.is_new);
        assert!(!second.is_updated);

        let run3 = store.create_run(p.id).await.unwrap();
        let third = store
            .commit_link(p.id, run3, 1, url, snap("h2"), None)
            .await
            .unwrap();
        assert!(!third.is_new);
        assert!(third.is_updated);

        let art = store.article_by_url(p.id, url).await.unwrap().unwrap();
        assert_eq!(art.last_body_hash.as_deref(), Some("h2"));
        // validators from the first commit survived the None updates
        assert_eq!(art.last_etag.as_deref(), Some("\"v1\""));

        // one snapshot per commit, last_snapshot points at the newest
        let snaps = store.snapshots_for_article(art.id).await.unwrap();
        assert_eq!(snaps.len(), 3);
        assert_eq!(art.last_snapshot_id, Some(snaps.last().unwrap().id));
    }

    #[tokio::test]
    async fn test_empty_extraction_carries_prior_metadata_forward() {
        let (_dir, store) = test_store().await;
        let p = store.ensure_publication(&test_config("p1")).await.unwrap();
        let run = store.create_run(p.id).await.unwrap();
        let url = "https://ex.com/a";

        store.commit_link(p.id, run, 1, url, snap("h1"), None).await.unwrap();

        let mut empty = snap("h1");
        empty.title = String::new();
        empty.byline = String::new();
        let run2 = store.create_run(p.id).await.unwrap();
        store.commit_link(p.id, run2, 1, url, empty, None).await.unwrap();

        let art = store.article_by_url(p.id, url).await.unwrap().unwrap();
        assert_eq!(art.title, "A Title");
        assert_eq!(art.byline, "Jane Doe");
        let snaps = store.snapshots_for_article(art.id).await.unwrap();
        assert_eq!(snaps[1].title, "A Title");
    }

    #[tokio::test]
    async fn test_finish_run_error_captures_payload() {
        let (_dir, store) = test_store().await;
        let p = store.ensure_publication(&test_config("p1")).await.unwrap();
        let run = store.create_run(p.id).await.unwrap();

        store
            .finish_run_error(run, serde_json::json!({ "msg": "discovery blew up" }))
            .await
            .unwrap();

        let row = store.run(run).await.unwrap();
        assert_eq!(row.status, RunStatus::ERROR);
        assert!(row.error_json.unwrap().contains("discovery blew up"));
        assert_eq!(row.links_found, 0);
        assert!(row.finished_at.is_some());
    }

    #[tokio::test]
    async fn test_links_found_survives_finish_run_error() {
        let (_dir, store) = test_store().await;
        let p = store.ensure_publication(&test_config("p1")).await.unwrap();
        let run = store.create_run(p.id).await.unwrap();

        store.set_links_found(run, 5).await.unwrap();
        store
            .finish_run_error(run, serde_json::json!({ "msg": "mid-run failure" }))
            .await
            .unwrap();

        let row = store.run(run).await.unwrap();
        assert_eq!(row.status, RunStatus::ERROR);
        assert_eq!(row.links_found, 5);
    }

    #[tokio::test]
    async fn test_run_items_ordered_by_rank() {
        let (_dir, store) = test_store().await;
        let p = store.ensure_publication(&test_config("p1")).await.unwrap();
        let run = store.create_run(p.id).await.unwrap();

        store.record_item(run, 2, "https://ex.com/b").await.unwrap();
        store.record_item(run, 1, "https://ex.com/a").await.unwrap();

        let items = store.run_items(run).await.unwrap();
        let ranks: Vec<i64> = items.iter().map(|i| i.rank).collect();
        assert_eq!(ranks, vec![1, 2]);
        assert!(items.iter().all(|i| !i.is_new && !i.is_updated));
    }
}
