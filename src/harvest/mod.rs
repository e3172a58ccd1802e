//! The harvest orchestrator and its pipeline stages.
//!
//! Each submodule is one stage: canonicalization, discovery, feed parsing,
//! conditional fetching, extraction, feed enrichment, snapshotting, and tag
//! inference. [`Harvester`] coordinates them per publication per run:
//! discover, then per ranked link fetch → extract → enrich → snapshot, then
//! finish with counts.
//!
//! A run moves `running → ok | error` and is terminal. No per-link failure
//! ever aborts the run: fetch exhaustion and unprocessable feed-only items
//! become run items with neither flag set, and unexpected per-link errors
//! are caught and converted to the same "no outcome" row. Only an error
//! outside per-link handling (discovery, run bookkeeping) marks the run
//! `error`, with whatever run items were already written left standing.

pub mod canonical;
pub mod discover;
pub mod enrich;
pub mod extract;
pub mod feeds;
pub mod fetch;
pub mod snapshot;
pub mod tags;

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use futures::stream::{self, StreamExt};
use reqwest::Client;
use tracing::{debug, error, info, warn};

use crate::config::PublicationConfig;
use crate::error::HarvestError;
use crate::harvest::enrich::FeedIndex;
use crate::harvest::extract::ExtractedFields;
use crate::harvest::feeds::FeedEntry;
use crate::harvest::fetch::FetchOutcome;
use crate::harvest::snapshot::LinkFlags;
use crate::models::{Publication, RunStatus};
use crate::objects::BlobStore;
use crate::store::{NewSnapshot, Store};
use crate::utils::slugify_title;

/// In-process registry of publications with a run in flight.
///
/// Overlapping triggers for the same publication are coalesced: a second
/// trigger while a run is active is skipped, not queued.
#[derive(Debug, Clone, Default)]
pub struct ActiveRuns {
    inner: Arc<Mutex<HashSet<String>>>,
}

impl ActiveRuns {
    /// Is a run currently in flight for this publication?
    pub fn is_active(&self, publication_id: &str) -> bool {
        self.inner
            .lock()
            .expect("active-run registry poisoned")
            .contains(publication_id)
    }

    fn try_begin(&self, publication_id: &str) -> Option<ActiveRunGuard> {
        let mut set = self.inner.lock().expect("active-run registry poisoned");
        if set.insert(publication_id.to_string()) {
            Some(ActiveRunGuard {
                inner: Arc::clone(&self.inner),
                id: publication_id.to_string(),
            })
        } else {
            None
        }
    }
}

struct ActiveRunGuard {
    inner: Arc<Mutex<HashSet<String>>>,
    id: String,
}

impl Drop for ActiveRunGuard {
    fn drop(&mut self) {
        self.inner
            .lock()
            .expect("active-run registry poisoned")
            .remove(&self.id);
    }
}

/// Final state of one harvest run.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub run_id: i64,
    pub publication: String,
    pub status: String,
    pub links_found: usize,
    pub links_new: i64,
    pub links_updated: i64,
}

/// Shared per-run context handed to each link worker.
struct LinkCtx {
    client: Client,
    cfg: PublicationConfig,
    index: FeedIndex,
    publication: Publication,
    run_id: i64,
}

/// Coordinates the harvesting pipeline. Cheap to clone.
#[derive(Debug, Clone)]
pub struct Harvester {
    store: Store,
    blobs: BlobStore,
    active: ActiveRuns,
}

impl Harvester {
    pub fn new(store: Store, blobs: BlobStore) -> Self {
        Self {
            store,
            blobs,
            active: ActiveRuns::default(),
        }
    }

    /// Is a harvest currently in flight for this publication?
    pub fn is_run_active(&self, publication_id: &str) -> bool {
        self.active.is_active(publication_id)
    }

    /// The single entry point: harvest one publication now.
    ///
    /// Returns `Ok(None)` when a run for the publication is already in
    /// flight (the trigger is coalesced). Otherwise creates the run record,
    /// executes the pipeline, and finishes the run `ok` or `error`.
    pub async fn run_publication_harvest(
        &self,
        cfg: &PublicationConfig,
    ) -> Result<Option<RunSummary>, HarvestError> {
        let Some(_guard) = self.active.try_begin(&cfg.id) else {
            info!(publication = %cfg.id, "Run already in flight; skipping trigger");
            return Ok(None);
        };

        let publication = self.store.ensure_publication(cfg).await?;
        let run_id = self.store.create_run(publication.id).await?;
        info!(publication = %cfg.id, run_id, "Harvest run started");

        match self.harvest(run_id, publication, cfg).await {
            Ok((links_found, links_new, links_updated)) => {
                self.store
                    .finish_run_ok(run_id, links_new, links_updated)
                    .await?;
                info!(
                    publication = %cfg.id,
                    run_id,
                    links_found,
                    links_new,
                    links_updated,
                    "Harvest run completed"
                );
                Ok(Some(RunSummary {
                    run_id,
                    publication: cfg.id.clone(),
                    status: RunStatus::OK.to_string(),
                    links_found,
                    links_new,
                    links_updated,
                }))
            }
            Err(e) => {
                error!(publication = %cfg.id, run_id, error = %e, "Harvest run failed");
                self.store
                    .finish_run_error(run_id, serde_json::json!({ "msg": e.to_string() }))
                    .await?;
                // Discovery may already have recorded a link count before
                // the failure; the summary must agree with the run row.
                let links_found = self.store.run(run_id).await?.links_found as usize;
                Ok(Some(RunSummary {
                    run_id,
                    publication: cfg.id.clone(),
                    status: RunStatus::ERROR.to_string(),
                    links_found,
                    links_new: 0,
                    links_updated: 0,
                }))
            }
        }
    }

    /// Discovery plus the per-link worker pool. Everything that can fail in
    /// here (outside per-link handling) surfaces as a run-level error.
    async fn harvest(
        &self,
        run_id: i64,
        publication: Publication,
        cfg: &PublicationConfig,
    ) -> Result<(usize, i64, i64), HarvestError> {
        let client = Client::builder().build()?;

        let links = discover::discover_links(&client, cfg).await;
        self.store.set_links_found(run_id, links.len() as i64).await?;

        let index = if cfg.feed_only || cfg.feed_enrich {
            FeedIndex::build(&client, cfg).await
        } else {
            FeedIndex::empty()
        };

        let ctx = Arc::new(LinkCtx {
            client,
            cfg: cfg.clone(),
            index,
            publication,
            run_id,
        });

        // Rank is assigned before dispatch so completion order can't
        // reorder it.
        let links_found = links.len();
        let outcomes: Vec<LinkFlags> = stream::iter(links.into_iter().enumerate())
            .map(|(i, url)| {
                let ctx = Arc::clone(&ctx);
                let this = self.clone();
                async move { this.process_link(ctx, (i + 1) as i64, url).await }
            })
            .buffer_unordered(cfg.fetch_concurrency.max(1))
            .collect()
            .await;

        let links_new = outcomes.iter().filter(|f| f.is_new).count() as i64;
        let links_updated = outcomes.iter().filter(|f| f.is_updated).count() as i64;
        Ok((links_found, links_new, links_updated))
    }

    /// Process one ranked link. Never raises: any error inside becomes a
    /// "no outcome" run item.
    async fn process_link(&self, ctx: Arc<LinkCtx>, rank: i64, url: String) -> LinkFlags {
        match self.process_link_inner(&ctx, rank, &url).await {
            Ok(flags) => flags,
            Err(e) => {
                warn!(
                    publication = %ctx.cfg.id,
                    run_id = ctx.run_id,
                    rank,
                    %url,
                    error = %e,
                    "Link processing failed; recording no outcome"
                );
                if let Err(e2) = self.store.record_item(ctx.run_id, rank, &url).await {
                    error!(run_id = ctx.run_id, rank, error = %e2, "Failed to record run item");
                }
                LinkFlags::none()
            }
        }
    }

    async fn process_link_inner(
        &self,
        ctx: &LinkCtx,
        rank: i64,
        url: &str,
    ) -> Result<LinkFlags, HarvestError> {
        let prior = self.store.article_by_url(ctx.publication.id, url).await?;
        let (etag, last_modified) = prior
            .map(|a| (a.last_etag, a.last_modified))
            .unwrap_or((None, None));

        let outcome = fetch::fetch_page(
            &ctx.client,
            &ctx.cfg,
            &ctx.index,
            url,
            etag.as_deref(),
            last_modified.as_deref(),
        )
        .await;

        let (fields, html, validators) = match outcome {
            FetchOutcome::NotModified => {
                debug!(publication = %ctx.cfg.id, rank, %url, "Not modified");
                self.store.record_item(ctx.run_id, rank, url).await?;
                return Ok(LinkFlags::none());
            }
            FetchOutcome::Unavailable => {
                debug!(publication = %ctx.cfg.id, rank, %url, "No feed entry for feed-only link");
                self.store.record_item(ctx.run_id, rank, url).await?;
                return Ok(LinkFlags::none());
            }
            FetchOutcome::Failed => {
                self.store.record_item(ctx.run_id, rank, url).await?;
                return Ok(LinkFlags::none());
            }
            FetchOutcome::FeedOnly(entry) => (fields_from_entry(&entry), String::new(), None),
            FetchOutcome::Page {
                html,
                etag,
                last_modified,
            } => {
                let mut fields = extract::extract_article_fields(url, &html);
                if !ctx.index.is_empty() {
                    backstop_from_feed(&mut fields, &ctx.index, url);
                }
                (fields, html, Some((etag, last_modified)))
            }
        };

        let body_hash = snapshot::body_hash(&fields.body);
        let raw_html_ref = if html.is_empty() {
            None
        } else {
            self.blobs
                .save_raw_html(&ctx.cfg.id, &slugify_title(&fields.title), &html)
                .await
        };
        let tag = tags::infer_tag(&fields.title, fields.section.as_deref()).to_string();

        let snap = NewSnapshot {
            title: fields.title,
            byline: fields.byline,
            published_time: fields.published,
            body_text: fields.body,
            body_hash,
            raw_html_ref,
            og_image_url: fields.image,
            tag,
        };

        let flags = self
            .store
            .commit_link(ctx.publication.id, ctx.run_id, rank, url, snap, validators)
            .await?;
        debug!(
            publication = %ctx.cfg.id,
            rank,
            %url,
            is_new = flags.is_new,
            is_updated = flags.is_updated,
            "Processed link"
        );
        Ok(flags)
    }
}

/// Synthesize extracted fields from a feed entry (feed-only mode). The
/// body stays empty; the snapshot carries feed metadata only.
fn fields_from_entry(entry: &FeedEntry) -> ExtractedFields {
    ExtractedFields {
        title: entry.title.clone().unwrap_or_default(),
        byline: entry.byline.clone().unwrap_or_default(),
        published: entry.published.clone(),
        image: entry.image.clone(),
        section: None,
        body: String::new(),
    }
}

/// Backstop missing extracted fields from the feed enrichment index.
fn backstop_from_feed(fields: &mut ExtractedFields, index: &FeedIndex, url: &str) {
    let complete = !fields.title.is_empty()
        && !fields.byline.is_empty()
        && fields.published.is_some()
        && fields.image.is_some();
    if complete {
        return;
    }
    let Some(entry) = index.lookup(url) else {
        return;
    };
    if fields.title.is_empty() {
        if let Some(title) = &entry.title {
            fields.title = title.clone();
        }
    }
    if fields.byline.is_empty() {
        if let Some(byline) = &entry.byline {
            fields.byline = byline.clone();
        }
    }
    if fields.published.is_none() {
        fields.published = entry.published.clone();
    }
    if fields.image.is_none() {
        fields.image = entry.image.clone();
    }
}
