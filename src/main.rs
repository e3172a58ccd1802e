//! Binary entry point: wire up the store, blob archive, and publication
//! registry, then either harvest once or hand off to the scheduler.

use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::EnvFilter;

use frontpage_harvester::cli::Cli;
use frontpage_harvester::config;
use frontpage_harvester::harvest::Harvester;
use frontpage_harvester::objects::BlobStore;
use frontpage_harvester::scheduler;
use frontpage_harvester::store::Store;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_timer(UtcTime::rfc_3339())
        .with_target(true)
        .init();

    let cli = Cli::parse();

    let store = Store::connect(&cli.db_path)
        .await
        .with_context(|| format!("opening database at {}", cli.db_path))?;
    store.init_schema().await.context("initializing schema")?;

    let blobs = BlobStore::open(&cli.raw_html_dir)
        .await
        .with_context(|| format!("opening raw HTML archive at {}", cli.raw_html_dir))?;

    let harvester = Harvester::new(store, blobs);
    let config_dir = Path::new(&cli.config_dir);

    if let Some(publication_id) = &cli.once {
        let cfg = config::get_publication(config_dir, publication_id)?;
        let summary = harvester
            .run_publication_harvest(&cfg)
            .await?
            .context("run was coalesced, which cannot happen for a fresh process")?;
        info!(
            publication = %summary.publication,
            run_id = summary.run_id,
            status = %summary.status,
            links_found = summary.links_found,
            links_new = summary.links_new,
            links_updated = summary.links_updated,
            "One-shot harvest finished"
        );
        return Ok(());
    }

    let publications = config::list_publications(config_dir, &cli.publications)?;
    anyhow::ensure!(
        !publications.is_empty(),
        "no publication configs found in {}",
        cli.config_dir
    );

    let cadence = Duration::from_secs(cli.cadence_hours * 60 * 60);
    scheduler::run_scheduler(harvester, publications, cadence).await?;
    Ok(())
}
