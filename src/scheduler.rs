//! Cadence-driven scheduling of harvest runs.
//!
//! One lightweight task per publication, ticking on a shared cadence with
//! an immediate first run. Triggers are fire-and-forget: a tick that lands
//! while the previous run is still in flight is skipped (the in-process
//! active-run registry coalesces it), never queued. Runs for different
//! publications proceed independently.

use std::time::Duration;

use rand::Rng;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

use crate::config::PublicationConfig;
use crate::error::HarvestError;
use crate::harvest::Harvester;

/// Spawn the per-publication tick loops and run until a shutdown signal.
pub async fn run_scheduler(
    harvester: Harvester,
    publications: Vec<PublicationConfig>,
    cadence: Duration,
) -> Result<(), HarvestError> {
    let mut handles = Vec::new();
    for cfg in publications {
        // Small stagger so a fleet of publications doesn't fire in lockstep.
        let jitter = Duration::from_millis(rand::rng().random_range(0..5_000));
        let harvester = harvester.clone();
        handles.push(tokio::spawn(async move {
            tokio::time::sleep(jitter).await;
            let mut ticker = tokio::time::interval(cadence);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if harvester.is_run_active(&cfg.id) {
                    warn!(publication = %cfg.id, "Previous run still in flight; skipping tick");
                    continue;
                }
                match harvester.run_publication_harvest(&cfg).await {
                    Ok(Some(summary)) => info!(
                        publication = %cfg.id,
                        run_id = summary.run_id,
                        status = %summary.status,
                        links_found = summary.links_found,
                        links_new = summary.links_new,
                        links_updated = summary.links_updated,
                        "Scheduled run finished"
                    ),
                    Ok(None) => {}
                    Err(e) => error!(publication = %cfg.id, error = %e, "Scheduled run failed"),
                }
            }
        }));
    }

    info!(
        publications = handles.len(),
        cadence_secs = cadence.as_secs(),
        "Scheduler started"
    );
    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received; stopping scheduler");
    for handle in &handles {
        handle.abort();
    }
    Ok(())
}
