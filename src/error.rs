//! Error taxonomy for the harvesting pipeline.
//!
//! Per-link failures (fetch exhaustion, unprocessable feed-only items) are
//! not errors at all: they are modeled as fetch outcomes and converted to
//! "no outcome" run items by the orchestrator. `HarvestError` covers the
//! failures that matter at the run or process level.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum HarvestError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("feed error: {0}")]
    Feed(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}
