//! # Frontpage Harvester
//!
//! A harvesting pipeline that periodically collects front-page article links
//! from configured news publications, fetches and re-fetches their pages
//! efficiently, extracts structured content, detects changes across time,
//! and records a ranked, deduplicated history per publication.
//!
//! ## Architecture
//!
//! Each harvest run for a publication follows the same pipeline:
//! 1. **Discovery**: Merge candidate article URLs from the publication's
//!    configured sources, canonicalized, deduplicated, and capped
//! 2. **Fetching**: Conditional HTTP retrieval with cache validators and a
//!    mirror → AMP fallback ladder (or feed-derived synthesis in feed-only
//!    mode)
//! 3. **Extraction**: Title, byline, publish time, cover image, section,
//!    and a readability-reduced body, backstopped from feed metadata
//! 4. **Snapshotting**: Content-hash change detection and an append-only
//!    version history per article
//!
//! Runs are triggered on a fixed cadence per publication (with an immediate
//! first run on startup) or on demand, with overlapping runs for the same
//! publication coalesced. All records land in SQLite; raw HTML is archived
//! to a blob directory for audit.

pub mod cli;
pub mod config;
pub mod error;
pub mod harvest;
pub mod models;
pub mod objects;
pub mod scheduler;
pub mod store;
pub mod utils;

pub use error::HarvestError;
