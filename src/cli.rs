//! Command-line interface definitions for the harvester.
//!
//! This module defines the CLI arguments and options using the `clap` crate.
//! All arguments can be provided via command-line flags or environment
//! variables.

use clap::Parser;

/// Command-line arguments for the frontpage harvester.
///
/// # Examples
///
/// ```sh
/// # Run the scheduler over every configured publication
/// frontpage_harvester --config-dir ./configs
///
/// # Harvest a single publication once and exit
/// frontpage_harvester --config-dir ./configs --once example-times
///
/// # Narrow scheduling to two publications, 6h cadence
/// frontpage_harvester --publications example-times,daily-sun --cadence-hours 6
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Directory of per-publication YAML config files
    #[arg(short, long, env = "CONFIG_DIR", default_value = "./configs")]
    pub config_dir: String,

    /// SQLite database file
    #[arg(long, env = "DATABASE_PATH", default_value = "./data/harvester.db")]
    pub db_path: String,

    /// Directory for archived raw HTML
    #[arg(long, env = "RAW_HTML_DIR", default_value = "./data/html")]
    pub raw_html_dir: String,

    /// Harvest cadence per publication, in hours
    #[arg(long, env = "CADENCE_HOURS", default_value_t = 24)]
    pub cadence_hours: u64,

    /// Comma-separated publication ids to schedule (default: all configs)
    #[arg(long, env = "PUBLICATIONS", value_delimiter = ',')]
    pub publications: Vec<String>,

    /// Run one harvest for the given publication id, then exit
    #[arg(long)]
    pub once: Option<String>,
}
