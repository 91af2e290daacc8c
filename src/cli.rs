//! Command-line interface definitions for JCTC Scout.
//!
//! # Examples
//!
//! ```sh
//! # Crawl, enrich anything new and print the digest
//! jctc_scout refresh
//!
//! # Show what is cached without touching the network
//! jctc_scout --config ./scout.yaml list
//!
//! # Retry the translation of a single article
//! jctc_scout retry https://pubs.acs.org/doi/10.1021/acs.jctc.5b00001
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Path to a YAML config file
    #[arg(short, long, env = "JCTC_SCOUT_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Override the cache directory from the config file
    #[arg(long, global = true)]
    pub storage_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
    /// Crawl for new articles, enrich them and print the merged list
    Refresh {
        /// Work on an in-memory copy of the cache and leave the file untouched
        #[arg(long)]
        dry_run: bool,

        /// Do not log progress stages
        #[arg(short, long)]
        quiet: bool,
    },
    /// Print the cached articles
    List,
    /// Re-run enrichment for one cached article
    Retry {
        /// Article id (usually its URL)
        id: String,
    },
    /// Write the cached articles to a JSON file
    Export {
        /// Destination file
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Delete the cached articles
    Clear,
}
