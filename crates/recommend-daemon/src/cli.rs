//! CLI argument parsing for the recommender daemon.
//!
//! CLI flags override every other configuration source.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Assessment Recommender
///
/// Recommends assessments for a job description or job posting URL by
/// nearest-neighbor search over an embedded catalog.
#[derive(Parser, Debug)]
#[command(name = "recommend-daemon")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to config file (overrides default ~/.config/assessment-recommender/config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Set log level (trace, debug, info, warn, error)
    #[arg(short, long, global = true)]
    pub log_level: Option<String>,

    /// Override catalog directory
    #[arg(long, global = true)]
    pub catalog: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Serve the HTTP API
    Serve {
        /// Override bind host
        #[arg(long)]
        host: Option<String>,

        /// Override HTTP port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Build the catalog from raw assessment JSON, replacing any existing catalog
    BuildCatalog {
        /// Raw assessment JSON (a list of records)
        input: PathBuf,
    },

    /// Check that the catalog directory is present and readable
    Verify,

    /// Run one recommendation in-process and print the results
    Query {
        /// Job description text or job posting URL
        text: String,

        /// Number of results
        #[arg(short = 'k', long)]
        top_k: Option<usize>,
    },

    /// Score the pipeline against labelled queries
    Evaluate {
        /// JSON file of {"query": ..., "relevant": [...]} cases
        cases: PathBuf,

        /// Cutoff for recall@k and AP@k
        #[arg(short = 'k', long, default_value = "3")]
        top_k: usize,
    },
}
