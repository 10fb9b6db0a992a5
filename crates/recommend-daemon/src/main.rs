//! Assessment Recommender
//!
//! # Usage
//!
//! ```bash
//! recommend-daemon build-catalog data/SHL_RAW.json
//! recommend-daemon verify
//! recommend-daemon serve [--host HOST] [--port PORT]
//! recommend-daemon query "Java developer, 40 minutes" -k 5
//! recommend-daemon evaluate cases.json -k 3
//! ```
//!
//! # Configuration
//!
//! Configuration is loaded in order (later sources override earlier):
//! 1. Built-in defaults
//! 2. Config file (~/.config/assessment-recommender/config.toml)
//! 3. Environment variables (RECOMMEND_*, GEMINI_API_KEY)
//! 4. CLI flags

use anyhow::Result;
use clap::Parser;

use recommend_daemon::{
    build_catalog, init_logging, load_settings, run_evaluation, run_query, start_server, verify,
    Cli, Commands,
};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let settings = load_settings(
        cli.config.as_deref(),
        cli.log_level.as_deref(),
        cli.catalog.as_deref(),
    )?;
    init_logging(&settings)?;

    match cli.command {
        Commands::Serve { host, port } => {
            start_server(settings, host.as_deref(), port).await?;
        }
        Commands::BuildCatalog { input } => {
            build_catalog(&settings, &input)?;
        }
        Commands::Verify => {
            if !verify(&settings)? {
                std::process::exit(1);
            }
        }
        Commands::Query { text, top_k } => {
            run_query(&settings, &text, top_k).await?;
        }
        Commands::Evaluate { cases, top_k } => {
            run_evaluation(&settings, &cases, top_k).await?;
        }
    }

    Ok(())
}
