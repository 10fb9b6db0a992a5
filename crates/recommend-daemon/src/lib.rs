//! Recommender daemon library exports.
//!
//! # Modules
//!
//! - `cli`: Command-line argument parsing with clap
//! - `commands`: Command implementations (serve, build-catalog, verify, query, evaluate)

pub mod cli;
pub mod commands;

pub use cli::{Cli, Commands};
pub use commands::{
    build_catalog, build_recommender, format_results, init_logging, load_settings, run_evaluation,
    run_query, start_server, verify,
};
