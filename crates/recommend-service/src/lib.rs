//! # recommend-service
//!
//! The query-to-recommendation pipeline and its HTTP surface.
//!
//! - [`SearchOrchestrator`]: acquire embedder, embed, nearest lookup, release
//! - [`ResultCache`]: bounded `(query, k)` memoization with insertion-order eviction
//! - [`Recommender`]: normalizer + cache + orchestrator, async entry point
//! - [`evaluation`]: recall@k / AP@k over labelled queries
//! - [`server`]: axum router and graceful-shutdown server

pub mod api;
pub mod cache;
pub mod error;
pub mod evaluation;
pub mod orchestrator;
pub mod recommender;
pub mod server;

#[cfg(test)]
mod test_support;

pub use api::{AppState, ApiError, RecommendParams, RecommendRequest};
pub use cache::{CacheStats, ResultCache, DEFAULT_CACHE_CAPACITY};
pub use error::{RecommendError, SearchError};
pub use evaluation::{average_precision_at_k, evaluate, recall_at_k, EvalCase, EvalReport, QueryScore};
pub use orchestrator::SearchOrchestrator;
pub use recommender::Recommender;
pub use server::{build_router, run_server_with_shutdown};
