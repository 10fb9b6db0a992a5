//! Pipeline error types.

use recommend_catalog::CatalogError;
use recommend_embeddings::EmbeddingError;
use thiserror::Error;

/// Errors from a single search.
#[derive(Debug, Error)]
pub enum SearchError {
    /// Requested result count outside `1..=max`
    #[error("top_k must be between 1 and {max}, got {k}")]
    InvalidTopK { k: usize, max: usize },

    /// Embedding model could not be loaded
    #[error("Failed to load embedding model: {0}")]
    Load(#[source] EmbeddingError),

    /// Query vector computation failed
    #[error("Failed to embed query: {0}")]
    Embed(#[source] EmbeddingError),

    /// Catalog lookup failed
    #[error("Catalog lookup failed: {0}")]
    Store(#[from] CatalogError),
}

/// Errors from the full recommendation pipeline.
#[derive(Debug, Error)]
pub enum RecommendError {
    #[error(transparent)]
    Search(#[from] SearchError),

    /// Blocking search task panicked or was cancelled
    #[error("Search task failed: {0}")]
    Task(String),
}

impl RecommendError {
    /// Whether the caller asked for an invalid result count.
    pub fn is_invalid_top_k(&self) -> bool {
        matches!(self, RecommendError::Search(SearchError::InvalidTopK { .. }))
    }
}
