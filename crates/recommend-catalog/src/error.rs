//! Catalog store error types.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by the catalog store and the catalog build.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// usearch index error
    #[error("Index error: {0}")]
    Index(String),

    /// Vector length does not match the index
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Catalog directory or collection missing
    #[error("Catalog not found at {0}")]
    NotFound(PathBuf),

    /// Catalog was built with a different embedding model
    #[error("Catalog built with {built_model} ({built_dim} dims), query model produces {query_dim} dims")]
    Incompatible {
        built_model: String,
        built_dim: usize,
        query_dim: usize,
    },

    /// Index returned a key with no stored metadata
    #[error("No metadata stored for vector key {0}")]
    MissingMetadata(u64),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// RocksDB error
    #[error("Database error: {0}")]
    Database(#[from] rocksdb::Error),

    /// Raw catalog input rejected
    #[error("Invalid catalog input: {0}")]
    InvalidInput(String),

    /// Embedding error during catalog build
    #[error("Embedding error: {0}")]
    Embedding(#[from] recommend_embeddings::EmbeddingError),
}
