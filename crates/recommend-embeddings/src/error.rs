//! Embedding error types.

use thiserror::Error;

/// Errors that can occur while loading or running the embedding model.
#[derive(Debug, Error)]
pub enum EmbeddingError {
    /// Candle model error
    #[error("Candle error: {0}")]
    Candle(#[from] candle_core::Error),

    /// Tokenizer error
    #[error("Tokenizer error: {0}")]
    Tokenizer(String),

    /// Model file missing or unreadable
    #[error("Model file not found: {0}")]
    ModelNotFound(String),

    /// Download error
    #[error("Failed to download model: {0}")]
    Download(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Model produced no vector for an input
    #[error("Model returned no embedding for input")]
    EmptyOutput,

    /// Loader-specific failure, such as the host running out of memory
    #[error("Model load failed: {0}")]
    Load(String),
}
