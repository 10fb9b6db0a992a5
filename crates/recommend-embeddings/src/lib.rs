//! # recommend-embeddings
//!
//! Query embedding for the assessment recommender.
//!
//! The model itself is an external collaborator behind [`EmbeddingModel`].
//! [`EmbedderManager`] owns its lifecycle: the model is loaded on first use,
//! shared by concurrent requests through reference-counted leases, and
//! unloaded again so that the process does not keep the weights resident.
//!
//! ## Features
//! - Local inference via Candle (all-MiniLM-L6-v2, 384 dimensions)
//! - Model file caching with HuggingFace Hub download
//! - Lazy load / release with a serialized load transition

pub mod cache;
pub mod candle;
pub mod error;
pub mod manager;
pub mod model;

pub use crate::candle::{CandleEmbedder, CandleLoader, EMBEDDING_DIM};
pub use cache::{ModelCache, ModelPaths, DEFAULT_MODEL_REPO, MODEL_FILES};
pub use error::EmbeddingError;
pub use manager::{EmbedderLease, EmbedderManager, EmbedderState, ModelLoader};
pub use model::{Embedding, EmbeddingModel, ModelInfo};
