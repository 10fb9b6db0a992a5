//! Candle-based sentence embedder.
//!
//! BERT forward pass, mean pooling over non-padding tokens, then L2
//! normalization. The default model is all-MiniLM-L6-v2 (384 dimensions),
//! the same model the catalog is built with.

use std::path::Path;
use std::sync::Arc;

use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::bert::{BertModel, Config as BertConfig};
use tokenizers::Tokenizer;
use tracing::{debug, info};

use crate::cache::ModelCache;
use crate::error::EmbeddingError;
use crate::manager::ModelLoader;
use crate::model::{Embedding, EmbeddingModel, ModelInfo};

/// Embedding dimension for all-MiniLM-L6-v2
pub const EMBEDDING_DIM: usize = 384;

/// Maximum sequence length
pub const MAX_SEQ_LENGTH: usize = 256;

/// Output dimension declared by a BERT `config.json` (`hidden_size`).
fn config_dimension(config_json: &str) -> Result<usize, EmbeddingError> {
    let config: serde_json::Value = serde_json::from_str(config_json)
        .map_err(|e| EmbeddingError::ModelNotFound(format!("Invalid config: {}", e)))?;
    config
        .get("hidden_size")
        .and_then(|h| h.as_u64())
        .filter(|h| *h > 0)
        .map(|h| h as usize)
        .ok_or_else(|| EmbeddingError::ModelNotFound("config has no hidden_size".to_string()))
}

/// BERT sentence embedder running on CPU.
pub struct CandleEmbedder {
    model: BertModel,
    tokenizer: Tokenizer,
    device: Device,
    info: ModelInfo,
}

impl CandleEmbedder {
    /// Load from the model cache, downloading files if needed.
    pub fn load(cache: &ModelCache) -> Result<Self, EmbeddingError> {
        let paths = cache.ensure()?;
        Self::load_from_paths(
            cache.model_name(),
            &paths.config,
            &paths.tokenizer,
            &paths.weights,
        )
    }

    pub fn load_default() -> Result<Self, EmbeddingError> {
        Self::load(&ModelCache::default())
    }

    pub fn load_from_paths(
        name: &str,
        config_path: &Path,
        tokenizer_path: &Path,
        weights_path: &Path,
    ) -> Result<Self, EmbeddingError> {
        info!(model = name, "Loading embedding model");

        let device = Device::Cpu;

        let config_str = std::fs::read_to_string(config_path)?;
        let config: BertConfig = serde_json::from_str(&config_str)
            .map_err(|e| EmbeddingError::ModelNotFound(format!("Invalid config: {}", e)))?;
        let dimension = config_dimension(&config_str)?;

        let tokenizer = Tokenizer::from_file(tokenizer_path)
            .map_err(|e| EmbeddingError::Tokenizer(e.to_string()))?;

        if !weights_path.exists() {
            return Err(EmbeddingError::ModelNotFound(
                weights_path.display().to_string(),
            ));
        }
        // SAFETY: the weights file is owned by the model cache and not modified while mapped.
        let vb = unsafe {
            VarBuilder::from_mmaped_safetensors(&[weights_path.to_path_buf()], DType::F32, &device)?
        };
        let model = BertModel::load(vb, &config)?;

        info!(model = name, dim = dimension, "Embedding model loaded");

        Ok(Self {
            model,
            tokenizer,
            device,
            info: ModelInfo {
                name: name.to_string(),
                dimension,
                max_sequence_length: MAX_SEQ_LENGTH,
            },
        })
    }

    fn mean_pooling(
        &self,
        embeddings: &Tensor,
        attention_mask: &Tensor,
    ) -> Result<Tensor, EmbeddingError> {
        let mask = attention_mask
            .unsqueeze(2)?
            .broadcast_as(embeddings.shape())?
            .to_dtype(DType::F32)?;

        let sum = embeddings.broadcast_mul(&mask)?.sum(1)?;
        let counts = mask.sum(1)?.clamp(1e-9, f64::MAX)?;

        Ok(sum.broadcast_div(&counts)?)
    }
}

impl EmbeddingModel for CandleEmbedder {
    fn info(&self) -> &ModelInfo {
        &self.info
    }

    fn embed(&self, text: &str) -> Result<Embedding, EmbeddingError> {
        self.embed_batch(&[text])?
            .into_iter()
            .next()
            .ok_or(EmbeddingError::EmptyOutput)
    }

    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Embedding>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(vec![]);
        }

        debug!(count = texts.len(), "Embedding batch");

        let encodings = self
            .tokenizer
            .encode_batch(texts.to_vec(), true)
            .map_err(|e| EmbeddingError::Tokenizer(e.to_string()))?;

        let max_len = encodings
            .iter()
            .map(|e| e.get_ids().len())
            .max()
            .unwrap_or(0)
            .min(MAX_SEQ_LENGTH);

        let mut ids_flat: Vec<u32> = Vec::with_capacity(texts.len() * max_len);
        let mut mask_flat: Vec<u32> = Vec::with_capacity(texts.len() * max_len);

        for encoding in &encodings {
            let ids = encoding.get_ids();
            let mask = encoding.get_attention_mask();
            let len = ids.len().min(max_len);

            ids_flat.extend_from_slice(&ids[..len]);
            ids_flat.extend(std::iter::repeat(0).take(max_len - len));
            mask_flat.extend_from_slice(&mask[..len]);
            mask_flat.extend(std::iter::repeat(0).take(max_len - len));
        }

        let shape = (texts.len(), max_len);
        let input_ids = Tensor::from_vec(ids_flat, shape, &self.device)?;
        let attention_mask = Tensor::from_vec(mask_flat, shape, &self.device)?;
        let token_type_ids = input_ids.zeros_like()?;

        let output = self
            .model
            .forward(&input_ids, &token_type_ids, Some(&attention_mask))?;
        let pooled: Vec<Vec<f32>> = self.mean_pooling(&output, &attention_mask)?.to_vec2()?;

        Ok(pooled.into_iter().map(Embedding::new).collect())
    }
}

/// Loads a [`CandleEmbedder`] from a model cache on demand.
///
/// Used as the [`ModelLoader`] behind the embedder manager, so every reload
/// after a release reads the cached files again.
#[derive(Debug, Clone)]
pub struct CandleLoader {
    cache: ModelCache,
}

impl CandleLoader {
    pub fn new(cache: ModelCache) -> Self {
        Self { cache }
    }
}

impl ModelLoader for CandleLoader {
    fn load(&self) -> Result<Arc<dyn EmbeddingModel>, EmbeddingError> {
        Ok(Arc::new(CandleEmbedder::load(&self.cache)?))
    }

    fn model_name(&self) -> String {
        self.cache.model_name().to_string()
    }

    /// Reads `config.json` only; the weights stay unloaded.
    fn dimension(&self) -> Result<usize, EmbeddingError> {
        let paths = self.cache.ensure()?;
        config_dimension(&std::fs::read_to_string(paths.config)?)
    }
}
