//! HNSW vector index over catalog item vectors, backed by usearch.
//!
//! Cosine metric; scores are reported as `1 - distance` so that higher is
//! more similar. Results come back best first.

use std::path::PathBuf;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use recommend_embeddings::Embedding;
use tracing::{debug, info};
use usearch::{Index, IndexOptions, MetricKind, ScalarKind};

use crate::error::CatalogError;

/// Index file name inside the index directory
pub const INDEX_FILE: &str = "hnsw.usearch";

/// One neighbor returned by the index
#[derive(Debug, Clone, PartialEq)]
pub struct SearchResult {
    /// Vector key
    pub key: u64,
    /// Similarity (higher = more similar)
    pub score: f32,
}

/// Index statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexStats {
    pub vector_count: usize,
    pub dimension: usize,
    pub size_bytes: u64,
}

/// HNSW index configuration
#[derive(Debug, Clone)]
pub struct HnswConfig {
    /// Embedding dimension (must match model)
    pub dimension: usize,
    /// Connections per layer (M)
    pub connectivity: usize,
    /// Build-time search depth (ef_construction)
    pub expansion_add: usize,
    /// Query-time search depth (ef_search)
    pub expansion_search: usize,
    /// Index directory
    pub index_path: PathBuf,
    /// Initial capacity to reserve
    pub capacity: usize,
}

impl Default for HnswConfig {
    fn default() -> Self {
        Self {
            dimension: 384,
            connectivity: 16,
            expansion_add: 200,
            expansion_search: 100,
            index_path: PathBuf::from("./catalog/index"),
            capacity: 1_024,
        }
    }
}

impl HnswConfig {
    pub fn new(dimension: usize, index_path: impl Into<PathBuf>) -> Self {
        Self {
            dimension,
            index_path: index_path.into(),
            ..Default::default()
        }
    }

    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity.max(1);
        self
    }

    fn options(&self) -> IndexOptions {
        IndexOptions {
            dimensions: self.dimension,
            metric: MetricKind::Cos,
            quantization: ScalarKind::F32,
            connectivity: self.connectivity,
            expansion_add: self.expansion_add,
            expansion_search: self.expansion_search,
            multi: false,
        }
    }
}

/// usearch index wrapper.
pub struct HnswIndex {
    index: RwLock<Index>,
    config: HnswConfig,
}

impl HnswIndex {
    /// Create an empty index, replacing nothing on disk until `save()`.
    pub fn create(config: HnswConfig) -> Result<Self, CatalogError> {
        info!(path = ?config.index_path, dim = config.dimension, "Creating catalog index");
        std::fs::create_dir_all(&config.index_path)?;
        let index = new_index(&config)?;
        Ok(Self {
            index: RwLock::new(index),
            config,
        })
    }

    /// Open a saved index. Fails with `NotFound` when no index file exists.
    pub fn open(config: HnswConfig) -> Result<Self, CatalogError> {
        let index_file = config.index_path.join(INDEX_FILE);
        if !index_file.exists() {
            return Err(CatalogError::NotFound(index_file));
        }

        let index = Index::new(&config.options()).map_err(|e| CatalogError::Index(e.to_string()))?;
        index
            .load(path_str(&index_file)?)
            .map_err(|e| CatalogError::Index(format!("Failed to load: {}", e)))?;

        info!(path = ?index_file, vectors = index.size(), "Opened catalog index");
        Ok(Self {
            index: RwLock::new(index),
            config,
        })
    }

    fn read(&self) -> RwLockReadGuard<'_, Index> {
        self.index.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Index> {
        self.index.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn index_file(&self) -> PathBuf {
        self.config.index_path.join(INDEX_FILE)
    }

    pub fn dimension(&self) -> usize {
        self.config.dimension
    }

    pub fn len(&self) -> usize {
        self.read().size()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn check_dimension(&self, embedding: &Embedding) -> Result<(), CatalogError> {
        if embedding.dimension() != self.config.dimension {
            return Err(CatalogError::DimensionMismatch {
                expected: self.config.dimension,
                actual: embedding.dimension(),
            });
        }
        Ok(())
    }

    /// Add a vector under `key`, growing the reservation when full.
    pub fn add(&self, key: u64, embedding: &Embedding) -> Result<(), CatalogError> {
        self.check_dimension(embedding)?;

        // Write lock: reserve() must not race with concurrent adds.
        let index = self.write();
        if index.size() >= index.capacity() {
            let grown = (index.capacity() * 2).max(self.config.capacity);
            index
                .reserve(grown)
                .map_err(|e| CatalogError::Index(e.to_string()))?;
        }
        index
            .add(key, embedding.as_slice())
            .map_err(|e| CatalogError::Index(e.to_string()))?;

        debug!(key, "Added catalog vector");
        Ok(())
    }

    /// k nearest neighbors, best first.
    pub fn search(&self, query: &Embedding, k: usize) -> Result<Vec<SearchResult>, CatalogError> {
        self.check_dimension(query)?;

        let index = self.read();
        if index.size() == 0 || k == 0 {
            return Ok(Vec::new());
        }
        let matches = index
            .search(query.as_slice(), k)
            .map_err(|e| CatalogError::Index(e.to_string()))?;

        let results: Vec<SearchResult> = matches
            .keys
            .iter()
            .zip(matches.distances.iter())
            .map(|(&key, &distance)| SearchResult {
                key,
                score: 1.0 - distance,
            })
            .collect();

        debug!(k, found = results.len(), "Index search complete");
        Ok(results)
    }

    pub fn stats(&self) -> IndexStats {
        let size_bytes = std::fs::metadata(self.index_file())
            .map(|m| m.len())
            .unwrap_or(0);
        IndexStats {
            vector_count: self.len(),
            dimension: self.config.dimension,
            size_bytes,
        }
    }

    pub fn save(&self) -> Result<(), CatalogError> {
        let index = self.read();
        let path = self.index_file();
        index
            .save(path_str(&path)?)
            .map_err(|e| CatalogError::Index(format!("Failed to save: {}", e)))?;

        info!(path = ?path, vectors = index.size(), "Saved catalog index");
        Ok(())
    }
}

fn new_index(config: &HnswConfig) -> Result<Index, CatalogError> {
    let index = Index::new(&config.options()).map_err(|e| CatalogError::Index(e.to_string()))?;
    index
        .reserve(config.capacity)
        .map_err(|e| CatalogError::Index(e.to_string()))?;
    Ok(index)
}

fn path_str(path: &std::path::Path) -> Result<&str, CatalogError> {
    path.to_str()
        .ok_or_else(|| CatalogError::Index("Invalid path encoding".to_string()))
}
