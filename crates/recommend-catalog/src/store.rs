//! Catalog store interface and the on-disk implementation.
//!
//! Layout of a catalog directory:
//!
//! ```text
//! <catalog>/index/hnsw.usearch   item vectors
//! <catalog>/meta/                RocksDB item metadata + manifest
//! ```

use std::path::{Path, PathBuf};

use chrono::Utc;
use recommend_embeddings::Embedding;
use recommend_types::CatalogItem;
use tracing::{debug, info};

use crate::error::CatalogError;
use crate::hnsw::{HnswConfig, HnswIndex};
use crate::metadata::{CatalogManifest, CatalogMetadata};

/// A catalog item with the similarity reported by the store.
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogHit {
    pub score: f32,
    pub item: CatalogItem,
}

/// Nearest-neighbor store of catalog items.
pub trait CatalogStore: Send + Sync {
    /// Vector dimension the store was built with.
    fn dimension(&self) -> usize;

    /// Number of stored items.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Store an item with its vector. Build time only.
    fn insert(&self, key: u64, embedding: &Embedding, item: &CatalogItem)
        -> Result<(), CatalogError>;

    /// The k nearest items, most similar first, metadata only.
    ///
    /// Either every returned key resolves to metadata or the call fails;
    /// partial lists are never returned.
    fn nearest(&self, query: &Embedding, k: usize) -> Result<Vec<CatalogHit>, CatalogError>;
}

/// Catalog stored on local disk.
pub struct LocalCatalog {
    root: PathBuf,
    index: HnswIndex,
    metadata: CatalogMetadata,
    manifest: Option<CatalogManifest>,
}

impl LocalCatalog {
    fn index_dir(root: &Path) -> PathBuf {
        root.join("index")
    }

    fn meta_dir(root: &Path) -> PathBuf {
        root.join("meta")
    }

    /// Create an empty, writable catalog. Any previous catalog at `root` is removed.
    pub fn create(
        root: impl AsRef<Path>,
        dimension: usize,
        capacity: usize,
    ) -> Result<Self, CatalogError> {
        let root = root.as_ref();
        if root.exists() {
            info!(path = ?root, "Replacing existing catalog");
            std::fs::remove_dir_all(root)?;
        }
        std::fs::create_dir_all(root)?;

        let index = HnswIndex::create(
            HnswConfig::new(dimension, Self::index_dir(root)).with_capacity(capacity),
        )?;
        let metadata = CatalogMetadata::open(Self::meta_dir(root))?;

        Ok(Self {
            root: root.to_path_buf(),
            index,
            metadata,
            manifest: None,
        })
    }

    /// Open a built catalog read-only for serving.
    ///
    /// Fails with `Incompatible` when the catalog was built with a model of a
    /// different dimension than `query_dimension`.
    pub fn open(root: impl AsRef<Path>, query_dimension: usize) -> Result<Self, CatalogError> {
        let root = root.as_ref();
        if !root.is_dir() {
            return Err(CatalogError::NotFound(root.to_path_buf()));
        }

        let metadata = CatalogMetadata::open_read_only(Self::meta_dir(root))?;
        let manifest = metadata
            .manifest()?
            .ok_or_else(|| CatalogError::NotFound(Self::meta_dir(root)))?;

        if manifest.dimension != query_dimension {
            return Err(CatalogError::Incompatible {
                built_model: manifest.model,
                built_dim: manifest.dimension,
                query_dim: query_dimension,
            });
        }

        let index = HnswIndex::open(HnswConfig::new(manifest.dimension, Self::index_dir(root)))?;

        info!(
            path = ?root,
            model = %manifest.model,
            items = manifest.item_count,
            "Opened catalog"
        );

        Ok(Self {
            root: root.to_path_buf(),
            index,
            metadata,
            manifest: Some(manifest),
        })
    }

    /// Persist the index and record the manifest.
    pub fn finish(&mut self, model: &str) -> Result<CatalogManifest, CatalogError> {
        self.index.save()?;
        let manifest = CatalogManifest {
            model: model.to_string(),
            dimension: self.index.dimension(),
            item_count: self.metadata.count()?,
            built_at: Utc::now(),
        };
        self.metadata.put_manifest(&manifest)?;
        self.manifest = Some(manifest.clone());
        Ok(manifest)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn manifest(&self) -> Option<&CatalogManifest> {
        self.manifest.as_ref()
    }

    pub fn items(&self) -> Result<Vec<CatalogItem>, CatalogError> {
        self.metadata.all_items()
    }
}

impl CatalogStore for LocalCatalog {
    fn dimension(&self) -> usize {
        self.index.dimension()
    }

    fn len(&self) -> usize {
        self.index.len()
    }

    fn insert(
        &self,
        key: u64,
        embedding: &Embedding,
        item: &CatalogItem,
    ) -> Result<(), CatalogError> {
        self.index.add(key, embedding)?;
        self.metadata.put_item(key, item)
    }

    fn nearest(&self, query: &Embedding, k: usize) -> Result<Vec<CatalogHit>, CatalogError> {
        let results = self.index.search(query, k)?;

        let hits = results
            .into_iter()
            .map(|r| {
                let item = self
                    .metadata
                    .get_item(r.key)?
                    .ok_or(CatalogError::MissingMetadata(r.key))?;
                Ok(CatalogHit {
                    score: r.score,
                    item,
                })
            })
            .collect::<Result<Vec<_>, CatalogError>>()?;

        debug!(k, found = hits.len(), "Catalog lookup complete");
        Ok(hits)
    }
}
