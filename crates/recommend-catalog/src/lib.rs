//! # recommend-catalog
//!
//! The assessment catalog: a usearch HNSW index of item vectors plus a
//! RocksDB store of item metadata.
//!
//! Serving only reads the catalog through [`CatalogStore::nearest`]. The
//! catalog is written once by [`CatalogBuilder`] from the raw product JSON,
//! which also records the embedding model in a manifest so that a serving
//! process can refuse a catalog built with an incompatible model.

pub mod builder;
pub mod error;
pub mod hnsw;
pub mod metadata;
pub mod store;
pub mod verify;

pub use builder::{
    document_text, parse_catalog, BuildStats, CatalogBuilder, ParsedCatalog, BUILD_BATCH_SIZE,
    REQUIRED_FIELDS,
};
pub use error::CatalogError;
pub use hnsw::{HnswConfig, HnswIndex, IndexStats, SearchResult};
pub use metadata::{CatalogManifest, CatalogMetadata, CF_CATALOG_ITEMS, CF_CATALOG_MANIFEST};
pub use store::{CatalogHit, CatalogStore, LocalCatalog};
pub use verify::{verify_catalog, CatalogReport};
