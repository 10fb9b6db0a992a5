//! Catalog item metadata storage.
//!
//! Maps vector keys (u64, big-endian) to `CatalogItem` JSON, plus a single
//! manifest record describing how the catalog was built. Stored in RocksDB.

use std::path::Path;

use chrono::{DateTime, Utc};
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, IteratorMode, Options, DB};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use recommend_types::CatalogItem;

use crate::error::CatalogError;

/// Column family holding item metadata
pub const CF_CATALOG_ITEMS: &str = "catalog_items";

/// Column family holding the build manifest
pub const CF_CATALOG_MANIFEST: &str = "catalog_manifest";

const MANIFEST_KEY: &[u8] = b"manifest";

/// How and when the catalog was built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogManifest {
    /// Embedding model used for item vectors
    pub model: String,
    /// Vector dimension
    pub dimension: usize,
    /// Number of stored items
    pub item_count: usize,
    /// Build completion time
    pub built_at: DateTime<Utc>,
}

/// RocksDB-backed item metadata.
pub struct CatalogMetadata {
    db: DB,
}

impl CatalogMetadata {
    /// Open for writing, creating the store if missing.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let path = path.as_ref();

        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cfs = [CF_CATALOG_ITEMS, CF_CATALOG_MANIFEST]
            .into_iter()
            .map(|name| ColumnFamilyDescriptor::new(name, Options::default()));

        let db = DB::open_cf_descriptors(&opts, path, cfs)?;
        info!(path = ?path, "Opened catalog metadata");
        Ok(Self { db })
    }

    /// Open an existing store read-only; serving and verification use this.
    pub fn open_read_only(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(CatalogError::NotFound(path.to_path_buf()));
        }

        let db = DB::open_cf_for_read_only(
            &Options::default(),
            path,
            [CF_CATALOG_ITEMS, CF_CATALOG_MANIFEST],
            false,
        )?;
        debug!(path = ?path, "Opened catalog metadata read-only");
        Ok(Self { db })
    }

    fn cf(&self, name: &str) -> Result<&ColumnFamily, CatalogError> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| CatalogError::InvalidInput(format!("column family {name} missing")))
    }

    pub fn put_item(&self, key: u64, item: &CatalogItem) -> Result<(), CatalogError> {
        let value = serde_json::to_vec(item)?;
        self.db
            .put_cf(self.cf(CF_CATALOG_ITEMS)?, key.to_be_bytes(), value)?;
        debug!(key, id = %item.id, "Stored catalog item");
        Ok(())
    }

    pub fn get_item(&self, key: u64) -> Result<Option<CatalogItem>, CatalogError> {
        match self.db.get_cf(self.cf(CF_CATALOG_ITEMS)?, key.to_be_bytes())? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn count(&self) -> Result<usize, CatalogError> {
        let iter = self
            .db
            .iterator_cf(self.cf(CF_CATALOG_ITEMS)?, IteratorMode::Start);
        let mut count = 0;
        for entry in iter {
            entry?;
            count += 1;
        }
        Ok(count)
    }

    /// All items in key order.
    pub fn all_items(&self) -> Result<Vec<CatalogItem>, CatalogError> {
        let iter = self
            .db
            .iterator_cf(self.cf(CF_CATALOG_ITEMS)?, IteratorMode::Start);
        let mut items = Vec::new();
        for entry in iter {
            let (_, value) = entry?;
            items.push(serde_json::from_slice(&value)?);
        }
        Ok(items)
    }

    pub fn put_manifest(&self, manifest: &CatalogManifest) -> Result<(), CatalogError> {
        let value = serde_json::to_vec(manifest)?;
        self.db
            .put_cf(self.cf(CF_CATALOG_MANIFEST)?, MANIFEST_KEY, value)?;
        info!(
            model = %manifest.model,
            dim = manifest.dimension,
            items = manifest.item_count,
            "Wrote catalog manifest"
        );
        Ok(())
    }

    pub fn manifest(&self) -> Result<Option<CatalogManifest>, CatalogError> {
        match self.db.get_cf(self.cf(CF_CATALOG_MANIFEST)?, MANIFEST_KEY)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }
}
