//! Catalog directory health check.

use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::error::CatalogError;
use crate::hnsw::{HnswConfig, HnswIndex, IndexStats, INDEX_FILE};
use crate::metadata::{CatalogManifest, CatalogMetadata};

/// Outcome of inspecting a catalog directory.
#[derive(Debug, Clone, PartialEq)]
pub enum CatalogReport {
    /// Path does not exist
    Missing(PathBuf),
    /// Path exists but is a file
    NotADirectory(PathBuf),
    /// Directory has no entries
    Empty(PathBuf),
    /// Directory has content but no readable manifest or index
    Incomplete { path: PathBuf, reason: String },
    /// Built catalog
    Ready {
        path: PathBuf,
        manifest: CatalogManifest,
        stored_items: usize,
        index: IndexStats,
    },
}

impl CatalogReport {
    pub fn is_ready(&self) -> bool {
        matches!(self, CatalogReport::Ready { .. })
    }
}

impl std::fmt::Display for CatalogReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CatalogReport::Missing(p) => write!(f, "catalog path {} does not exist", p.display()),
            CatalogReport::NotADirectory(p) => {
                write!(f, "catalog path {} is not a directory", p.display())
            }
            CatalogReport::Empty(p) => write!(f, "catalog directory {} is empty", p.display()),
            CatalogReport::Incomplete { path, reason } => {
                write!(f, "catalog at {} is incomplete: {}", path.display(), reason)
            }
            CatalogReport::Ready {
                path,
                manifest,
                stored_items,
                index,
            } => write!(
                f,
                "catalog at {} ready: {} items, model {} ({} dims), built {}, index {} bytes",
                path.display(),
                stored_items,
                manifest.model,
                manifest.dimension,
                manifest.built_at.to_rfc3339(),
                index.size_bytes
            ),
        }
    }
}

/// Inspect the catalog at `path`.
///
/// Only unexpected I/O failures are errors; every diagnosable state is a report.
pub fn verify_catalog(path: impl AsRef<Path>) -> Result<CatalogReport, CatalogError> {
    let path = path.as_ref().to_path_buf();

    if !path.exists() {
        warn!(path = ?path, "Catalog path missing");
        return Ok(CatalogReport::Missing(path));
    }
    if !path.is_dir() {
        warn!(path = ?path, "Catalog path is not a directory");
        return Ok(CatalogReport::NotADirectory(path));
    }
    if std::fs::read_dir(&path)?.next().is_none() {
        warn!(path = ?path, "Catalog directory empty");
        return Ok(CatalogReport::Empty(path));
    }

    let incomplete = |reason: String| CatalogReport::Incomplete {
        path: path.clone(),
        reason,
    };

    if !path.join("index").join(INDEX_FILE).exists() {
        return Ok(incomplete("vector index file missing".to_string()));
    }

    let metadata = match CatalogMetadata::open_read_only(path.join("meta")) {
        Ok(m) => m,
        Err(e) => return Ok(incomplete(e.to_string())),
    };
    let Some(manifest) = metadata.manifest()? else {
        return Ok(incomplete("build manifest missing".to_string()));
    };
    let stored_items = metadata.count()?;

    let index = match HnswIndex::open(HnswConfig::new(manifest.dimension, path.join("index"))) {
        Ok(index) => index.stats(),
        Err(e) => return Ok(incomplete(e.to_string())),
    };
    if index.vector_count != stored_items {
        return Ok(incomplete(format!(
            "index holds {} vectors but metadata holds {} items",
            index.vector_count, stored_items
        )));
    }

    info!(path = ?path, items = stored_items, model = %manifest.model, "Catalog verified");
    Ok(CatalogReport::Ready {
        path,
        manifest,
        stored_items,
        index,
    })
}
