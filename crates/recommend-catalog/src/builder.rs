//! Offline catalog build from raw product JSON.
//!
//! The input is a JSON array of product records. Records that are not
//! objects, or that lack any required field, are skipped and never partially
//! stored. Each kept record is embedded from a single document string and
//! inserted under a sequential key.

use std::path::Path;

use recommend_embeddings::EmbeddingModel;
use recommend_types::CatalogItem;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::CatalogError;
use crate::metadata::CatalogManifest;
use crate::store::{CatalogStore, LocalCatalog};

/// Fields every raw record must carry
pub const REQUIRED_FIELDS: &[&str] = &[
    "name",
    "url",
    "description",
    "duration",
    "languages",
    "job_level",
    "remote_testing",
    "adaptive/irt_support",
    "test_type",
];

/// Records embedded and inserted per batch
pub const BUILD_BATCH_SIZE: usize = 100;

/// Result of parsing and validating raw catalog JSON.
#[derive(Debug, Clone, Default)]
pub struct ParsedCatalog {
    pub items: Vec<CatalogItem>,
    pub skipped: usize,
}

/// Statistics from a catalog build
#[derive(Debug, Clone)]
pub struct BuildStats {
    pub items_indexed: usize,
    pub records_skipped: usize,
    pub manifest: CatalogManifest,
}

/// Render a raw field value as a catalog string. Lists are joined with ", ".
fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Array(values) => values
            .iter()
            .map(stringify)
            .collect::<Vec<_>>()
            .join(", "),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn record_to_item(position: usize, record: &Value) -> Option<CatalogItem> {
    let Some(fields) = record.as_object() else {
        warn!(index = position, "Skipping non-object catalog record");
        return None;
    };

    if let Some(missing) = REQUIRED_FIELDS
        .iter()
        .find(|f| fields.get(**f).map_or(true, Value::is_null))
    {
        warn!(index = position, field = missing, "Skipping incomplete catalog record");
        return None;
    }

    let field = |name: &str| fields.get(name).map(stringify).unwrap_or_default();
    Some(CatalogItem {
        id: String::new(),
        name: field("name"),
        url: field("url"),
        description: field("description"),
        duration: field("duration"),
        languages: field("languages"),
        job_level: field("job_level"),
        remote_testing: field("remote_testing"),
        adaptive_irt_support: field("adaptive/irt_support"),
        test_type: field("test_type"),
    })
}

/// Parse and validate raw catalog JSON.
///
/// Kept items get sequential ids "0", "1", ... in input order.
pub fn parse_catalog(json: &str) -> Result<ParsedCatalog, CatalogError> {
    let value: Value = serde_json::from_str(json)?;
    let Value::Array(records) = value else {
        return Err(CatalogError::InvalidInput(
            "catalog JSON must be a list of assessments".to_string(),
        ));
    };

    let mut parsed = ParsedCatalog::default();
    for (position, record) in records.iter().enumerate() {
        match record_to_item(position, record) {
            Some(mut item) => {
                item.id = parsed.items.len().to_string();
                parsed.items.push(item);
            }
            None => parsed.skipped += 1,
        }
    }

    if parsed.items.is_empty() {
        return Err(CatalogError::InvalidInput(
            "no valid assessments found in catalog JSON".to_string(),
        ));
    }
    Ok(parsed)
}

/// Text embedded for an item: every field, colon separated.
pub fn document_text(item: &CatalogItem) -> String {
    format!(
        "{}: {}: {}: {}: {}: {}: {}: {}: {}",
        item.name,
        item.description,
        item.url,
        item.duration,
        item.languages,
        item.job_level,
        item.remote_testing,
        item.adaptive_irt_support,
        item.test_type
    )
}

/// Builds a catalog directory from validated items.
pub struct CatalogBuilder<'a> {
    embedder: &'a dyn EmbeddingModel,
    batch_size: usize,
}

impl<'a> CatalogBuilder<'a> {
    pub fn new(embedder: &'a dyn EmbeddingModel) -> Self {
        Self {
            embedder,
            batch_size: BUILD_BATCH_SIZE,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Parse `json` and build the catalog at `root`, replacing any existing one.
    pub fn build_from_json(&self, root: &Path, json: &str) -> Result<BuildStats, CatalogError> {
        let parsed = parse_catalog(json)?;
        let mut stats = self.build(root, &parsed.items)?;
        stats.records_skipped = parsed.skipped;
        Ok(stats)
    }

    /// Build the catalog at `root` from already validated items.
    pub fn build(&self, root: &Path, items: &[CatalogItem]) -> Result<BuildStats, CatalogError> {
        if items.is_empty() {
            return Err(CatalogError::InvalidInput(
                "no valid assessments to index".to_string(),
            ));
        }

        let info = self.embedder.info();
        info!(
            items = items.len(),
            model = %info.name,
            dim = info.dimension,
            "Building catalog"
        );

        let mut catalog = LocalCatalog::create(root, info.dimension, items.len())?;

        for (batch_no, batch) in items.chunks(self.batch_size).enumerate() {
            let documents: Vec<String> = batch.iter().map(document_text).collect();
            let refs: Vec<&str> = documents.iter().map(String::as_str).collect();
            let embeddings = self.embedder.embed_batch(&refs)?;

            if embeddings.len() != batch.len() {
                return Err(CatalogError::Embedding(
                    recommend_embeddings::EmbeddingError::EmptyOutput,
                ));
            }

            let offset = batch_no * self.batch_size;
            for (i, (item, embedding)) in batch.iter().zip(&embeddings).enumerate() {
                catalog.insert((offset + i) as u64, embedding, item)?;
            }
            debug!(batch = batch_no, size = batch.len(), "Catalog batch indexed");
        }

        let manifest = catalog.finish(&info.name)?;
        info!(items = manifest.item_count, path = ?root, "Catalog build complete");

        Ok(BuildStats {
            items_indexed: manifest.item_count,
            records_skipped: 0,
            manifest,
        })
    }
}
