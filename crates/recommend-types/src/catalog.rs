//! Catalog item and ranked result types.
//!
//! A `CatalogItem` is written once by the catalog build and never mutated
//! by the query path. `RankedResult` is the ordered output of one search.

use serde::{Deserialize, Serialize};

/// One recommendable assessment product.
///
/// Every field is a string. Flags such as `remote_testing` keep the catalog's
/// own encoding ("Yes"/"No") rather than being parsed into booleans.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogItem {
    /// Unique identifier within the catalog
    #[serde(default)]
    pub id: String,
    /// Product name
    #[serde(default)]
    pub name: String,
    /// Detail page URL
    #[serde(default)]
    pub url: String,
    /// Free-text description
    #[serde(default)]
    pub description: String,
    /// Duration descriptor (e.g. "30 minutes")
    #[serde(default)]
    pub duration: String,
    /// Supported languages, comma separated
    #[serde(default)]
    pub languages: String,
    /// Target job level
    #[serde(default)]
    pub job_level: String,
    /// Remote testing support flag
    #[serde(default)]
    pub remote_testing: String,
    /// Adaptive/IRT support flag
    #[serde(default, rename = "adaptive/irt_support")]
    pub adaptive_irt_support: String,
    /// Test type classification
    #[serde(default)]
    pub test_type: String,
}

/// Metadata exposed to callers for each recommendation.
///
/// Absent catalog fields render as empty strings, never null.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssessmentSummary {
    pub name: String,
    pub url: String,
    pub remote_testing: String,
    pub adaptive_irt_support: String,
    pub duration: String,
    pub test_type: String,
}

impl From<&CatalogItem> for AssessmentSummary {
    fn from(item: &CatalogItem) -> Self {
        Self {
            name: item.name.clone(),
            url: item.url.clone(),
            remote_testing: item.remote_testing.clone(),
            adaptive_irt_support: item.adaptive_irt_support.clone(),
            duration: item.duration.clone(),
            test_type: item.test_type.clone(),
        }
    }
}

/// A catalog item at a position in a ranked result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedItem {
    /// 1-based position in the result
    pub rank: usize,
    /// Similarity reported by the store (higher = more similar)
    pub score: f32,
    /// Catalog metadata
    pub item: CatalogItem,
}

/// Ordered search output, best match first.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RankedResult {
    pub items: Vec<RankedItem>,
}

impl RankedResult {
    /// Build a result from `(score, item)` pairs already in store order.
    pub fn from_ordered(hits: impl IntoIterator<Item = (f32, CatalogItem)>) -> Self {
        let items = hits
            .into_iter()
            .enumerate()
            .map(|(i, (score, item))| RankedItem {
                rank: i + 1,
                score,
                item,
            })
            .collect();
        Self { items }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &RankedItem> {
        self.items.iter()
    }

    /// Item names in rank order.
    pub fn names(&self) -> Vec<String> {
        self.items.iter().map(|r| r.item.name.clone()).collect()
    }

    /// Caller-facing metadata in rank order.
    pub fn summaries(&self) -> Vec<AssessmentSummary> {
        self.items
            .iter()
            .map(|r| AssessmentSummary::from(&r.item))
            .collect()
    }
}
